use super::{stored_minutes, Session, StoredPlayer, Transactional, SELECT_PLAYER};
use crate::{error::SessionError, player::PlayerRecord};
use rusqlite::{params, OptionalExtension, Row, Transaction};

pub(crate) const MIGRATIONS: &[&str] = &[include_str!("../../../migrations/sqlite/001_player_data.sql")];

fn read_player(row: &Row<'_>) -> rusqlite::Result<StoredPlayer> {
    Ok(StoredPlayer {
        id:                row.get(0)?,
        display_name:      row.get(1)?,
        balance:           row.get(2)?,
        last_seen_at:      row.get(3)?,
        play_time_minutes: row.get(4)?,
    })
}

impl Session for Transaction<'_> {
    fn find_player(&mut self, id: &str) -> Result<Option<PlayerRecord>, SessionError> {
        let stored = self
            .query_row(&format!("{SELECT_PLAYER} WHERE id = ?1"), params![id], read_player)
            .optional()?;
        stored.map(StoredPlayer::into_record).transpose()
    }

    fn write_player(&mut self, record: &PlayerRecord) -> Result<(), SessionError> {
        let minutes = stored_minutes(record)?;
        self.execute(
            "INSERT INTO player_data (id, player_name, balance, last_login, play_time_minutes)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (id) DO UPDATE SET
                player_name       = excluded.player_name,
                balance           = excluded.balance,
                last_login        = excluded.last_login,
                play_time_minutes = excluded.play_time_minutes",
            params![
                record.id,
                record.display_name,
                record.balance,
                record.last_seen_at,
                minutes,
            ],
        )?;
        Ok(())
    }

    fn players_by_balance(&mut self, limit: i64) -> Result<Vec<PlayerRecord>, SessionError> {
        let mut stmt = self.prepare(&format!("{SELECT_PLAYER} ORDER BY balance DESC LIMIT ?1"))?;
        let stored = stmt
            .query_map(params![limit], read_player)?
            .collect::<Result<Vec<_>, _>>()?;
        stored.into_iter().map(StoredPlayer::into_record).collect()
    }
}

impl Transactional for Transaction<'_> {
    fn commit_tx(self) -> Result<(), SessionError> {
        self.commit().map_err(Into::into)
    }

    fn rollback_tx(self) -> Result<(), SessionError> {
        self.rollback().map_err(Into::into)
    }
}
