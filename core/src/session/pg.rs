use super::{stored_minutes, Session, StoredPlayer, Transactional, SELECT_PLAYER};
use crate::{error::SessionError, player::PlayerRecord};
use postgres::{Row, Transaction};

pub(crate) const MIGRATIONS: &[&str] = &[include_str!("../../../migrations/postgres/001_player_data.sql")];

fn read_player(row: &Row) -> Result<StoredPlayer, SessionError> {
    Ok(StoredPlayer {
        id:                row.try_get(0)?,
        display_name:      row.try_get(1)?,
        balance:           row.try_get(2)?,
        last_seen_at:      row.try_get(3)?,
        play_time_minutes: row.try_get(4)?,
    })
}

impl Session for Transaction<'_> {
    fn find_player(&mut self, id: &str) -> Result<Option<PlayerRecord>, SessionError> {
        let sql = format!("{SELECT_PLAYER} WHERE id = $1");
        let row = self.query_opt(sql.as_str(), &[&id])?;
        row.as_ref()
            .map(|r| read_player(r)?.into_record())
            .transpose()
    }

    fn write_player(&mut self, record: &PlayerRecord) -> Result<(), SessionError> {
        let minutes = stored_minutes(record)?;
        self.execute(
            "INSERT INTO player_data (id, player_name, balance, last_login, play_time_minutes)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE SET
                player_name       = EXCLUDED.player_name,
                balance           = EXCLUDED.balance,
                last_login        = EXCLUDED.last_login,
                play_time_minutes = EXCLUDED.play_time_minutes",
            &[
                &record.id,
                &record.display_name,
                &record.balance,
                &record.last_seen_at,
                &minutes,
            ],
        )?;
        Ok(())
    }

    fn players_by_balance(&mut self, limit: i64) -> Result<Vec<PlayerRecord>, SessionError> {
        let sql = format!("{SELECT_PLAYER} ORDER BY balance DESC LIMIT $1");
        let rows = self.query(sql.as_str(), &[&limit])?;
        rows.iter()
            .map(|r| read_player(r)?.into_record())
            .collect()
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
