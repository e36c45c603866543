//! The transaction-scoped surface a unit of work operates on.
//!
//! RULE: Only the session backends query `player_data`.
//! The Record Store drives sessions; it never sees a connection.

mod pg;
mod sqlite;

pub(crate) use self::pg::MIGRATIONS as POSTGRES_MIGRATIONS;
pub(crate) use self::sqlite::MIGRATIONS as SQLITE_MIGRATIONS;

use crate::{
    error::SessionError,
    player::{PlayerRecord, MAX_PLAY_TIME_MINUTES},
};
use chrono::{DateTime, Utc};

/// Operations available inside one open transaction.
///
/// Every call runs inside the transaction the Connection Manager opened;
/// nothing is visible to other callers until it commits.
pub trait Session {
    /// Point lookup by primary key.
    fn find_player(&mut self, id: &str) -> Result<Option<PlayerRecord>, SessionError>;

    /// Insert `record`, or overwrite every mutable column of the existing row.
    fn write_player(&mut self, record: &PlayerRecord) -> Result<(), SessionError>;

    /// Up to `limit` rows ordered by balance, highest first. `limit` is positive.
    fn players_by_balance(&mut self, limit: i64) -> Result<Vec<PlayerRecord>, SessionError>;
}

/// Commit/rollback for a backend transaction. Consumes the transaction.
pub(crate) trait Transactional: Session + Sized {
    fn commit_tx(self) -> Result<(), SessionError>;
    fn rollback_tx(self) -> Result<(), SessionError>;
}

const SELECT_PLAYER: &str =
    "SELECT id, player_name, balance, last_login, play_time_minutes FROM player_data";

/// A row as the database hands it back, before domain checks.
struct StoredPlayer {
    id:                String,
    display_name:      String,
    balance:           f64,
    last_seen_at:      DateTime<Utc>,
    play_time_minutes: i64,
}

impl StoredPlayer {
    fn into_record(self) -> Result<PlayerRecord, SessionError> {
        let play_time_minutes = u64::try_from(self.play_time_minutes).map_err(|_| {
            SessionError::Inconsistent(format!(
                "player {} has negative play time {}",
                self.id, self.play_time_minutes
            ))
        })?;
        Ok(PlayerRecord {
            id: self.id,
            display_name: self.display_name,
            balance: self.balance,
            last_seen_at: self.last_seen_at,
            play_time_minutes,
        })
    }
}

/// Column value for `play_time_minutes`; both backends use signed 64-bit.
fn stored_minutes(record: &PlayerRecord) -> Result<i64, SessionError> {
    i64::try_from(record.play_time_minutes).map_err(|_| {
        SessionError::Aborted(format!(
            "player {} play time {} exceeds {}",
            record.id, record.play_time_minutes, MAX_PLAY_TIME_MINUTES
        ))
    })
}
