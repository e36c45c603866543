//! Record Store: player-record operations over the Connection Manager.
//!
//! RULES:
//!   - One unit of work per call. No caching, no batching, no retries.
//!   - The Record Store is the only writer of `player_data`.
//!   - Transaction errors reach the caller unchanged.
//!
//! KNOWN RACE: two concurrent upserts of the same id are not serialized
//! beyond the storage handle. The last commit wins.

mod economy;
mod login;

pub use login::LoginOutcome;

use crate::{
    connection::ConnectionManager,
    error::{PersistResult, SessionError},
    player::PlayerRecord,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct RecordStore {
    manager: Arc<ConnectionManager>,
}

impl RecordStore {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Point lookup. A missing player is `Ok(None)`, not an error.
    pub fn find_by_id(&self, id: &str) -> PersistResult<Option<PlayerRecord>> {
        log::debug!("store: find_by_id {id}");
        self.manager.run_unit_of_work(|session| session.find_player(id))
    }

    /// Insert or overwrite `record`, returning the row as read back from storage.
    ///
    /// New players should come from `PlayerRecord::new` so defaults are set.
    pub fn upsert(&self, record: &PlayerRecord) -> PersistResult<PlayerRecord> {
        log::debug!("store: upsert {}", record.id);
        self.manager.run_unit_of_work(|session| {
            session.write_player(record)?;
            session.find_player(&record.id)?.ok_or_else(|| {
                SessionError::Inconsistent(format!("player {} missing after write", record.id))
            })
        })
    }

    /// Up to `limit` players by balance, highest first. Tie order is
    /// whatever storage returns. `limit <= 0` yields an empty list.
    pub fn top_by_balance(&self, limit: i64) -> PersistResult<Vec<PlayerRecord>> {
        if limit <= 0 {
            return Ok(Vec::new());
        }
        self.manager
            .run_unit_of_work(|session| session.players_by_balance(limit))
    }
}
