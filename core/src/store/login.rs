use super::RecordStore;
use crate::{error::PersistResult, player::PlayerRecord};
use chrono::{DateTime, Utc};

/// What `record_login` persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginOutcome {
    pub record:     PlayerRecord,
    pub first_seen: bool,
}

impl RecordStore {
    /// The join flow: look the player up, then upsert either a fresh
    /// record or the existing one with a new name and login time.
    ///
    /// Lookup and write are separate units of work, so two joins for the
    /// same id race; the later upsert wins.
    pub fn record_login(
        &self,
        id: &str,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> PersistResult<LoginOutcome> {
        let (record, first_seen) = match self.find_by_id(id)? {
            Some(mut existing) => {
                existing.touch_login(display_name, now);
                (existing, false)
            }
            None => (PlayerRecord::new(id, display_name, now), true),
        };

        let record = self.upsert(&record)?;
        if first_seen {
            log::info!("store: first login for {display_name} ({id})");
        }
        Ok(LoginOutcome { record, first_seen })
    }
}
