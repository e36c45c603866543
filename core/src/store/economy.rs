use super::RecordStore;
use crate::error::{PersistResult, SessionError};

impl RecordStore {
    // ── Play time ─────────────────────────────────────────────────

    /// Add `minutes` to a player's play time in one read/modify/write.
    ///
    /// Negative deltas are corrections; the counter clamps at 0.
    /// Unknown ids are a no-op.
    pub fn add_play_time(&self, id: &str, minutes: i64) -> PersistResult<()> {
        self.manager.run_unit_of_work(|session| {
            let Some(mut player) = session.find_player(id)? else {
                log::debug!("store: add_play_time for unknown player {id} ignored");
                return Ok(());
            };
            let total = player.add_play_time(minutes);
            session.write_player(&player)?;
            log::debug!("store: {id} play time {minutes:+} -> {total}");
            Ok(())
        })
    }

    // ── Balance ───────────────────────────────────────────────────

    /// Add `amount` to a player's balance and return the new balance.
    ///
    /// Balances may go negative but must stay finite. Returns `None` for
    /// unknown ids.
    pub fn add_balance(&self, id: &str, amount: f64) -> PersistResult<Option<f64>> {
        self.manager.run_unit_of_work(|session| {
            if !amount.is_finite() {
                return Err(SessionError::Aborted(format!(
                    "balance delta must be finite, got {amount}"
                )));
            }
            let Some(mut player) = session.find_player(id)? else {
                return Ok(None);
            };
            let balance = player.add_balance(amount);
            if !balance.is_finite() {
                return Err(SessionError::Aborted(format!(
                    "balance of {id} would overflow ({amount:+})"
                )));
            }
            session.write_player(&player)?;
            log::debug!("store: {id} balance {amount:+} -> {balance}");
            Ok(Some(balance))
        })
    }
}
