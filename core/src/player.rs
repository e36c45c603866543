//! The player record, the only entity this core persists.

use crate::types::PlayerId;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Largest play time either backend can hold (a signed 64-bit column).
pub const MAX_PLAY_TIME_MINUTES: u64 = i64::MAX as u64;

/// One row of `player_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id:                PlayerId,
    pub display_name:      String,
    pub balance:           f64,
    pub last_seen_at:      DateTime<Utc>,
    pub play_time_minutes: u64,
}

impl PlayerRecord {
    /// A first-seen player: zero balance, zero playtime, seen `now`.
    pub fn new(id: impl Into<PlayerId>, display_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id:                id.into(),
            display_name:      display_name.into(),
            balance:           0.0,
            last_seen_at:      storage_precision(now),
            play_time_minutes: 0,
        }
    }

    /// Refresh name and login time for a returning player.
    pub fn touch_login(&mut self, display_name: impl Into<String>, now: DateTime<Utc>) {
        self.display_name = display_name.into();
        self.last_seen_at = storage_precision(now);
    }

    /// Apply a playtime delta, clamping the counter to
    /// `0..=MAX_PLAY_TIME_MINUTES`.
    pub fn add_play_time(&mut self, minutes: i64) -> u64 {
        self.play_time_minutes = if minutes >= 0 {
            self.play_time_minutes
                .saturating_add(minutes.unsigned_abs())
                .min(MAX_PLAY_TIME_MINUTES)
        } else {
            self.play_time_minutes.saturating_sub(minutes.unsigned_abs())
        };
        self.play_time_minutes
    }

    /// Apply a balance delta. Negative results are allowed.
    pub fn add_balance(&mut self, amount: f64) -> f64 {
        self.balance += amount;
        self.balance
    }
}

/// Both backends store timestamps at millisecond precision or better;
/// truncating up front keeps a write/read round trip exact.
pub fn storage_precision(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(3)
}
