//! Shared primitive types.

/// A player's stable account identifier (the game's UUID string).
pub type PlayerId = String;

/// Leaderboard size used when a caller does not ask for one.
pub const DEFAULT_LEADERBOARD_SIZE: i64 = 10;
