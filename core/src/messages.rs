//! Chat-line formatting with legacy `§` colour codes.

use crate::player::PlayerRecord;

pub const PREFIX_COLOR: &str = "§b";
pub const ACCENT_COLOR: &str = "§a";
pub const PLAYER_NAME_COLOR: &str = "§e";
pub const TEXT_COLOR: &str = "§f";
pub const ERROR_COLOR: &str = "§c";

const PLUGIN_NAME: &str = "Tiny PG";

/// Formats every line the plugin sends to chat.
#[derive(Debug, Clone, Copy, Default)]
pub struct Messages;

impl Messages {
    fn prefix() -> String {
        format!("{PREFIX_COLOR}[{ACCENT_COLOR}{PLUGIN_NAME}{PREFIX_COLOR}] ")
    }

    pub fn join(&self, player_name: &str) -> String {
        format!(
            "{}{PLAYER_NAME_COLOR}{player_name}{TEXT_COLOR} joined the server!",
            Self::prefix()
        )
    }

    pub fn quit(&self, player_name: &str) -> String {
        format!(
            "{}{PLAYER_NAME_COLOR}{player_name}{TEXT_COLOR} left the server.",
            Self::prefix()
        )
    }

    pub fn command(&self, text: &str) -> String {
        format!("{}{TEXT_COLOR}{text}", Self::prefix())
    }

    pub fn error(&self, text: &str) -> String {
        format!("{}{ERROR_COLOR}{text}", Self::prefix())
    }

    pub fn success(&self, text: &str) -> String {
        format!("{}{ACCENT_COLOR}{text}", Self::prefix())
    }

    /// `#rank name - balance`, rank starting at 1.
    pub fn leaderboard_entry(&self, rank: usize, record: &PlayerRecord) -> String {
        format!(
            "{}{ACCENT_COLOR}#{rank} {PLAYER_NAME_COLOR}{}{TEXT_COLOR} - {:.2}",
            Self::prefix(),
            record.display_name,
            record.balance
        )
    }
}

/// Drop `§x` colour codes, leaving the plain text.
pub fn strip_colors(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c == '§' {
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}
