//! Host integration: the context object created when the plugin is enabled.
//!
//! RULES:
//!   - The host owns one `PluginContext` and passes it to every handler.
//!   - Handlers never fail the host event. Storage errors are logged and
//!     the player-facing line is still produced.

use crate::{
    config::{StorageConfig, StorageSettings},
    connection::ConnectionManager,
    error::PersistResult,
    messages::Messages,
    store::{LoginOutcome, RecordStore},
};
use chrono::Utc;
use std::sync::Arc;

pub const HELLO_TEXT: &str = "Hello! The plugin is up and running.";

pub struct PluginContext {
    store:    RecordStore,
    messages: Messages,
}

impl PluginContext {
    /// Validate settings and open storage.
    ///
    /// Bad settings are returned as `PersistError::Configuration`.
    /// Unreachable storage is logged and the context starts degraded:
    /// handlers still answer, persistence calls report `NotConnected`.
    pub fn enable(settings: &StorageSettings) -> PersistResult<Self> {
        let config = StorageConfig::from_settings(settings)?;
        Ok(Self::enable_with(&config))
    }

    pub fn enable_with(config: &StorageConfig) -> Self {
        let manager = Arc::new(ConnectionManager::new());
        match manager.initialize(config) {
            Ok(()) => log::info!("plugin: enabled with {} storage", config.backend()),
            Err(err) => log::error!("plugin: enabled without persistence: {err}"),
        }
        Self {
            store:    RecordStore::new(manager),
            messages: Messages,
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn messages(&self) -> &Messages {
        &self.messages
    }

    pub fn persistence_available(&self) -> bool {
        self.store.manager().is_open()
    }

    // ── Events ────────────────────────────────────────────────────

    /// Record the login and return the join line for chat.
    pub fn on_player_join(&self, id: &str, name: &str) -> String {
        match self.store.record_login(id, name, Utc::now()) {
            Ok(LoginOutcome { first_seen: true, .. }) => {
                log::info!("plugin: welcomed new player {name}");
            }
            Ok(_) => {}
            Err(err) => log::warn!("plugin: could not record login for {name} ({id}): {err}"),
        }
        self.messages.join(name)
    }

    /// Credit the session's minutes online and return the quit line.
    pub fn on_player_quit(&self, id: &str, name: &str, minutes_online: i64) -> String {
        if let Err(err) = self.store.add_play_time(id, minutes_online) {
            log::warn!("plugin: could not credit play time for {name} ({id}): {err}");
        }
        self.messages.quit(name)
    }

    // ── Commands ──────────────────────────────────────────────────

    /// `/hello`
    pub fn on_hello_command(&self) -> String {
        self.messages.command(HELLO_TEXT)
    }

    /// `/top [limit]`: one chat line per leaderboard entry.
    pub fn on_top_command(&self, limit: i64) -> Vec<String> {
        match self.store.top_by_balance(limit) {
            Ok(players) if players.is_empty() => {
                vec![self.messages.command("No players on the leaderboard yet.")]
            }
            Ok(players) => players
                .iter()
                .enumerate()
                .map(|(i, p)| self.messages.leaderboard_entry(i + 1, p))
                .collect(),
            Err(err) => {
                log::warn!("plugin: leaderboard unavailable: {err}");
                vec![self.messages.error("The leaderboard is unavailable right now.")]
            }
        }
    }

    /// Economy command: adjust a balance and report the result.
    pub fn on_pay_command(&self, id: &str, amount: f64) -> String {
        match self.store.add_balance(id, amount) {
            Ok(Some(balance)) => self.messages.success(&format!("New balance: {balance:.2}")),
            Ok(None) => self.messages.error("Unknown player."),
            Err(err) => {
                log::warn!("plugin: balance update for {id} failed: {err}");
                self.messages.error("Could not update the balance.")
            }
        }
    }

    /// Release storage. The context stays usable in degraded mode.
    pub fn disable(&self) {
        self.store.manager().shutdown();
        log::info!("plugin: disabled");
    }
}
