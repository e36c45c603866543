//! tinypg-core: player persistence for the Tiny PG game-server plugin.
//!
//! Layering, leaves first:
//!   config     -> validated storage settings
//!   connection -> the one storage handle and the unit-of-work boundary
//!   session    -> per-transaction queries, one backend per storage kind
//!   store      -> player-record operations, one unit of work each
//!   plugin     -> the context object the host drives (join, quit, commands)

pub mod config;
pub mod connection;
pub mod error;
pub mod messages;
pub mod player;
pub mod plugin;
pub mod session;
pub mod store;
pub mod types;

pub use config::{BackendKind, StorageConfig, StorageSettings};
pub use connection::ConnectionManager;
pub use error::{PersistError, PersistResult, SessionError};
pub use player::PlayerRecord;
pub use plugin::PluginContext;
pub use store::{LoginOutcome, RecordStore};
