//! Connection Manager: owns the one storage handle for the process.
//!
//! RULES:
//!   - Only `initialize` opens the handle and only `shutdown` closes it.
//!   - Every unit of work gets its own transaction; access to the handle
//!     is serialized, so two units of work never share a session.
//!   - A failed unit of work is always rolled back before the error
//!     reaches the caller.
//!   - A networked handle whose server connection dropped is reopened
//!     from the stored config before the next unit of work.

use crate::{
    config::{BackendKind, NetworkTarget, StorageConfig, StorageTarget, MAX_TIMEOUT_MS},
    error::{PersistError, PersistResult, SessionError},
    session::{Session, Transactional, POSTGRES_MIGRATIONS, SQLITE_MIGRATIONS},
};
use rusqlite::{Connection, OpenFlags, TransactionBehavior};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

enum StorageHandle {
    Embedded(Connection),
    Networked(postgres::Client),
}

enum HandleState {
    Closed,
    /// Opening failed; the reason is kept for `NotConnected` errors.
    Failed(String),
    Open {
        handle: StorageHandle,
        config: StorageConfig,
    },
}

pub struct ConnectionManager {
    state: Mutex<HandleState>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    /// A manager with no handle. Call `initialize` before use.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HandleState::Closed),
        }
    }

    /// Build a manager and initialize it in one step.
    pub fn open(config: &StorageConfig) -> PersistResult<Self> {
        let manager = Self::new();
        manager.initialize(config)?;
        Ok(manager)
    }

    /// Open the storage handle and apply migrations.
    ///
    /// On failure the manager records the reason and stays unusable;
    /// a later `initialize` may retry.
    pub fn initialize(&self, config: &StorageConfig) -> PersistResult<()> {
        let mut state = self.lock_state();
        if let HandleState::Open { .. } = *state {
            return Err(PersistError::AlreadyInitialized);
        }

        match StorageHandle::connect(config) {
            Ok(handle) => {
                log::info!("storage: {} handle open", config.backend());
                *state = HandleState::Open { handle, config: config.clone() };
                Ok(())
            }
            Err(err) => {
                log::error!("storage: initialization failed: {err}");
                *state = HandleState::Failed(format!("initialization failed: {err}"));
                Err(err)
            }
        }
    }

    /// Run `operation` inside one transaction.
    ///
    /// Commits when the operation returns `Ok`. Rolls back and returns
    /// `PersistError::Transaction` when it returns `Err` or the commit fails.
    pub fn run_unit_of_work<T, F>(&self, operation: F) -> PersistResult<T>
    where
        F: FnOnce(&mut dyn Session) -> Result<T, SessionError>,
    {
        let mut state = self.lock_state();
        reconnect_if_stale(&mut state);
        let result = match &mut *state {
            HandleState::Open { handle, .. } => handle.run(operation),
            HandleState::Failed(reason) => Err(PersistError::NotConnected {
                reason: reason.clone(),
            }),
            HandleState::Closed => Err(PersistError::NotConnected {
                reason: "storage is closed".to_string(),
            }),
        };

        // The blocking client only learns the server is gone when a call
        // fails, so check after driver errors and reopen right away.
        let driver_failed = matches!(
            result,
            Err(PersistError::Transaction(SessionError::Postgres(_)))
        );
        let lost = match &mut *state {
            HandleState::Open { handle, config } if driver_failed => {
                !handle.is_alive(config.timeout)
            }
            _ => false,
        };
        if lost {
            reconnect(&mut state);
        }
        result
    }

    /// Release the handle. Safe to call any number of times.
    pub fn shutdown(&self) {
        let mut state = self.lock_state();
        match std::mem::replace(&mut *state, HandleState::Closed) {
            HandleState::Open { handle, .. } => {
                handle.close();
                log::info!("storage: handle released");
            }
            HandleState::Failed(_) | HandleState::Closed => {
                log::debug!("storage: shutdown with no open handle");
            }
        }
    }

    /// True while the handle is usable. A networked handle whose server
    /// connection dropped reports false until it is reopened.
    pub fn is_open(&self) -> bool {
        match &*self.lock_state() {
            HandleState::Open { handle, .. } => !handle.is_stale(),
            _ => false,
        }
    }

    /// Why the last open attempt failed, if the manager is in that state.
    pub fn last_failure(&self) -> Option<String> {
        match &*self.lock_state() {
            HandleState::Failed(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    pub fn backend(&self) -> Option<BackendKind> {
        match &*self.lock_state() {
            HandleState::Open { config, .. } => Some(config.backend()),
            _ => None,
        }
    }

    // A panicking unit of work drops its transaction, which rolls back,
    // so the handle behind a poisoned lock is still consistent.
    fn lock_state(&self) -> MutexGuard<'_, HandleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn reconnect_if_stale(state: &mut HandleState) {
    if matches!(&*state, HandleState::Open { handle, .. } if handle.is_stale()) {
        reconnect(state);
    }
}

/// Replace an open handle with a fresh one built from its config. A failed
/// reopen moves the manager to `Failed`; units of work then see
/// `NotConnected` and `initialize` may be called again.
fn reconnect(state: &mut HandleState) {
    let config = match &*state {
        HandleState::Open { config, .. } => config.clone(),
        _ => return,
    };
    log::warn!("storage: {} connection lost, reconnecting", config.backend());
    *state = match StorageHandle::connect(&config) {
        Ok(handle) => {
            log::info!("storage: {} handle reopened", config.backend());
            HandleState::Open { handle, config }
        }
        Err(err) => {
            log::error!("storage: reconnect failed: {err}");
            HandleState::Failed(format!("reconnect failed: {err}"))
        }
    };
}

impl StorageHandle {
    fn connect(config: &StorageConfig) -> PersistResult<Self> {
        let backend = config.backend();
        let fail = |reason: String| PersistError::Connection { backend, reason };

        match &config.target {
            StorageTarget::EmbeddedFile { path } => {
                let conn = open_embedded(path, config.timeout).map_err(|e| fail(e.to_string()))?;
                for migration in SQLITE_MIGRATIONS {
                    conn.execute_batch(migration)
                        .map_err(|e| fail(format!("migration failed: {e}")))?;
                }
                Ok(StorageHandle::Embedded(conn))
            }
            StorageTarget::Networked(target) => {
                let mut client =
                    open_networked(target, config.timeout).map_err(|e| fail(e.to_string()))?;
                for migration in POSTGRES_MIGRATIONS {
                    client
                        .batch_execute(migration)
                        .map_err(|e| fail(format!("migration failed: {e}")))?;
                }
                Ok(StorageHandle::Networked(client))
            }
        }
    }

    fn run<T, F>(&mut self, operation: F) -> PersistResult<T>
    where
        F: FnOnce(&mut dyn Session) -> Result<T, SessionError>,
    {
        let started = Instant::now();
        let result = match self {
            // IMMEDIATE takes the write lock up front so read-modify-write
            // units of work cannot interleave with another process.
            StorageHandle::Embedded(conn) => {
                let tx = conn
                    .transaction_with_behavior(TransactionBehavior::Immediate)
                    .map_err(SessionError::from)?;
                complete(tx, operation)
            }
            StorageHandle::Networked(client) => {
                let tx = client.transaction().map_err(SessionError::from)?;
                complete(tx, operation)
            }
        };
        log::debug!(
            "storage: unit of work {} in {:?}",
            if result.is_ok() { "committed" } else { "rolled back" },
            started.elapsed()
        );
        result
    }

    /// The server side of a networked handle has gone away.
    fn is_stale(&self) -> bool {
        match self {
            StorageHandle::Embedded(_)       => false,
            StorageHandle::Networked(client) => client.is_closed(),
        }
    }

    /// Round-trip to the server. Embedded handles are always alive.
    fn is_alive(&mut self, timeout: Duration) -> bool {
        match self {
            StorageHandle::Embedded(_) => true,
            StorageHandle::Networked(client) => {
                !client.is_closed() && client.is_valid(storage_timeout(timeout)).is_ok()
            }
        }
    }

    fn close(self) {
        match self {
            StorageHandle::Embedded(conn) => {
                if let Err((_, e)) = conn.close() {
                    log::warn!("storage: error closing SQLite handle: {e}");
                }
            }
            StorageHandle::Networked(client) => {
                if let Err(e) = client.close() {
                    log::warn!("storage: error closing PostgreSQL client: {e}");
                }
            }
        }
    }
}

// Both backends take the timeout as a signed 32-bit millisecond count.
fn storage_timeout(timeout: Duration) -> Duration {
    timeout.min(Duration::from_millis(MAX_TIMEOUT_MS))
}

fn open_embedded(path: &str, timeout: Duration) -> rusqlite::Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI,
    )?;
    conn.busy_timeout(storage_timeout(timeout))?;
    // WAL only applies to real files; in-memory databases ignore it.
    let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
    Ok(conn)
}

fn open_networked(target: &NetworkTarget, timeout: Duration) -> Result<postgres::Client, postgres::Error> {
    let timeout = storage_timeout(timeout);
    postgres::Config::new()
        .host(&target.host)
        .port(target.port)
        .dbname(&target.database)
        .user(&target.username)
        .password(target.password())
        .connect_timeout(timeout)
        .options(&format!("-c statement_timeout={}", timeout.as_millis()))
        .connect(postgres::NoTls)
}

fn complete<Tx, T, F>(mut tx: Tx, operation: F) -> PersistResult<T>
where
    Tx: Transactional,
    F: FnOnce(&mut dyn Session) -> Result<T, SessionError>,
{
    match operation(&mut tx) {
        Ok(value) => match tx.commit_tx() {
            Ok(()) => Ok(value),
            Err(err) => {
                log::warn!("storage: commit failed, unit of work discarded: {err}");
                Err(PersistError::Transaction(err))
            }
        },
        Err(err) => {
            if let Err(rollback_err) = tx.rollback_tx() {
                log::warn!("storage: rollback failed: {rollback_err}");
            }
            log::warn!("storage: unit of work rolled back: {err}");
            Err(PersistError::Transaction(err))
        }
    }
}
