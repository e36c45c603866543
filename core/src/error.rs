use postgres::error::SqlState;
use rusqlite::ErrorCode;
use thiserror::Error;

use crate::config::BackendKind;

/// Errors surfaced by the Connection Manager and the Record Store.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cannot open {backend} storage: {reason}")]
    Connection { backend: BackendKind, reason: String },

    #[error("Storage is not connected ({reason})")]
    NotConnected { reason: String },

    #[error("Storage is already initialized")]
    AlreadyInitialized,

    #[error("Transaction rolled back: {0}")]
    Transaction(#[source] SessionError),
}

pub type PersistResult<T> = Result<T, PersistError>;

/// Failures raised inside a unit of work. Any of these rolls the
/// transaction back and reaches the caller as `PersistError::Transaction`.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("SQLite error: {0}")]
    Sqlite(#[source] rusqlite::Error),

    #[error("PostgreSQL error: {0}")]
    Postgres(#[source] postgres::Error),

    #[error("Storage call timed out")]
    Timeout,

    #[error("Unit of work aborted: {0}")]
    Aborted(String),

    #[error("Inconsistent storage state: {0}")]
    Inconsistent(String),
}

impl From<rusqlite::Error> for SessionError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => SessionError::Timeout,
            _ => SessionError::Sqlite(err),
        }
    }
}

impl From<postgres::Error> for SessionError {
    fn from(err: postgres::Error) -> Self {
        // statement_timeout surfaces as a cancelled query.
        if err.code() == Some(&SqlState::QUERY_CANCELED) {
            SessionError::Timeout
        } else {
            SessionError::Postgres(err)
        }
    }
}

impl From<SessionError> for PersistError {
    fn from(err: SessionError) -> Self {
        PersistError::Transaction(err)
    }
}
