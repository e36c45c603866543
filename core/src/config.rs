//! Storage configuration.
//!
//! Raw settings arrive as key-value pairs (from a JSON file or built in
//! code) and are validated once into a `StorageConfig`. Nothing downstream
//! ever sees a half-filled configuration.

use crate::error::{PersistError, PersistResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub const KEY_STORAGE_KIND: &str = "storageKind";
pub const KEY_PATH: &str = "path";
pub const KEY_HOST: &str = "host";
pub const KEY_PORT: &str = "port";
pub const KEY_DATABASE: &str = "database";
pub const KEY_USERNAME: &str = "username";
pub const KEY_PASSWORD: &str = "password";
pub const KEY_TIMEOUT_MS: &str = "timeoutMs";

pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
/// SQLite's busy timeout and PostgreSQL's `statement_timeout` are both
/// signed 32-bit millisecond counts.
pub const MAX_TIMEOUT_MS: u64 = i32::MAX as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    EmbeddedFile,
    Networked,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::EmbeddedFile => "embedded-file",
            BackendKind::Networked    => "networked",
        }
    }

    fn parse(raw: &str) -> PersistResult<Self> {
        match raw {
            "embedded-file" => Ok(BackendKind::EmbeddedFile),
            "networked"     => Ok(BackendKind::Networked),
            other => Err(PersistError::Configuration(format!(
                "unknown {KEY_STORAGE_KIND} '{other}' (expected 'embedded-file' or 'networked')"
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Raw settings ──────────────────────────────────────────────

/// Unvalidated key-value storage settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageSettings {
    values: BTreeMap<String, String>,
}

impl StorageSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Builder-style setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Value for `key`, trimmed. Blank values count as missing.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Parse a flat JSON object. Scalars are stringified; arrays and
    /// nested objects are rejected.
    pub fn from_json_str(content: &str) -> PersistResult<Self> {
        let value: serde_json::Value = serde_json::from_str(content)
            .map_err(|e| PersistError::Configuration(format!("invalid settings JSON: {e}")))?;
        let object = value.as_object().ok_or_else(|| {
            PersistError::Configuration("settings JSON must be an object".to_string())
        })?;

        let mut settings = Self::new();
        for (key, value) in object {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b)   => b.to_string(),
                serde_json::Value::Null      => continue,
                _ => {
                    return Err(PersistError::Configuration(format!(
                        "setting '{key}' must be a scalar value"
                    )))
                }
            };
            settings.set(key.clone(), text);
        }
        Ok(settings)
    }

    /// Load settings from a JSON file on disk.
    pub fn load(path: impl AsRef<Path>) -> PersistResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PersistError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&content)
    }
}

// ── Validated configuration ───────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    pub target:  StorageTarget,
    /// Upper bound for a single storage call (busy wait, statement, connect).
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StorageTarget {
    EmbeddedFile { path: String },
    Networked(NetworkTarget),
}

#[derive(Clone, PartialEq)]
pub struct NetworkTarget {
    pub host:     String,
    pub port:     u16,
    pub database: String,
    pub username: String,
    password:     String,
}

impl NetworkTarget {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for NetworkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl StorageConfig {
    /// Validate raw settings. Fails fast with `PersistError::Configuration`.
    pub fn from_settings(settings: &StorageSettings) -> PersistResult<Self> {
        let kind = BackendKind::parse(required(settings, KEY_STORAGE_KIND, None)?)?;

        let timeout_ms = match settings.get(KEY_TIMEOUT_MS) {
            None => DEFAULT_TIMEOUT_MS,
            Some(raw) => match raw.parse::<u64>() {
                Ok(ms) if (1..=MAX_TIMEOUT_MS).contains(&ms) => ms,
                _ => {
                    return Err(PersistError::Configuration(format!(
                        "{KEY_TIMEOUT_MS} must be an integer in 1..={MAX_TIMEOUT_MS}, got '{raw}'"
                    )))
                }
            },
        };

        let target = match kind {
            BackendKind::EmbeddedFile => StorageTarget::EmbeddedFile {
                path: required(settings, KEY_PATH, Some(kind))?.to_string(),
            },
            BackendKind::Networked => {
                let port = match settings.get(KEY_PORT) {
                    None => DEFAULT_PORT,
                    Some(raw) => match raw.parse::<u16>() {
                        Ok(p) if p > 0 => p,
                        _ => {
                            return Err(PersistError::Configuration(format!(
                                "{KEY_PORT} must be a number in 1..=65535, got '{raw}'"
                            )))
                        }
                    },
                };
                StorageTarget::Networked(NetworkTarget {
                    host:     required(settings, KEY_HOST, Some(kind))?.to_string(),
                    port,
                    database: required(settings, KEY_DATABASE, Some(kind))?.to_string(),
                    username: required(settings, KEY_USERNAME, Some(kind))?.to_string(),
                    // Passwords are taken verbatim; an empty one is allowed.
                    password: settings
                        .values
                        .get(KEY_PASSWORD)
                        .cloned()
                        .unwrap_or_default(),
                })
            }
        };

        Ok(Self {
            target,
            timeout: Duration::from_millis(timeout_ms),
        })
    }

    /// An embedded SQLite file at `path` with the default timeout.
    /// `":memory:"` gives a private in-memory database.
    pub fn embedded(path: impl Into<String>) -> Self {
        Self {
            target:  StorageTarget::EmbeddedFile { path: path.into() },
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    pub fn networked(target: NetworkTarget) -> Self {
        Self {
            target:  StorageTarget::Networked(target),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    /// Override the timeout. Values past `MAX_TIMEOUT_MS` are clamped.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.min(Duration::from_millis(MAX_TIMEOUT_MS));
        self
    }

    pub fn backend(&self) -> BackendKind {
        match self.target {
            StorageTarget::EmbeddedFile { .. } => BackendKind::EmbeddedFile,
            StorageTarget::Networked(_)        => BackendKind::Networked,
        }
    }
}

fn required<'a>(
    settings: &'a StorageSettings,
    key: &str,
    kind: Option<BackendKind>,
) -> PersistResult<&'a str> {
    settings.get(key).ok_or_else(|| {
        PersistError::Configuration(match kind {
            Some(kind) => format!("'{key}' is required for {kind} storage"),
            None => format!("'{key}' is required"),
        })
    })
}
