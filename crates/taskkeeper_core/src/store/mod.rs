//! Durable key-value persistence contract.
//!
//! # Responsibility
//! - Define the `get`/`set` boundary the core persists through.
//! - Encode record collections (`tasks`, `offlineTasks`, `taskLogs`) as JSON arrays.
//!
//! # Invariants
//! - The core never assumes atomicity across two keys.
//! - A missing key reads as an empty collection.
//! - Implementations fail with `StoreError`, never panic.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod memory_store;
mod sqlite_store;

pub use memory_store::MemoryKvStore;
pub use sqlite_store::SqliteKvStore;

/// Key holding the authoritative task collection.
pub const TASKS_KEY: &str = "tasks";
/// Key holding tasks written while offline and not yet merged.
pub const OFFLINE_TASKS_KEY: &str = "offlineTasks";
/// Key holding the append-only audit log.
pub const TASK_LOGS_KEY: &str = "taskLogs";

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable store failure.
#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    /// The database file was written by a newer build.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    Serialization { key: String, source: serde_json::Error },
    Unavailable(String),
    InvalidData { key: String, message: String },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite error: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::Serialization { key, source } => {
                write!(f, "failed to encode/decode `{key}`: {source}")
            }
            Self::Unavailable(key) => write!(f, "store unavailable for key `{key}`"),
            Self::InvalidData { key, message } => {
                write!(f, "invalid persisted data in `{key}`: {message}")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Serialization { source, .. } => Some(source),
            Self::UnsupportedSchemaVersion { .. }
            | Self::Unavailable(_)
            | Self::InvalidData { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Key-value store the core persists through.
///
/// Calls may block the caller but must complete or fail within the store's
/// configured timeout.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()>;
}

/// Reads one JSON record collection; a missing key yields an empty vector.
pub fn read_records<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> StoreResult<Vec<T>> {
    match store.get(key)? {
        Some(bytes) if !bytes.is_empty() => {
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Serialization {
                key: key.to_string(),
                source,
            })
        }
        _ => Ok(Vec::new()),
    }
}

/// Replaces one JSON record collection.
pub fn write_records<T: Serialize>(store: &dyn KvStore, key: &str, records: &[T]) -> StoreResult<()> {
    let bytes = serde_json::to_vec(records).map_err(|source| StoreError::Serialization {
        key: key.to_string(),
        source,
    })?;
    store.set(key, &bytes)
}
