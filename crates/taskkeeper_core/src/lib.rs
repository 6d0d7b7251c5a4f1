//! Core domain logic for TaskKeeper.
//! Owns the task lifecycle, the offline write path and its durable state.

pub mod audit;
pub mod capability;
pub mod config;
pub mod db;
pub mod listeners;
pub mod logging;
pub mod model;
pub mod repo;
pub mod store;
pub mod sync;

pub use audit::AuditLog;
pub use config::{ConfigError, EngineConfig};
pub use listeners::{Listener, ListenerSet, Subscription};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::audit::AuditLogEntry;
pub use model::task::{
    AttachmentRef, GeoPoint, Importance, Task, TaskDraft, TaskId, TaskStatus,
    TaskValidationError,
};
pub use repo::task_repo::{RepoError, RepoResult, TaskRepository, TaskSnapshot};
pub use store::{KvStore, MemoryKvStore, SqliteKvStore, StoreError, StoreResult};
pub use sync::engine::{EngineCollaborators, EngineError, EngineResult, TaskEngine};
pub use sync::outcome::{Applied, EngineWarning, SyncReport};
pub use sync::upstream::{LocalUpstream, SyncUpstream, UpstreamError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
