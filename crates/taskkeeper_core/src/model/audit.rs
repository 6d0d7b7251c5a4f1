//! Audit log record model.
//!
//! # Invariants
//! - Entries are append-only: never mutated or removed after creation.
//! - `task_id` is a reference, not ownership; it may outlive the task.

use crate::model::task::{TaskId, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ACTION_TASK_CREATED: &str = "Task Created";
pub const ACTION_TASK_DELETED: &str = "Task Deleted";
pub const ACTION_ATTACHMENT_ADDED: &str = "Attachment Added";
pub const ACTION_ATTACHMENT_REMOVED: &str = "Attachment Removed";
pub const ACTION_TASK_SYNCED: &str = "Task Synced";

/// Returns the action label for a status transition.
pub fn status_changed_action(status: TaskStatus) -> String {
    format!("Status Changed to {}", status.label())
}

/// One lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    /// Opaque; earlier clients wrote non-UUID ids.
    pub id: String,
    pub action: String,
    pub task_id: TaskId,
    pub timestamp: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Creates an entry with a fresh id stamped at `timestamp`.
    pub fn new(action: impl Into<String>, task_id: TaskId, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action: action.into(),
            task_id,
            timestamp,
        }
    }
}
