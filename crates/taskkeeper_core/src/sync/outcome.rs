//! Result envelopes for engine operations.

use crate::capability::CapabilityError;
use crate::model::task::TaskId;
use chrono::{DateTime, Utc};

/// Non-fatal problem attached to a successful operation.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineWarning {
    /// A device collaborator refused; the operation went ahead without it.
    Capability(CapabilityError),
    /// The audit entry is kept in memory but did not reach the store.
    AuditNotDurable { task_id: TaskId, message: String },
    /// The reminder fire time had already passed, or cannot be represented
    /// (`fire_at` is `None`).
    ReminderSkipped {
        task_id: TaskId,
        fire_at: Option<DateTime<Utc>>,
    },
}

/// Operation value plus the warnings raised while applying it.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied<T> {
    pub value: T,
    pub warnings: Vec<EngineWarning>,
}

impl<T> Applied<T> {
    pub fn new(value: T, warnings: Vec<EngineWarning>) -> Self {
        Self { value, warnings }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Summary of one drain of the pending queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub upstream_id: String,
    /// Records merged into the collection.
    pub merged: usize,
    /// Records still pending after the drain.
    pub remaining: usize,
}
