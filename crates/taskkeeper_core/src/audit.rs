//! Append-only audit log.
//!
//! # Responsibility
//! - Record one entry per task lifecycle event.
//! - Persist the full log under `taskLogs`.
//!
//! # Invariants
//! - Entries are only appended; existing entries are never rewritten.
//! - A failed write keeps the entry in memory; the next successful write or
//!   `persist` makes it durable. The task mutation is not rolled back.

use crate::model::audit::AuditLogEntry;
use crate::model::task::TaskId;
use crate::store::{read_records, write_records, KvStore, StoreResult, TASK_LOGS_KEY};
use chrono::{DateTime, Utc};
use log::{error, info};
use std::sync::Arc;

pub struct AuditLog {
    store: Arc<dyn KvStore>,
    entries: Vec<AuditLogEntry>,
}

impl AuditLog {
    /// Creates an empty log without reading the store.
    pub fn empty(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            entries: Vec::new(),
        }
    }

    /// Loads the persisted log.
    pub fn load(store: Arc<dyn KvStore>) -> StoreResult<Self> {
        let entries: Vec<AuditLogEntry> = read_records(store.as_ref(), TASK_LOGS_KEY)?;
        info!(
            "event=audit_load module=audit status=ok entries={}",
            entries.len()
        );
        Ok(Self { store, entries })
    }

    /// Appends an entry stamped with the current time.
    pub fn record(
        &mut self,
        action: impl Into<String>,
        task_id: TaskId,
    ) -> StoreResult<AuditLogEntry> {
        self.record_at(action, task_id, Utc::now())
    }

    /// Appends an entry with an explicit timestamp.
    ///
    /// # Errors
    /// - `StoreError` when `taskLogs` cannot be written; the entry stays
    ///   appended in memory.
    pub fn record_at(
        &mut self,
        action: impl Into<String>,
        task_id: TaskId,
        timestamp: DateTime<Utc>,
    ) -> StoreResult<AuditLogEntry> {
        let entry = AuditLogEntry::new(action, task_id, timestamp);
        self.entries.push(entry.clone());
        if let Err(err) = self.persist() {
            error!(
                "event=audit_record module=audit status=error task_id={} error={}",
                entry.task_id, err
            );
            return Err(err);
        }
        Ok(entry)
    }

    /// Rewrites the whole log.
    pub fn persist(&self) -> StoreResult<()> {
        write_records(self.store.as_ref(), TASK_LOGS_KEY, &self.entries)
    }

    pub fn entries(&self) -> &[AuditLogEntry] {
        &self.entries
    }

    /// Entries referencing one task, oldest first.
    pub fn entries_for(&self, task_id: &TaskId) -> Vec<AuditLogEntry> {
        self.entries
            .iter()
            .filter(|entry| &entry.task_id == task_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
