//! Task engine: serialized write path with offline queueing.
//!
//! # Responsibility
//! - Single entry point for create/status/attachment/delete intents.
//! - Queue writes made while disconnected and drain them on reconnect.
//! - Record audit entries, schedule reminders, notify snapshot observers.
//!
//! # Invariants
//! - Every mutation runs under `state`; connectivity handling contends for the
//!   same lock, so no two read-modify-write sequences interleave.
//! - Offline marking uses the reachability recorded under the lock, so a
//!   write is either pending before a drain or applied after it.
//! - Store writes complete (or fail) before the lock is released.
//! - External collaborators (scheduler, observers) are called without the lock.
//! - A failed store write leaves memory ahead of disk; `flush` retries it.

use crate::audit::AuditLog;
use crate::capability::{
    apply_current_location, apply_picked_attachments, AttachmentPicker, ConnectivityMonitor,
    GeolocationProvider, NoopScheduler, NotificationScheduler, Reminder,
};
use crate::config::{ConfigError, EngineConfig};
use crate::listeners::{Listener, ListenerSet, Subscription};
use crate::model::audit::{
    status_changed_action, AuditLogEntry, ACTION_ATTACHMENT_ADDED, ACTION_ATTACHMENT_REMOVED,
    ACTION_TASK_CREATED, ACTION_TASK_DELETED, ACTION_TASK_SYNCED,
};
use crate::model::task::{
    AttachmentRef, Task, TaskDraft, TaskId, TaskStatus, TaskValidationError,
};
use crate::repo::task_repo::{RepoError, RepoResult, TaskRepository, TaskSnapshot};
use crate::store::{KvStore, StoreError};
use crate::sync::outcome::{Applied, EngineWarning, SyncReport};
use crate::sync::upstream::{LocalUpstream, SyncUpstream, UpstreamError};
use chrono::Utc;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

pub type EngineResult<T> = Result<T, EngineError>;

/// Caller-facing error for engine operations.
#[derive(Debug)]
pub enum EngineError {
    /// Required draft fields are missing; nothing was mutated.
    Validation(TaskValidationError),
    /// The referenced task id is unknown.
    NotFound(TaskId),
    InvalidTransition {
        id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },
    AttachmentIndexOutOfRange {
        id: TaskId,
        index: usize,
        len: usize,
    },
    DuplicateId(TaskId),
    /// Durable write failed; memory may be ahead of the store until `flush`.
    Persistence(StoreError),
    Upstream(UpstreamError),
    Config(ConfigError),
    /// A previous holder of the engine lock panicked.
    Poisoned,
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::InvalidTransition { id, from, to } => write!(
                f,
                "task {id} cannot move from `{}` to `{}`",
                from.as_str(),
                to.as_str()
            ),
            Self::AttachmentIndexOutOfRange { id, index, len } => write!(
                f,
                "task {id} has {len} attachment(s); index {index} is out of range"
            ),
            Self::DuplicateId(id) => write!(f, "task id already exists: {id}"),
            Self::Persistence(err) => write!(f, "persistence failed: {err}"),
            Self::Upstream(err) => write!(f, "sync upstream failed: {err}"),
            Self::Config(err) => write!(f, "{err}"),
            Self::Poisoned => write!(f, "task engine state lock is poisoned"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Persistence(err) => Some(err),
            Self::Upstream(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::NotFound(_)
            | Self::InvalidTransition { .. }
            | Self::AttachmentIndexOutOfRange { .. }
            | Self::DuplicateId(_)
            | Self::Poisoned => None,
        }
    }
}

impl From<RepoError> for EngineError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::DuplicateId(id) => Self::DuplicateId(id),
            RepoError::InvalidTransition { id, from, to } => {
                Self::InvalidTransition { id, from, to }
            }
            RepoError::AttachmentIndexOutOfRange { id, index, len } => {
                Self::AttachmentIndexOutOfRange { id, index, len }
            }
            RepoError::Persistence(err) => Self::Persistence(err),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        Self::Persistence(value)
    }
}

impl From<UpstreamError> for EngineError {
    fn from(value: UpstreamError) -> Self {
        Self::Upstream(value)
    }
}

impl From<ConfigError> for EngineError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

/// External collaborators wired into an engine.
pub struct EngineCollaborators {
    pub store: Arc<dyn KvStore>,
    pub connectivity: Arc<dyn ConnectivityMonitor>,
    pub scheduler: Arc<dyn NotificationScheduler>,
    pub upstream: Arc<dyn SyncUpstream>,
}

impl EngineCollaborators {
    /// Uses `NoopScheduler` and `LocalUpstream` until overridden.
    pub fn new(store: Arc<dyn KvStore>, connectivity: Arc<dyn ConnectivityMonitor>) -> Self {
        Self {
            store,
            connectivity,
            scheduler: Arc::new(NoopScheduler),
            upstream: Arc::new(LocalUpstream),
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn NotificationScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_upstream(mut self, upstream: Arc<dyn SyncUpstream>) -> Self {
        self.upstream = upstream;
        self
    }
}

struct EngineState {
    repo: TaskRepository,
    audit: AuditLog,
    /// Last reachability seen by the engine, used to detect transitions.
    online: bool,
}

/// Serialized task lifecycle engine shared behind an `Arc`.
pub struct TaskEngine {
    config: EngineConfig,
    connectivity: Arc<dyn ConnectivityMonitor>,
    scheduler: Arc<dyn NotificationScheduler>,
    upstream: Arc<dyn SyncUpstream>,
    state: Mutex<EngineState>,
    observers: ListenerSet<TaskSnapshot>,
    connectivity_subscription: Mutex<Option<Subscription>>,
}

impl TaskEngine {
    /// Loads persisted state, subscribes to connectivity, and drains any
    /// queue left behind by a previous run when already connected.
    ///
    /// # Errors
    /// - `Config` for an invalid configuration.
    /// - `Persistence` when stored collections cannot be read or decoded.
    pub fn open(
        config: EngineConfig,
        collaborators: EngineCollaborators,
    ) -> EngineResult<Arc<Self>> {
        let started_at = Instant::now();
        config.validate()?;

        let EngineCollaborators {
            store,
            connectivity,
            scheduler,
            upstream,
        } = collaborators;

        let repo = TaskRepository::load(Arc::clone(&store))?;
        let audit = AuditLog::load(Arc::clone(&store))?;
        let pending = repo.pending_ids().len();

        let engine = Arc::new(Self {
            config,
            connectivity,
            scheduler,
            upstream,
            state: Mutex::new(EngineState {
                repo,
                audit,
                online: false,
            }),
            observers: ListenerSet::new(),
            connectivity_subscription: Mutex::new(None),
        });

        let weak = Arc::downgrade(&engine);
        let subscription = engine
            .connectivity
            .subscribe(Arc::new(move |connected: &bool| {
                if let Some(engine) = weak.upgrade() {
                    engine.handle_connectivity_change(*connected);
                }
            }));
        if let Ok(mut slot) = engine.connectivity_subscription.lock() {
            *slot = Some(subscription);
        }

        // Reachability read after subscribing so no transition is missed.
        engine.handle_connectivity_change(engine.connectivity.is_connected());

        info!(
            "event=engine_open module=sync status=ok pending={} online={} upstream={} duration_ms={}",
            pending,
            engine.connectivity.is_connected(),
            engine.upstream.upstream_id(),
            started_at.elapsed().as_millis()
        );
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Creates a task from a draft.
    ///
    /// While disconnected the task is marked `pending_sync` and queued; it is
    /// visible in `list` either way. A reminder is scheduled `reminder_lead`
    /// before `due_at`.
    ///
    /// # Errors
    /// - `Validation` when title or description is blank; nothing changes.
    /// - `Persistence` when the store write fails; the task stays in memory.
    pub fn create(&self, draft: TaskDraft) -> EngineResult<Applied<Task>> {
        let mut applied = self.apply_mutation(
            "task_create",
            |repo, offline| repo.create(draft, Utc::now(), offline),
            |task| (task.id.clone(), ACTION_TASK_CREATED.to_string()),
        );
        if let Ok(Applied { value, warnings }) = &mut applied {
            self.schedule_reminder(value, warnings);
        }
        applied
    }

    /// Creates a task after filling location and attachments from devices.
    ///
    /// A refused device leaves its field as drafted and is reported as a
    /// warning; the task is still created.
    pub fn create_with_inputs(
        &self,
        mut draft: TaskDraft,
        location: Option<&dyn GeolocationProvider>,
        picker: Option<&dyn AttachmentPicker>,
    ) -> EngineResult<Applied<Task>> {
        let mut skipped = Vec::new();
        if let Some(provider) = location {
            skipped.extend(apply_current_location(&mut draft, provider));
        }
        if let Some(picker) = picker {
            skipped.extend(apply_picked_attachments(&mut draft, picker));
        }

        let mut applied = self.create(draft)?;
        let mut warnings: Vec<EngineWarning> =
            skipped.into_iter().map(EngineWarning::Capability).collect();
        warnings.append(&mut applied.warnings);
        applied.warnings = warnings;
        Ok(applied)
    }

    /// Moves a task to `target`, which must be the next step of the cycle.
    pub fn set_status(&self, id: &TaskId, target: TaskStatus) -> EngineResult<Applied<Task>> {
        self.apply_mutation(
            "task_status",
            |repo, offline| repo.set_status(id, target, offline),
            |task| (task.id.clone(), status_changed_action(task.status)),
        )
    }

    /// Advances a task one step: InProgress -> Completed -> Cancelled -> InProgress.
    pub fn advance_status(&self, id: &TaskId) -> EngineResult<Applied<Task>> {
        self.apply_mutation(
            "task_status",
            |repo, offline| repo.advance_status(id, offline),
            |task| (task.id.clone(), status_changed_action(task.status)),
        )
    }

    /// Appends attachments in the given order.
    pub fn add_attachments(
        &self,
        id: &TaskId,
        attachments: Vec<AttachmentRef>,
    ) -> EngineResult<Applied<Task>> {
        self.apply_mutation(
            "task_attachment_add",
            |repo, offline| repo.add_attachments(id, attachments, offline),
            |task| (task.id.clone(), ACTION_ATTACHMENT_ADDED.to_string()),
        )
    }

    /// Removes the attachment at `index` and returns it.
    pub fn remove_attachment(
        &self,
        id: &TaskId,
        index: usize,
    ) -> EngineResult<Applied<(Task, AttachmentRef)>> {
        self.apply_mutation(
            "task_attachment_remove",
            |repo, offline| repo.remove_attachment(id, index, offline),
            |(task, _)| (task.id.clone(), ACTION_ATTACHMENT_REMOVED.to_string()),
        )
    }

    /// Deletes a task and its queue entry, and cancels its reminder.
    ///
    /// Unknown ids are a no-op returning `false`, so replayed deletes are safe.
    pub fn delete(&self, id: &TaskId) -> EngineResult<Applied<bool>> {
        let mut warnings = Vec::new();
        let (snapshot, persisted) = {
            let mut state = self.lock_state()?;
            if state.repo.delete(id).is_none() {
                info!("event=task_delete module=sync status=skip task_id={id} reason=not_found");
                return Ok(Applied::new(false, warnings));
            }
            let persisted = state.repo.persist();
            record_audit(&mut state.audit, ACTION_TASK_DELETED, id.clone(), &mut warnings);
            (state.repo.list(), persisted)
        };

        self.observers.notify(&snapshot);
        if let Err(err) = self.scheduler.cancel(id) {
            warn!("event=reminder_cancel module=sync status=skip task_id={id} error={err}");
            warnings.push(EngineWarning::Capability(err));
        }

        if let Err(err) = persisted {
            error!(
                "event=task_delete module=sync status=error task_id={id} error_code=persist_failed error={err}"
            );
            return Err(err.into());
        }
        info!("event=task_delete module=sync status=ok task_id={id}");
        Ok(Applied::new(true, warnings))
    }

    /// Current snapshot in insertion order.
    pub fn list(&self) -> EngineResult<TaskSnapshot> {
        Ok(self.lock_state()?.repo.list())
    }

    pub fn get(&self, id: &TaskId) -> EngineResult<Option<Task>> {
        Ok(self.lock_state()?.repo.get(id).cloned())
    }

    /// Ids in the pending queue, in insertion order.
    pub fn pending_ids(&self) -> EngineResult<Vec<TaskId>> {
        Ok(self.lock_state()?.repo.pending_ids())
    }

    pub fn audit_entries(&self) -> EngineResult<Vec<AuditLogEntry>> {
        Ok(self.lock_state()?.audit.entries().to_vec())
    }

    pub fn audit_entries_for(&self, id: &TaskId) -> EngineResult<Vec<AuditLogEntry>> {
        Ok(self.lock_state()?.audit.entries_for(id))
    }

    /// Reachability as last observed through the connectivity stream.
    pub fn is_online(&self) -> EngineResult<bool> {
        Ok(self.lock_state()?.online)
    }

    /// Registers a view-layer observer called with each committed snapshot.
    pub fn subscribe(&self, listener: Listener<TaskSnapshot>) -> Subscription {
        self.observers.subscribe(listener)
    }

    /// Drains the pending queue now, regardless of the last transition.
    ///
    /// Safe to repeat: a second drain finds nothing pending and merges nothing.
    pub fn sync_now(&self) -> EngineResult<Applied<SyncReport>> {
        let (applied, snapshot) = {
            let mut state = self.lock_state()?;
            let applied = self.drain_locked(&mut state)?;
            (applied, state.repo.list())
        };
        if applied.value.merged > 0 {
            self.observers.notify(&snapshot);
        }
        Ok(applied)
    }

    /// Re-persists tasks, queue and audit log from memory.
    pub fn flush(&self) -> EngineResult<()> {
        let state = self.lock_state()?;
        state.repo.persist()?;
        state.audit.persist()?;
        info!(
            "event=engine_flush module=sync status=ok tasks={} audit_entries={}",
            state.repo.len(),
            state.audit.len()
        );
        Ok(())
    }

    /// Decides whether a fired reminder should still be shown.
    ///
    /// Returns `false` when the task was deleted or is no longer in progress.
    pub fn deliver_reminder(&self, reminder: &Reminder) -> EngineResult<bool> {
        self.deliver_reminder_for(&reminder.task_id)
    }

    /// Same decision as `deliver_reminder`, keyed by task id.
    pub fn deliver_reminder_for(&self, task_id: &TaskId) -> EngineResult<bool> {
        let state = self.lock_state()?;
        let deliver = state.repo.get(task_id).is_some_and(Task::is_open);
        info!(
            "event=reminder_deliver module=sync status={} task_id={}",
            if deliver { "ok" } else { "skip" },
            task_id
        );
        Ok(deliver)
    }

    fn handle_connectivity_change(&self, connected: bool) {
        let outcome = {
            let mut state = match self.lock_state() {
                Ok(state) => state,
                Err(err) => {
                    error!("event=connectivity_change module=sync status=error error={err}");
                    return;
                }
            };
            let was_online = state.online;
            state.online = connected;
            if !connected || was_online {
                return;
            }
            self.drain_locked(&mut state)
                .map(|applied| (applied, state.repo.list()))
        };

        match outcome {
            Ok((applied, snapshot)) => {
                if applied.value.merged > 0 {
                    self.observers.notify(&snapshot);
                }
            }
            Err(err) => {
                error!(
                    "event=sync_drain module=sync status=error trigger=reconnect error={err}"
                );
            }
        }
    }

    fn drain_locked(&self, state: &mut EngineState) -> EngineResult<Applied<SyncReport>> {
        let started_at = Instant::now();
        let upstream_id = self.upstream.upstream_id().to_string();
        let pending = state.repo.pending_tasks();
        let mut warnings = Vec::new();

        if pending.is_empty() {
            return Ok(Applied::new(
                SyncReport {
                    upstream_id,
                    merged: 0,
                    remaining: 0,
                },
                warnings,
            ));
        }

        info!(
            "event=sync_drain module=sync status=start pending={} upstream={}",
            pending.len(),
            upstream_id
        );
        let merged = self.upstream.push_pending(&pending)?;
        let merged_ids: Vec<TaskId> = merged.iter().map(|task| task.id.clone()).collect();
        let merged_count = state.repo.commit_merge(merged)?;

        if self.config.audit_sync_events {
            for id in merged_ids {
                record_audit(&mut state.audit, ACTION_TASK_SYNCED, id, &mut warnings);
            }
        }

        let remaining = state.repo.pending_ids().len();
        info!(
            "event=sync_drain module=sync status=ok merged={} remaining={} upstream={} duration_ms={}",
            merged_count,
            remaining,
            upstream_id,
            started_at.elapsed().as_millis()
        );
        Ok(Applied::new(
            SyncReport {
                upstream_id,
                merged: merged_count,
                remaining,
            },
            warnings,
        ))
    }

    fn apply_mutation<T>(
        &self,
        event: &'static str,
        mutate: impl FnOnce(&mut TaskRepository, bool) -> RepoResult<T>,
        describe: impl FnOnce(&T) -> (TaskId, String),
    ) -> EngineResult<Applied<T>> {
        let started_at = Instant::now();
        let mut warnings = Vec::new();

        let (value, task_id, offline, snapshot, persisted) = {
            let mut state = self.lock_state()?;
            let offline = !state.online;
            let value = mutate(&mut state.repo, offline).map_err(|err| {
                warn!("event={event} module=sync status=error error={err}");
                EngineError::from(err)
            })?;
            let persisted = state.repo.persist();
            let (task_id, action) = describe(&value);
            record_audit(&mut state.audit, action, task_id.clone(), &mut warnings);
            (value, task_id, offline, state.repo.list(), persisted)
        };

        self.observers.notify(&snapshot);

        if let Err(err) = persisted {
            error!(
                "event={event} module=sync status=error task_id={task_id} error_code=persist_failed error={err}"
            );
            return Err(err.into());
        }
        info!(
            "event={} module=sync status=ok task_id={} offline={} duration_ms={}",
            event,
            task_id,
            offline,
            started_at.elapsed().as_millis()
        );
        Ok(Applied::new(value, warnings))
    }

    fn schedule_reminder(&self, task: &Task, warnings: &mut Vec<EngineWarning>) {
        let reminder = match Reminder::for_task(task, self.config.reminder_lead()) {
            Some(reminder) if reminder.fire_at > Utc::now() => reminder,
            Some(reminder) => {
                info!(
                    "event=reminder_schedule module=sync status=skip task_id={} reason=fire_time_passed",
                    task.id
                );
                warnings.push(EngineWarning::ReminderSkipped {
                    task_id: task.id.clone(),
                    fire_at: Some(reminder.fire_at),
                });
                return;
            }
            None => {
                info!(
                    "event=reminder_schedule module=sync status=skip task_id={} reason=fire_time_out_of_range",
                    task.id
                );
                warnings.push(EngineWarning::ReminderSkipped {
                    task_id: task.id.clone(),
                    fire_at: None,
                });
                return;
            }
        };
        match self.scheduler.schedule(&reminder) {
            Ok(()) => info!(
                "event=reminder_schedule module=sync status=ok task_id={} fire_at={}",
                task.id,
                reminder.fire_at.to_rfc3339()
            ),
            Err(err) => {
                warn!(
                    "event=reminder_schedule module=sync status=skip task_id={} error={}",
                    task.id, err
                );
                warnings.push(EngineWarning::Capability(err));
            }
        }
    }

    fn lock_state(&self) -> EngineResult<MutexGuard<'_, EngineState>> {
        self.state.lock().map_err(|_| EngineError::Poisoned)
    }
}

fn record_audit(
    audit: &mut AuditLog,
    action: impl Into<String>,
    task_id: TaskId,
    warnings: &mut Vec<EngineWarning>,
) {
    if let Err(err) = audit.record(action, task_id.clone()) {
        warnings.push(EngineWarning::AuditNotDurable {
            task_id,
            message: err.to_string(),
        });
    }
}
