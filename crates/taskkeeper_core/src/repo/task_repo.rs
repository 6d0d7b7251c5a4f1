//! Task repository: the single authoritative task collection.
//!
//! # Responsibility
//! - Apply create/status/attachment/delete mutations as immutable snapshots.
//! - Persist `tasks` and the derived `offlineTasks` queue through `KvStore`.
//! - Reconcile both keys on load so an interrupted write never loses a task.
//!
//! # Invariants
//! - Exactly one task per id; ids are never reused.
//! - The pending queue is derived: it is always the tasks with `pending_sync`.
//! - Mutations never edit a shared snapshot in place; readers keep theirs.
//! - `persist` writes the queue before the collection; `commit_merge` writes
//!   the collection before clearing the queue.

use crate::model::task::{
    AttachmentRef, Task, TaskDraft, TaskId, TaskStatus, TaskValidationError,
};
use crate::store::{
    read_records, write_records, KvStore, StoreError, OFFLINE_TASKS_KEY, TASKS_KEY,
};
use chrono::{DateTime, Utc};
use log::{info, warn};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Shared, immutable view of the collection in insertion order.
pub type TaskSnapshot = Arc<Vec<Task>>;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for task mutations and persistence.
#[derive(Debug)]
pub enum RepoError {
    Validation(TaskValidationError),
    NotFound(TaskId),
    DuplicateId(TaskId),
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
    Persistence(StoreError),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::DuplicateId(id) => write!(f, "task id already exists: {id}"),
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
            Self::Persistence(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Persistence(err) => Some(err),
            Self::NotFound(_)
            | Self::DuplicateId(_)
            | Self::InvalidTransition { .. }
            | Self::AttachmentIndexOutOfRange { .. } => None,
        }
    }
}

impl From<TaskValidationError> for RepoError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        Self::Persistence(value)
    }
}

/// Authoritative task collection backed by a key-value store.
pub struct TaskRepository {
    store: Arc<dyn KvStore>,
    tasks: TaskSnapshot,
}

impl TaskRepository {
    /// Creates an empty repository without reading the store.
    pub fn empty(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            tasks: Arc::new(Vec::new()),
        }
    }

    /// Loads `tasks` and `offlineTasks` and reconciles them.
    ///
    /// Queue entries win over collection entries with the same id because the
    /// queue is written first. Queue entries missing from the collection are
    /// appended, which recovers a write interrupted between the two keys.
    ///
    /// # Errors
    /// - `Persistence` when either key cannot be read or decoded, or when a
    ///   stored record fails validation.
    pub fn load(store: Arc<dyn KvStore>) -> RepoResult<Self> {
        let stored: Vec<Task> = read_records(store.as_ref(), TASKS_KEY)?;
        let queued: Vec<Task> = read_records(store.as_ref(), OFFLINE_TASKS_KEY)?;

        for task in stored.iter().chain(queued.iter()) {
            task.validate().map_err(|err| {
                StoreError::InvalidData {
                    key: TASKS_KEY.to_string(),
                    message: format!("task {}: {err}", task.id),
                }
            })?;
        }

        let mut seen = BTreeSet::new();
        let mut tasks = Vec::with_capacity(stored.len());
        let mut dropped_duplicates = 0usize;
        for mut task in stored {
            if !seen.insert(task.id.clone()) {
                dropped_duplicates += 1;
                continue;
            }
            task.pending_sync = false;
            tasks.push(task);
        }

        let mut recovered = 0usize;
        let mut queued_ids = BTreeSet::new();
        for mut task in queued {
            if !queued_ids.insert(task.id.clone()) {
                continue;
            }
            task.pending_sync = true;
            match tasks.iter_mut().find(|existing| existing.id == task.id) {
                Some(slot) => *slot = task,
                None => {
                    recovered += 1;
                    tasks.push(task);
                }
            }
        }

        if dropped_duplicates > 0 {
            warn!(
                "event=repo_load module=repo status=ok dropped_duplicates={dropped_duplicates}"
            );
        }
        info!(
            "event=repo_load module=repo status=ok tasks={} pending={} recovered={}",
            tasks.len(),
            queued_ids.len(),
            recovered
        );

        Ok(Self {
            store,
            tasks: Arc::new(tasks),
        })
    }

    /// Returns the current snapshot in insertion order.
    pub fn list(&self) -> TaskSnapshot {
        Arc::clone(&self.tasks)
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| &task.id == id)
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Ids currently in the pending queue, in insertion order.
    pub fn pending_ids(&self) -> Vec<TaskId> {
        self.tasks
            .iter()
            .filter(|task| task.pending_sync)
            .map(|task| task.id.clone())
            .collect()
    }

    /// The pending queue, derived from the collection.
    pub fn pending_tasks(&self) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|task| task.pending_sync)
            .cloned()
            .collect()
    }

    /// Validates the draft and appends a new `InProgress` task.
    ///
    /// Mutates memory only; call `persist` to make it durable.
    pub fn create(
        &mut self,
        draft: TaskDraft,
        now: DateTime<Utc>,
        pending_sync: bool,
    ) -> RepoResult<Task> {
        let task = Task::from_draft(draft, now, pending_sync)?;
        if self.contains(&task.id) {
            return Err(RepoError::DuplicateId(task.id));
        }
        let mut next = Vec::with_capacity(self.tasks.len() + 1);
        next.extend(self.tasks.iter().cloned());
        next.push(task.clone());
        self.tasks = Arc::new(next);
        Ok(task)
    }

    /// Moves a task to `target`, which must be the next step of the cycle.
    pub fn set_status(
        &mut self,
        id: &TaskId,
        target: TaskStatus,
        mark_pending: bool,
    ) -> RepoResult<Task> {
        self.update(id, mark_pending, |task| {
            if task.status.next() != target {
                return Err(RepoError::InvalidTransition {
                    id: id.clone(),
                    from: task.status,
                    to: target,
                });
            }
            task.status = target;
            Ok(())
        })
    }

    /// Advances a task one step along the status cycle.
    pub fn advance_status(&mut self, id: &TaskId, mark_pending: bool) -> RepoResult<Task> {
        self.update(id, mark_pending, |task| {
            task.status = task.status.next();
            Ok(())
        })
    }

    /// Appends attachments, keeping the given order.
    pub fn add_attachments(
        &mut self,
        id: &TaskId,
        attachments: Vec<AttachmentRef>,
        mark_pending: bool,
    ) -> RepoResult<Task> {
        self.update(id, mark_pending, |task| {
            task.attachments.extend(attachments);
            Ok(())
        })
    }

    /// Removes the attachment at `index`; later entries shift down by one.
    pub fn remove_attachment(
        &mut self,
        id: &TaskId,
        index: usize,
        mark_pending: bool,
    ) -> RepoResult<(Task, AttachmentRef)> {
        let mut removed = None;
        let task = self.update(id, mark_pending, |task| {
            let len = task.attachments.len();
            if index >= len {
                return Err(RepoError::AttachmentIndexOutOfRange {
                    id: id.clone(),
                    index,
                    len,
                });
            }
            removed = Some(task.attachments.remove(index));
            Ok(())
        })?;
        match removed {
            Some(attachment) => Ok((task, attachment)),
            None => Err(RepoError::NotFound(id.clone())),
        }
    }

    /// Removes a task and, implicitly, its pending-queue entry.
    ///
    /// Returns `None` for unknown ids so replayed deletes are harmless.
    pub fn delete(&mut self, id: &TaskId) -> Option<Task> {
        let position = self.tasks.iter().position(|task| &task.id == id)?;
        let mut next = (*self.tasks).clone();
        let removed = next.remove(position);
        self.tasks = Arc::new(next);
        Some(removed)
    }

    /// Writes the derived queue, then the collection.
    pub fn persist(&self) -> RepoResult<()> {
        write_records(self.store.as_ref(), OFFLINE_TASKS_KEY, &self.pending_tasks())?;
        write_records(self.store.as_ref(), TASKS_KEY, self.tasks.as_slice())?;
        Ok(())
    }

    /// Unions merged records into the collection by id and clears their
    /// pending flags.
    ///
    /// The collection is committed before the queue is rewritten. If the
    /// collection write fails nothing changes in memory; if only the queue
    /// write fails the merge stands and a reload re-queues the leftovers,
    /// which the next drain merges again without duplicating them.
    ///
    /// Returns the number of records merged.
    pub fn commit_merge(&mut self, merged: Vec<Task>) -> RepoResult<usize> {
        let mut next = (*self.tasks).clone();
        let count = merged.len();
        for mut incoming in merged {
            incoming.validate()?;
            incoming.pending_sync = false;
            match next.iter_mut().find(|task| task.id == incoming.id) {
                Some(slot) => *slot = incoming,
                None => next.push(incoming),
            }
        }

        write_records(self.store.as_ref(), TASKS_KEY, &next)?;
        self.tasks = Arc::new(next);
        write_records(self.store.as_ref(), OFFLINE_TASKS_KEY, &self.pending_tasks())?;
        Ok(count)
    }

    fn update(
        &mut self,
        id: &TaskId,
        mark_pending: bool,
        apply: impl FnOnce(&mut Task) -> RepoResult<()>,
    ) -> RepoResult<Task> {
        let position = self
            .tasks
            .iter()
            .position(|task| &task.id == id)
            .ok_or_else(|| RepoError::NotFound(id.clone()))?;

        let mut updated = self.tasks[position].clone();
        apply(&mut updated)?;
        updated.pending_sync |= mark_pending;

        let mut next = (*self.tasks).clone();
        next[position] = updated.clone();
        self.tasks = Arc::new(next);
        Ok(updated)
    }
}
