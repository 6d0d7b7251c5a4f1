//! Due-date reminder contract.

use super::device::{CapabilityError, CapabilityResult, DeviceCapability};
use crate::model::task::{Task, TaskId};
use chrono::{DateTime, Duration, Utc};
use std::sync::{Mutex, MutexGuard};

/// Title of every due-date reminder.
pub const REMINDER_TITLE: &str = "Upcoming Task";

/// One scheduled reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub task_id: TaskId,
    pub title: String,
    pub body: String,
    pub fire_at: DateTime<Utc>,
}

impl Reminder {
    /// Builds the reminder that fires `lead` before the task is due.
    ///
    /// Returns `None` when the fire time falls outside the representable
    /// date range.
    pub fn for_task(task: &Task, lead: Duration) -> Option<Self> {
        let fire_at = task.due_at.checked_sub_signed(lead)?;
        Some(Self {
            task_id: task.id.clone(),
            title: REMINDER_TITLE.to_string(),
            body: format!(
                "Task \"{}\" is due in {} minutes",
                task.title,
                lead.num_minutes()
            ),
            fire_at,
        })
    }
}

/// Accepts reminders and fires them to the user asynchronously.
pub trait NotificationScheduler: Send + Sync {
    fn schedule(&self, reminder: &Reminder) -> CapabilityResult<()>;

    /// Best-effort cancellation for a deleted task.
    fn cancel(&self, task_id: &TaskId) -> CapabilityResult<()> {
        let _ = task_id;
        Ok(())
    }
}

/// Scheduler for hosts without notification support.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopScheduler;

impl NotificationScheduler for NoopScheduler {
    fn schedule(&self, _reminder: &Reminder) -> CapabilityResult<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RecordingState {
    scheduled: Vec<Reminder>,
    cancelled: Vec<TaskId>,
    denied: bool,
}

/// In-memory scheduler the host drains with `take_scheduled`.
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    state: Mutex<RecordingState>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a missing notification permission.
    pub fn set_denied(&self, denied: bool) {
        self.state().denied = denied;
    }

    /// Reminders scheduled and not yet cancelled or taken.
    pub fn scheduled(&self) -> Vec<Reminder> {
        self.state().scheduled.clone()
    }

    /// Removes and returns the scheduled reminders.
    pub fn take_scheduled(&self) -> Vec<Reminder> {
        std::mem::take(&mut self.state().scheduled)
    }

    pub fn cancelled(&self) -> Vec<TaskId> {
        self.state().cancelled.clone()
    }

    fn state(&self) -> MutexGuard<'_, RecordingState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl NotificationScheduler for RecordingScheduler {
    fn schedule(&self, reminder: &Reminder) -> CapabilityResult<()> {
        let mut state = self.state();
        if state.denied {
            return Err(CapabilityError::PermissionDenied(
                DeviceCapability::Notification,
            ));
        }
        state.scheduled.push(reminder.clone());
        Ok(())
    }

    fn cancel(&self, task_id: &TaskId) -> CapabilityResult<()> {
        let mut state = self.state();
        state.scheduled.retain(|reminder| &reminder.task_id != task_id);
        state.cancelled.push(task_id.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{NotificationScheduler, RecordingScheduler, Reminder, REMINDER_TITLE};
    use crate::model::task::{Task, TaskDraft};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn task() -> Task {
        let due = Utc
            .with_ymd_and_hms(2026, 5, 4, 10, 0, 0)
            .single()
            .expect("valid timestamp");
        Task::from_draft(TaskDraft::new("Standup", "daily", due), due, false).expect("task")
    }

    #[test]
    fn reminder_fires_lead_minutes_before_due() {
        let task = task();
        let reminder = Reminder::for_task(&task, Duration::minutes(30)).expect("reminder");
        assert_eq!(reminder.title, REMINDER_TITLE);
        assert_eq!(reminder.body, "Task \"Standup\" is due in 30 minutes");
        assert_eq!(reminder.fire_at, task.due_at - Duration::minutes(30));
    }

    #[test]
    fn cancel_drops_scheduled_reminders_for_task() {
        let scheduler = RecordingScheduler::new();
        let task = task();
        scheduler
            .schedule(&Reminder::for_task(&task, Duration::minutes(30)).expect("reminder"))
            .expect("schedule");
        scheduler.cancel(&task.id).expect("cancel");
        assert!(scheduler.scheduled().is_empty());
        assert_eq!(scheduler.cancelled(), vec![task.id]);
    }

    #[test]
    fn denied_scheduler_reports_permission_error() {
        let scheduler = RecordingScheduler::new();
        scheduler.set_denied(true);
        let err = scheduler
            .schedule(&Reminder::for_task(&task(), Duration::minutes(30)).expect("reminder"))
            .expect_err("denied scheduler must fail");
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn lead_before_earliest_date_yields_no_reminder() {
        let mut task = task();
        task.due_at = DateTime::<Utc>::MIN_UTC;
        assert!(Reminder::for_task(&task, Duration::minutes(30)).is_none());
        assert!(Reminder::for_task(&task, Duration::zero()).is_some());
    }
}
