use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use taskkeeper_core::capability::{
    AttachmentPicker, CapabilityError, CapabilityResult, DeviceCapability, GeolocationProvider,
    ManualConnectivity, RecordingScheduler, Reminder, REMINDER_TITLE,
};
use taskkeeper_core::{
    AttachmentRef, EngineCollaborators, EngineConfig, EngineWarning, GeoPoint, MemoryKvStore,
    TaskDraft, TaskEngine,
};

fn engine_with(scheduler: Arc<RecordingScheduler>, config: EngineConfig) -> Arc<TaskEngine> {
    let collaborators = EngineCollaborators::new(
        Arc::new(MemoryKvStore::new()),
        Arc::new(ManualConnectivity::new(true)),
    )
    .with_scheduler(scheduler);
    TaskEngine::open(config, collaborators).unwrap()
}

#[test]
fn create_schedules_reminder_thirty_minutes_before_due() {
    let scheduler = Arc::new(RecordingScheduler::new());
    let engine = engine_with(scheduler.clone(), EngineConfig::default());
    let due_at = Utc::now() + Duration::hours(2);

    let task = engine
        .create(TaskDraft::new("Dentist", "checkup", due_at))
        .unwrap()
        .into_value();

    let scheduled = scheduler.scheduled();
    assert_eq!(scheduled.len(), 1);
    let reminder = &scheduled[0];
    assert_eq!(reminder.task_id, task.id);
    assert_eq!(reminder.title, REMINDER_TITLE);
    assert_eq!(reminder.body, "Task \"Dentist\" is due in 30 minutes");
    assert_eq!(reminder.fire_at, due_at - Duration::minutes(30));
}

#[test]
fn reminder_lead_is_configurable() {
    let scheduler = Arc::new(RecordingScheduler::new());
    let config = EngineConfig {
        reminder_lead_minutes: 10,
        ..EngineConfig::default()
    };
    let engine = engine_with(scheduler.clone(), config);
    let due_at = Utc::now() + Duration::hours(1);

    engine
        .create(TaskDraft::new("Call", "mom", due_at))
        .unwrap();

    assert_eq!(scheduler.scheduled()[0].fire_at, due_at - Duration::minutes(10));
}

#[test]
fn past_fire_time_is_skipped_with_warning() {
    let scheduler = Arc::new(RecordingScheduler::new());
    let engine = engine_with(scheduler.clone(), EngineConfig::default());

    let applied = engine
        .create(TaskDraft::new("Soon", "now", Utc::now() + Duration::minutes(5)))
        .unwrap();

    assert!(scheduler.scheduled().is_empty());
    assert!(matches!(
        applied.warnings.as_slice(),
        [EngineWarning::ReminderSkipped { .. }]
    ));
    assert_eq!(engine.list().unwrap().len(), 1);
}

#[test]
fn due_date_at_earliest_instant_skips_reminder_instead_of_failing() {
    let scheduler = Arc::new(RecordingScheduler::new());
    let engine = engine_with(scheduler.clone(), EngineConfig::default());

    let applied = engine
        .create(TaskDraft::new("Ancient", "epoch", DateTime::<Utc>::MIN_UTC))
        .unwrap();

    assert!(scheduler.scheduled().is_empty());
    assert_eq!(
        applied.warnings,
        vec![EngineWarning::ReminderSkipped {
            task_id: applied.value.id.clone(),
            fire_at: None,
        }]
    );
    assert!(engine.deliver_reminder_for(&applied.value.id).unwrap());
    assert_eq!(engine.list().unwrap().len(), 1);
}

#[test]
fn denied_notification_permission_is_non_fatal() {
    let scheduler = Arc::new(RecordingScheduler::new());
    scheduler.set_denied(true);
    let engine = engine_with(scheduler.clone(), EngineConfig::default());

    let applied = engine
        .create(TaskDraft::new("Quiet", "no alerts", Utc::now() + Duration::hours(4)))
        .unwrap();

    assert_eq!(
        applied.warnings,
        vec![EngineWarning::Capability(CapabilityError::PermissionDenied(
            DeviceCapability::Notification
        ))]
    );
    assert!(engine.get(&applied.value.id).unwrap().is_some());
}

#[test]
fn delete_cancels_reminder_and_suppresses_delivery() {
    let scheduler = Arc::new(RecordingScheduler::new());
    let engine = engine_with(scheduler.clone(), EngineConfig::default());
    let task = engine
        .create(TaskDraft::new("Gone", "soon", Utc::now() + Duration::hours(3)))
        .unwrap()
        .into_value();
    let reminder = scheduler.scheduled()[0].clone();
    assert!(engine.deliver_reminder(&reminder).unwrap());

    engine.delete(&task.id).unwrap();

    assert!(scheduler.scheduled().is_empty());
    assert_eq!(scheduler.cancelled(), vec![task.id]);
    assert!(!engine.deliver_reminder(&reminder).unwrap());
}

#[test]
fn finished_tasks_do_not_deliver_reminders() {
    let engine = engine_with(Arc::new(RecordingScheduler::new()), EngineConfig::default());
    let task = engine
        .create(TaskDraft::new("Done", "early", Utc::now() + Duration::hours(3)))
        .unwrap()
        .into_value();
    let reminder = Reminder::for_task(&task, Duration::minutes(30)).unwrap();

    engine.advance_status(&task.id).unwrap();
    assert!(!engine.deliver_reminder(&reminder).unwrap());

    engine.advance_status(&task.id).unwrap();
    engine.advance_status(&task.id).unwrap();
    assert!(engine.deliver_reminder(&reminder).unwrap());
}

struct DeniedLocation;

impl GeolocationProvider for DeniedLocation {
    fn current_location(&self) -> CapabilityResult<GeoPoint> {
        Err(CapabilityError::PermissionDenied(DeviceCapability::Location))
    }
}

struct OnePhoto;

impl AttachmentPicker for OnePhoto {
    fn pick(&self) -> CapabilityResult<Vec<AttachmentRef>> {
        Ok(vec![AttachmentRef::from("file:///photo.jpg")])
    }
}

#[test]
fn create_with_inputs_keeps_going_without_location() {
    let engine = engine_with(Arc::new(RecordingScheduler::new()), EngineConfig::default());

    let applied = engine
        .create_with_inputs(
            TaskDraft::new("Hike", "trail", Utc::now() + Duration::hours(5)),
            Some(&DeniedLocation),
            Some(&OnePhoto),
        )
        .unwrap();

    assert_eq!(applied.value.location, None);
    assert_eq!(
        applied.value.attachments,
        vec![AttachmentRef::from("file:///photo.jpg")]
    );
    assert_eq!(
        applied.warnings,
        vec![EngineWarning::Capability(CapabilityError::PermissionDenied(
            DeviceCapability::Location
        ))]
    );
}
