use chrono::{Duration, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use taskkeeper_core::capability::ManualConnectivity;
use taskkeeper_core::model::audit::{ACTION_TASK_CREATED, ACTION_TASK_DELETED};
use taskkeeper_core::{
    AttachmentRef, EngineCollaborators, EngineConfig, EngineError, Importance, MemoryKvStore,
    TaskDraft, TaskEngine, TaskId, TaskSnapshot, TaskStatus, TaskValidationError,
};

fn online_engine() -> Arc<TaskEngine> {
    let collaborators = EngineCollaborators::new(
        Arc::new(MemoryKvStore::new()),
        Arc::new(ManualConnectivity::new(true)),
    );
    TaskEngine::open(EngineConfig::default(), collaborators).unwrap()
}

fn draft(title: &str) -> TaskDraft {
    TaskDraft::new(title, "details", Utc::now() + Duration::hours(3))
}

#[test]
fn create_starts_in_progress_with_unique_ids() {
    let engine = online_engine();

    let ids: HashSet<TaskId> = (0..20)
        .map(|n| {
            let task = engine.create(draft(&format!("task {n}"))).unwrap().into_value();
            assert_eq!(task.status, TaskStatus::InProgress);
            assert!(!task.pending_sync);
            task.id
        })
        .collect();

    assert_eq!(ids.len(), 20);
    assert_eq!(engine.list().unwrap().len(), 20);
}

#[test]
fn create_keeps_optional_fields() {
    let engine = online_engine();
    let created = engine
        .create(
            draft("Site visit")
                .with_importance(Importance::High)
                .with_attachments(["file:///a.jpg", "file:///b.jpg"]),
        )
        .unwrap()
        .into_value();

    let loaded = engine.get(&created.id).unwrap().unwrap();
    assert_eq!(loaded.importance, Importance::High);
    assert_eq!(
        loaded.attachments,
        vec![AttachmentRef::from("file:///a.jpg"), AttachmentRef::from("file:///b.jpg")]
    );
}

#[test]
fn advance_status_cycles_with_period_three() {
    let engine = online_engine();
    let id = engine.create(draft("cycle")).unwrap().into_value().id;

    let mut seen = Vec::new();
    for _ in 0..6 {
        seen.push(engine.advance_status(&id).unwrap().into_value().status);
    }

    assert_eq!(
        seen,
        vec![
            TaskStatus::Completed,
            TaskStatus::Cancelled,
            TaskStatus::InProgress,
            TaskStatus::Completed,
            TaskStatus::Cancelled,
            TaskStatus::InProgress,
        ]
    );
}

#[test]
fn set_status_accepts_only_the_next_step() {
    let engine = online_engine();
    let id = engine.create(draft("strict")).unwrap().into_value().id;

    let err = engine.set_status(&id, TaskStatus::Cancelled).unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidTransition {
            from: TaskStatus::InProgress,
            to: TaskStatus::Cancelled,
            ..
        }
    ));
    assert_eq!(engine.get(&id).unwrap().unwrap().status, TaskStatus::InProgress);

    let task = engine.set_status(&id, TaskStatus::Completed).unwrap().into_value();
    assert_eq!(task.status, TaskStatus::Completed);
}

#[test]
fn status_change_on_unknown_id_is_not_found() {
    let engine = online_engine();
    let missing = TaskId::generate();

    assert!(matches!(
        engine.advance_status(&missing),
        Err(EngineError::NotFound(id)) if id == missing
    ));
    assert!(engine.audit_entries().unwrap().is_empty());
}

#[test]
fn delete_removes_task_and_is_idempotent() {
    let engine = online_engine();
    let keep = engine.create(draft("keep")).unwrap().into_value().id;
    let drop_id = engine.create(draft("drop")).unwrap().into_value().id;

    assert!(engine.delete(&drop_id).unwrap().into_value());
    let ids: Vec<TaskId> = engine
        .list()
        .unwrap()
        .iter()
        .map(|task| task.id.clone())
        .collect();
    assert_eq!(ids, vec![keep]);

    assert!(!engine.delete(&drop_id).unwrap().into_value());
    assert!(!engine.delete(&TaskId::generate()).unwrap().into_value());

    let deletes = engine
        .audit_entries()
        .unwrap()
        .into_iter()
        .filter(|entry| entry.action == ACTION_TASK_DELETED)
        .count();
    assert_eq!(deletes, 1);
}

#[test]
fn one_audit_entry_per_create_and_status_change() {
    let engine = online_engine();
    let id = engine.create(draft("audited")).unwrap().into_value().id;
    engine.advance_status(&id).unwrap();
    engine.advance_status(&id).unwrap();

    let entries = engine.audit_entries_for(&id).unwrap();
    let actions: Vec<&str> = entries.iter().map(|entry| entry.action.as_str()).collect();
    assert_eq!(
        actions,
        vec![
            ACTION_TASK_CREATED,
            "Status Changed to Completed",
            "Status Changed to Cancelled",
        ]
    );
    assert!(entries.iter().all(|entry| entry.task_id == id));
    let entry_ids: HashSet<&str> = entries.iter().map(|entry| entry.id.as_str()).collect();
    assert_eq!(entry_ids.len(), entries.len());
}

#[test]
fn blank_title_is_rejected_without_side_effects() {
    let engine = online_engine();

    let err = engine
        .create(TaskDraft::new("", "x", Utc::now() + Duration::hours(1)))
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(TaskValidationError::EmptyTitle)
    ));

    let err = engine
        .create(TaskDraft::new("title", "   ", Utc::now() + Duration::hours(1)))
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(TaskValidationError::EmptyDescription)
    ));

    assert!(engine.list().unwrap().is_empty());
    assert!(engine.audit_entries().unwrap().is_empty());
}

#[test]
fn attachments_are_appended_and_removed_positionally() {
    let engine = online_engine();
    let id = engine
        .create(draft("photos").with_attachments(["a", "b"]))
        .unwrap()
        .into_value()
        .id;

    let task = engine
        .add_attachments(&id, vec![AttachmentRef::from("c")])
        .unwrap()
        .into_value();
    assert_eq!(task.attachments.len(), 3);

    let (task, removed) = engine.remove_attachment(&id, 1).unwrap().into_value();
    assert_eq!(removed, AttachmentRef::from("b"));
    assert_eq!(
        task.attachments,
        vec![AttachmentRef::from("a"), AttachmentRef::from("c")]
    );

    let err = engine.remove_attachment(&id, 5).unwrap_err();
    assert!(matches!(
        err,
        EngineError::AttachmentIndexOutOfRange { index: 5, len: 2, .. }
    ));
}

#[test]
fn observers_receive_each_committed_snapshot() {
    let engine = online_engine();
    let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = engine.subscribe(Arc::new(move |snapshot: &TaskSnapshot| {
        sink.lock().unwrap().push(snapshot.len());
    }));

    let id = engine.create(draft("one")).unwrap().into_value().id;
    engine.create(draft("two")).unwrap();
    engine.delete(&id).unwrap();
    let _ = engine.create(TaskDraft::new("", "", Utc::now()));

    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 1]);

    subscription.unsubscribe();
    engine.create(draft("three")).unwrap();
    assert_eq!(seen.lock().unwrap().len(), 3);
}

#[test]
fn snapshots_held_by_readers_do_not_change() {
    let engine = online_engine();
    let id = engine.create(draft("stable")).unwrap().into_value().id;
    let before = engine.list().unwrap();

    engine.advance_status(&id).unwrap();

    assert_eq!(before[0].status, TaskStatus::InProgress);
    assert_eq!(engine.list().unwrap()[0].status, TaskStatus::Completed);
}
