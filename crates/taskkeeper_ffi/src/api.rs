//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose task lifecycle use cases to Dart via FRB.
//! - Own the process-wide engine and the host-driven collaborators behind it.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Every call that can fail returns an envelope with `ok` and `message`.
//! - The engine is opened at most once per process; later calls reuse it.

use chrono::{DateTime, TimeZone, Utc};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use taskkeeper_core::capability::{ManualConnectivity, RecordingScheduler};
use taskkeeper_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    AttachmentRef, EngineCollaborators, EngineConfig, EngineWarning, GeoPoint, Importance,
    SqliteKvStore, Task, TaskDraft, TaskEngine, TaskId,
};

static ENGINE: OnceLock<EngineHandle> = OnceLock::new();

struct EngineHandle {
    db_path: PathBuf,
    engine: Arc<TaskEngine>,
    connectivity: ManualConnectivity,
    scheduler: Arc<RecordingScheduler>,
}

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir`.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Generic response envelope for calls without a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub ok: bool,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl ActionResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// Task projection handed to the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub due_epoch_ms: i64,
    /// `in-progress|completed|cancelled`.
    pub status: String,
    /// `low|medium|high`.
    pub importance: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub attachments: Vec<String>,
    pub created_epoch_ms: i64,
    pub pending_sync: bool,
}

/// Response envelope for single-task mutations.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskActionResponse {
    pub ok: bool,
    pub task: Option<TaskItem>,
    /// Non-fatal problems, e.g. a refused notification permission.
    pub warnings: Vec<String>,
    pub message: String,
}

impl TaskActionResponse {
    fn success(message: impl Into<String>, task: &Task, warnings: &[EngineWarning]) -> Self {
        Self {
            ok: true,
            task: Some(to_task_item(task)),
            warnings: warnings.iter().map(describe_warning).collect(),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            task: None,
            warnings: Vec::new(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskListResponse {
    pub ok: bool,
    pub items: Vec<TaskItem>,
    pub pending_count: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResponse {
    pub ok: bool,
    pub merged: u32,
    pub remaining: u32,
    pub message: String,
}

/// Reminder the host should hand to the platform notification service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderItem {
    pub task_id: String,
    pub title: String,
    pub body: String,
    pub fire_epoch_ms: i64,
}

/// Opens the task engine over a SQLite file.
///
/// Input semantics:
/// - `db_path`: file path of the task store; created when missing.
/// - `config_json`: JSON object of engine settings; empty uses defaults.
///   When it sets `log_dir`, file logging starts before the store opens.
///
/// # FFI contract
/// - Sync call; performs DB bootstrap.
/// - The engine starts offline: writes are queued until the host reports
///   reachability through `set_connectivity(true)`, which drains the queue.
/// - Repeating the call with the same `db_path` is a no-op.
/// - A different `db_path` after a successful init is rejected.
#[flutter_rust_bridge::frb(sync)]
pub fn init_engine(db_path: String, config_json: String) -> ActionResponse {
    let db_path = PathBuf::from(db_path.trim());
    if db_path.as_os_str().is_empty() {
        return ActionResponse::failure("init_engine failed: db_path cannot be empty");
    }

    if let Some(handle) = ENGINE.get() {
        return check_same_db(handle, &db_path);
    }

    let config = match EngineConfig::from_json_str(&config_json) {
        Ok(config) => config,
        Err(err) => return ActionResponse::failure(format!("init_engine failed: {err}")),
    };
    if let Err(err) = config.start_logging() {
        return ActionResponse::failure(format!("init_engine failed: {err}"));
    }

    let handle = match open_engine(db_path.clone(), config) {
        Ok(handle) => handle,
        Err(message) => return ActionResponse::failure(format!("init_engine failed: {message}")),
    };
    // A concurrent init may have won; the stored handle is authoritative.
    let _ = ENGINE.set(handle);
    match ENGINE.get() {
        Some(handle) => check_same_db(handle, &db_path),
        None => ActionResponse::failure("init_engine failed: engine handle missing after init"),
    }
}

/// Creates a task.
///
/// Input semantics:
/// - `due_epoch_ms`: due instant in Unix milliseconds (UTC).
/// - `importance`: `low|medium|high`; empty means `medium`.
/// - `latitude`/`longitude`: both or neither.
///
/// # FFI contract
/// - Never panics.
/// - Returns the created task; `pending_sync` is set when offline.
#[flutter_rust_bridge::frb(sync)]
pub fn task_create(
    title: String,
    description: String,
    due_epoch_ms: i64,
    importance: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    attachments: Vec<String>,
) -> TaskActionResponse {
    let draft = match build_draft(
        title,
        description,
        due_epoch_ms,
        &importance,
        latitude,
        longitude,
        attachments,
    ) {
        Ok(draft) => draft,
        Err(message) => return TaskActionResponse::failure(format!("task_create failed: {message}")),
    };

    match with_engine(|handle| handle.engine.create(draft).map_err(|err| err.to_string())) {
        Ok(applied) => TaskActionResponse::success("Task created.", &applied.value, &applied.warnings),
        Err(message) => TaskActionResponse::failure(format!("task_create failed: {message}")),
    }
}

/// Advances a task one status step (in-progress -> completed -> cancelled -> in-progress).
#[flutter_rust_bridge::frb(sync)]
pub fn task_advance_status(task_id: String) -> TaskActionResponse {
    let outcome = parse_task_id(&task_id).and_then(|id| {
        with_engine(|handle| {
            handle
                .engine
                .advance_status(&id)
                .map_err(|err| err.to_string())
        })
    });
    match outcome {
        Ok(applied) => {
            TaskActionResponse::success("Status updated.", &applied.value, &applied.warnings)
        }
        Err(message) => {
            TaskActionResponse::failure(format!("task_advance_status failed: {message}"))
        }
    }
}

/// Deletes a task; deleting an unknown id succeeds without changes.
#[flutter_rust_bridge::frb(sync)]
pub fn task_delete(task_id: String) -> ActionResponse {
    let outcome = parse_task_id(&task_id).and_then(|id| {
        with_engine(|handle| handle.engine.delete(&id).map_err(|err| err.to_string()))
    });
    match outcome {
        Ok(applied) if applied.value => ActionResponse::success("Task deleted."),
        Ok(_) => ActionResponse::success("Task already absent."),
        Err(message) => ActionResponse::failure(format!("task_delete failed: {message}")),
    }
}

/// Lists all tasks in insertion order.
#[flutter_rust_bridge::frb(sync)]
pub fn task_list() -> TaskListResponse {
    let outcome = with_engine(|handle| {
        let snapshot = handle.engine.list().map_err(|err| err.to_string())?;
        let pending = handle.engine.pending_ids().map_err(|err| err.to_string())?;
        Ok((snapshot, pending.len()))
    });
    match outcome {
        Ok((snapshot, pending)) => TaskListResponse {
            ok: true,
            items: snapshot.iter().map(to_task_item).collect(),
            pending_count: saturating_u32(pending),
            message: format!("Loaded {} task(s).", snapshot.len()),
        },
        Err(message) => TaskListResponse {
            ok: false,
            items: Vec::new(),
            pending_count: 0,
            message: format!("task_list failed: {message}"),
        },
    }
}

/// Forwards a platform reachability event.
///
/// # FFI contract
/// - A disconnected -> connected transition drains the pending queue before
///   this call returns.
#[flutter_rust_bridge::frb(sync)]
pub fn set_connectivity(connected: bool) -> ActionResponse {
    match with_engine(|handle| Ok(handle.connectivity.set_connected(connected))) {
        Ok(true) => ActionResponse::success(format!("Connectivity changed: connected={connected}.")),
        Ok(false) => ActionResponse::success("Connectivity unchanged."),
        Err(message) => ActionResponse::failure(format!("set_connectivity failed: {message}")),
    }
}

/// Drains the pending queue now.
#[flutter_rust_bridge::frb(sync)]
pub fn sync_now() -> SyncResponse {
    match with_engine(|handle| handle.engine.sync_now().map_err(|err| err.to_string())) {
        Ok(applied) => SyncResponse {
            ok: true,
            merged: saturating_u32(applied.value.merged),
            remaining: saturating_u32(applied.value.remaining),
            message: format!("Merged {} task(s).", applied.value.merged),
        },
        Err(message) => SyncResponse {
            ok: false,
            merged: 0,
            remaining: 0,
            message: format!("sync_now failed: {message}"),
        },
    }
}

/// Returns and clears reminders scheduled since the previous call.
#[flutter_rust_bridge::frb(sync)]
pub fn reminder_take_scheduled() -> Vec<ReminderItem> {
    match with_engine(|handle| Ok(handle.scheduler.take_scheduled())) {
        Ok(reminders) => reminders
            .into_iter()
            .map(|reminder| ReminderItem {
                task_id: reminder.task_id.to_string(),
                title: reminder.title,
                body: reminder.body,
                fire_epoch_ms: reminder.fire_at.timestamp_millis(),
            })
            .collect(),
        Err(message) => {
            warn!("event=reminder_take module=ffi status=error error={message}");
            Vec::new()
        }
    }
}

/// Whether a fired reminder for `task_id` should still be shown.
///
/// Returns `false` for deleted, finished, or unknown tasks.
#[flutter_rust_bridge::frb(sync)]
pub fn reminder_should_deliver(task_id: String) -> bool {
    let outcome = parse_task_id(&task_id).and_then(|id| {
        with_engine(|handle| {
            handle
                .engine
                .deliver_reminder_for(&id)
                .map_err(|err| err.to_string())
        })
    });
    outcome.unwrap_or(false)
}

fn open_engine(db_path: PathBuf, config: EngineConfig) -> Result<EngineHandle, String> {
    let store = SqliteKvStore::open(&db_path, config.store_timeout())
        .map_err(|err| format!("store open failed: {err}"))?;
    let connectivity = ManualConnectivity::new(false);
    let scheduler = Arc::new(RecordingScheduler::new());
    let collaborators = EngineCollaborators::new(Arc::new(store), Arc::new(connectivity.clone()))
        .with_scheduler(scheduler.clone());
    let engine = TaskEngine::open(config, collaborators).map_err(|err| err.to_string())?;
    info!("event=ffi_engine_init module=ffi status=ok");
    Ok(EngineHandle {
        db_path,
        engine,
        connectivity,
        scheduler,
    })
}

fn check_same_db(handle: &EngineHandle, db_path: &Path) -> ActionResponse {
    if handle.db_path == db_path {
        ActionResponse::success("Engine ready.")
    } else {
        ActionResponse::failure(format!(
            "init_engine failed: engine already open at `{}`; refusing to switch to `{}`",
            handle.db_path.display(),
            db_path.display()
        ))
    }
}

fn with_engine<T>(f: impl FnOnce(&EngineHandle) -> Result<T, String>) -> Result<T, String> {
    let handle = ENGINE
        .get()
        .ok_or_else(|| "engine not initialized; call init_engine first".to_string())?;
    f(handle)
}

fn build_draft(
    title: String,
    description: String,
    due_epoch_ms: i64,
    importance: &str,
    latitude: Option<f64>,
    longitude: Option<f64>,
    attachments: Vec<String>,
) -> Result<TaskDraft, String> {
    let due_at = from_epoch_ms(due_epoch_ms)?;
    let importance = match importance.trim() {
        "" => Importance::default(),
        raw => Importance::parse(raw).ok_or_else(|| format!("unknown importance `{raw}`"))?,
    };
    let location = match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => {
            Some(GeoPoint::new(latitude, longitude).map_err(|err| err.to_string())?)
        }
        (None, None) => None,
        _ => return Err("latitude and longitude must be provided together".to_string()),
    };

    Ok(TaskDraft::new(title, description, due_at)
        .with_importance(importance)
        .with_location(location)
        .with_attachments(attachments.into_iter().map(AttachmentRef::from)))
}

fn parse_task_id(raw: &str) -> Result<TaskId, String> {
    TaskId::parse(raw).ok_or_else(|| format!("invalid task id `{raw}`: must not be blank"))
}

fn from_epoch_ms(value: i64) -> Result<DateTime<Utc>, String> {
    Utc.timestamp_millis_opt(value)
        .single()
        .ok_or_else(|| format!("due_epoch_ms out of range: {value}"))
}

fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn to_task_item(task: &Task) -> TaskItem {
    TaskItem {
        id: task.id.to_string(),
        title: task.title.clone(),
        description: task.description.clone(),
        due_epoch_ms: task.due_at.timestamp_millis(),
        status: task.status.as_str().to_string(),
        importance: task.importance.as_str().to_string(),
        latitude: task.location.map(|point| point.latitude),
        longitude: task.location.map(|point| point.longitude),
        attachments: task
            .attachments
            .iter()
            .map(|attachment| attachment.as_str().to_string())
            .collect(),
        created_epoch_ms: task.created_at.timestamp_millis(),
        pending_sync: task.pending_sync,
    }
}

fn describe_warning(warning: &EngineWarning) -> String {
    match warning {
        EngineWarning::Capability(err) => format!("capability skipped: {err}"),
        EngineWarning::AuditNotDurable { message, .. } => {
            format!("audit entry not persisted: {message}")
        }
        EngineWarning::ReminderSkipped { fire_at: Some(_), .. } => {
            "reminder not scheduled: due time is too close".to_string()
        }
        EngineWarning::ReminderSkipped { fire_at: None, .. } => {
            "reminder not scheduled: due time is out of range".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        core_version, init_engine, init_logging, ping, reminder_should_deliver,
        reminder_take_scheduled, set_connectivity, sync_now, task_advance_status, task_create,
        task_delete, task_list,
    };
    use std::sync::OnceLock;
    use std::time::{SystemTime, UNIX_EPOCH};

    static TEST_DB: OnceLock<String> = OnceLock::new();

    fn ensure_engine() {
        let db_path = TEST_DB.get_or_init(|| {
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("time went backwards")
                .as_nanos();
            std::env::temp_dir()
                .join(format!("taskkeeper-ffi-{}-{nanos}.sqlite3", std::process::id()))
                .to_string_lossy()
                .into_owned()
        });
        let response = init_engine(db_path.clone(), String::new());
        assert!(response.ok, "{}", response.message);
    }

    fn due_in_hours(hours: i64) -> i64 {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_millis() as i64;
        now_ms + hours * 60 * 60 * 1000
    }

    fn create(title: &str) -> String {
        let response = task_create(
            title.to_string(),
            "details".to_string(),
            due_in_hours(4),
            "high".to_string(),
            Some(48.85),
            Some(2.35),
            vec!["file:///a.png".to_string()],
        );
        assert!(response.ok, "{}", response.message);
        response.task.expect("created task should be returned").id
    }

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_engine_is_idempotent_and_rejects_other_path() {
        ensure_engine();
        ensure_engine();
        let other = init_engine("/nonexistent/other.sqlite3".to_string(), String::new());
        assert!(!other.ok);
        assert!(other.message.contains("refusing to switch"));
    }

    #[test]
    fn task_create_returns_in_progress_task_with_fields() {
        ensure_engine();
        let response = task_create(
            "ffi create".to_string(),
            "details".to_string(),
            due_in_hours(2),
            String::new(),
            None,
            None,
            Vec::new(),
        );
        assert!(response.ok, "{}", response.message);
        let task = response.task.expect("task should be returned");
        assert_eq!(task.status, "in-progress");
        assert_eq!(task.importance, "medium");
        assert!(task_list().items.iter().any(|item| item.id == task.id));
    }

    #[test]
    fn task_create_rejects_blank_title_and_half_location() {
        ensure_engine();
        let blank = task_create(
            "  ".to_string(),
            "details".to_string(),
            due_in_hours(2),
            String::new(),
            None,
            None,
            Vec::new(),
        );
        assert!(!blank.ok);
        assert!(blank.task.is_none());

        let half = task_create(
            "half".to_string(),
            "details".to_string(),
            due_in_hours(2),
            String::new(),
            Some(1.0),
            None,
            Vec::new(),
        );
        assert!(!half.ok);
        assert!(half.message.contains("together"));
    }

    #[test]
    fn task_advance_status_cycles() {
        ensure_engine();
        let id = create("ffi status");
        let statuses: Vec<String> = (0..3)
            .map(|_| {
                let response = task_advance_status(id.clone());
                assert!(response.ok, "{}", response.message);
                response.task.expect("task should be returned").status
            })
            .collect();
        assert_eq!(statuses, vec!["completed", "cancelled", "in-progress"]);
    }

    #[test]
    fn task_delete_is_idempotent_and_suppresses_reminder() {
        ensure_engine();
        let id = create("ffi delete");
        assert!(reminder_should_deliver(id.clone()));

        assert!(task_delete(id.clone()).ok);
        let second = task_delete(id.clone());
        assert!(second.ok);
        assert_eq!(second.message, "Task already absent.");
        assert!(!reminder_should_deliver(id.clone()));
        assert!(task_list().items.iter().all(|item| item.id != id));
    }

    #[test]
    fn task_advance_status_rejects_blank_and_unknown_ids() {
        ensure_engine();
        let blank = task_advance_status("   ".to_string());
        assert!(!blank.ok);
        assert!(blank.message.contains("invalid task id"));

        let unknown = task_advance_status("0.8471923".to_string());
        assert!(!unknown.ok);
        assert!(unknown.message.contains("task not found"));
    }

    #[test]
    fn created_task_reminder_is_handed_to_host_once() {
        ensure_engine();
        let id = create("ffi reminder");
        assert!(sync_now().ok);

        let taken = reminder_take_scheduled();
        let reminder = taken
            .iter()
            .find(|reminder| reminder.task_id == id)
            .expect("reminder for the new task should be scheduled");
        assert_eq!(reminder.body, "Task \"ffi reminder\" is due in 30 minutes");
        assert!(reminder_take_scheduled()
            .iter()
            .all(|reminder| reminder.task_id != id));
    }

    #[test]
    fn reconnect_drains_tasks_created_offline() {
        ensure_engine();
        assert!(set_connectivity(false).ok);
        let id = create("ffi offline");
        let pending = task_list()
            .items
            .into_iter()
            .find(|item| item.id == id)
            .expect("offline task should be listed");
        assert!(pending.pending_sync);

        let response = set_connectivity(true);
        assert!(response.ok, "{}", response.message);

        let synced = task_list()
            .items
            .into_iter()
            .find(|item| item.id == id)
            .expect("synced task should be listed");
        assert!(!synced.pending_sync);
    }
}
