//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `taskkeeper_core` linkage.
//! - Drive one offline -> online round trip over an in-memory store so the
//!   write path can be checked without the Flutter host.

use chrono::{Duration, Utc};
use std::process::ExitCode;
use std::sync::Arc;
use taskkeeper_core::capability::{ManualConnectivity, RecordingScheduler};
use taskkeeper_core::{
    EngineCollaborators, EngineConfig, EngineError, MemoryKvStore, TaskDraft, TaskEngine,
};

fn main() -> ExitCode {
    println!("taskkeeper_core ping={}", taskkeeper_core::ping());
    println!("taskkeeper_core version={}", taskkeeper_core::core_version());

    match run_offline_round_trip() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("offline round trip failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_offline_round_trip() -> Result<(), EngineError> {
    let connectivity = ManualConnectivity::new(false);
    let scheduler = Arc::new(RecordingScheduler::new());
    let collaborators = EngineCollaborators::new(
        Arc::new(MemoryKvStore::new()),
        Arc::new(connectivity.clone()),
    )
    .with_scheduler(scheduler.clone());
    let engine = TaskEngine::open(EngineConfig::default(), collaborators)?;

    let due_at = Utc::now() + Duration::hours(2);
    for title in ["Buy milk", "Call plumber"] {
        engine.create(TaskDraft::new(title, "created by the cli", due_at))?;
    }
    println!("pending before reconnect={}", engine.pending_ids()?.len());

    connectivity.set_connected(true);
    println!("pending after reconnect={}", engine.pending_ids()?.len());
    println!("tasks={}", engine.list()?.len());
    println!("audit_entries={}", engine.audit_entries()?.len());
    println!("reminders_scheduled={}", scheduler.scheduled().len());
    Ok(())
}
