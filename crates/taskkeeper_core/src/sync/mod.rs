//! Offline synchronization engine.
//!
//! # Responsibility
//! - Decide per write whether it is immediately durable or queued.
//! - React to connectivity transitions by draining the pending queue.
//! - Fan lifecycle side effects out to the audit log, the notification
//!   scheduler and snapshot observers.
//!
//! # Invariants
//! - Repository, queue and audit log mutate under one lock.
//! - A drained record is merged at most once per id.

pub mod engine;
pub mod outcome;
pub mod upstream;
