//! Domain model for tasks and their audit trail.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep serialized shapes stable across store reloads.
//!
//! # Invariants
//! - Every task is identified by a stable `TaskId`.
//! - Deletion is a hard delete; history survives only in the audit log.

pub mod audit;
pub mod task;
