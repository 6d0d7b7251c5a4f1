//! Repository layer over the durable key-value store.
//!
//! # Responsibility
//! - Own the authoritative in-memory task collection.
//! - Isolate record encoding and key layout from engine orchestration.
//!
//! # Invariants
//! - Write paths validate tasks before they enter the collection.
//! - Repository APIs return semantic errors (`NotFound`, `InvalidTransition`)
//!   in addition to store transport errors.

pub mod task_repo;
