//! SQLite backing for the durable key-value store.
//!
//! # Invariants
//! - `kv_entries` is only touched after migrations reach `latest_version`.
//! - Failures surface as `StoreError`; this layer has no error type of its own.

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};
