//! Flutter-facing bindings for the task core.

pub mod api;
