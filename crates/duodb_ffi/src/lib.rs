//! Flutter-facing bindings for the DuoDB core.

pub mod api;
