//! Operation policy: flags, permission rules, and the mode controller.
//!
//! # Responsibility
//! - Hold the policy flags as one immutable value.
//! - Decide whether a read or write may run against a backend right now.
//!
//! # Invariants
//! - `permits` is a pure function of one `PolicyState` value.
//! - Offline mode blocks every remote operation regardless of other flags.
//! - Policy changes replace the whole value atomically; last writer wins.

pub mod controller;
pub mod state;

pub use controller::ModeController;
pub use state::{Operation, PolicyFlag, PolicyState};
