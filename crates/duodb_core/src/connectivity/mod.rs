//! Reachability probing and offline-mode switching.
//!
//! # Responsibility
//! - Run reachability probes off the caller's thread.
//! - Flip `offline_mode` when a probe completes.
//!
//! # Invariants
//! - Starting a recheck never blocks the caller.
//! - Overlapping probes are not coalesced; the last one to complete wins.
//! - A cancelled probe never touches the policy.

pub mod monitor;
pub mod probe;
pub mod target;

pub use monitor::{ConnectivityMonitor, ProbeTask};
pub use probe::{ReachabilityProbe, TcpProbe};
pub use target::ConnectionTarget;
