//! Background reachability rechecks.

use super::probe::ReachabilityProbe;
use crate::policy::ModeController;
use log::{error, info};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

const TASK_RUNNING: u8 = 0;
const TASK_CANCELLED: u8 = 1;
const TASK_SETTLED: u8 = 2;

/// Handle to one in-flight reachability probe.
///
/// Dropping the handle detaches the probe; its result is still applied.
pub struct ProbeTask {
    handle: Option<JoinHandle<Option<bool>>>,
    state: Arc<AtomicU8>,
}

impl ProbeTask {
    /// Prevents the probe result from being applied.
    ///
    /// Returns `false` when the result was already applied.
    pub fn cancel(&self) -> bool {
        self.state
            .compare_exchange(
                TASK_RUNNING,
                TASK_CANCELLED,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Blocks until the probe completes.
    ///
    /// Returns the reachability it applied, or `None` when it was cancelled
    /// or could not run.
    pub fn wait(mut self) -> Option<bool> {
        self.handle.take()?.join().ok().flatten()
    }
}

/// Starts probes and applies their outcome to the mode controller.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    probe: Arc<dyn ReachabilityProbe>,
    policy: Arc<ModeController>,
}

impl ConnectivityMonitor {
    pub fn new(probe: Arc<dyn ReachabilityProbe>, policy: Arc<ModeController>) -> Self {
        Self { probe, policy }
    }

    /// Points future rechecks at a new remote endpoint.
    pub fn retarget(&self, connection_string: &str) {
        self.probe.retarget(connection_string);
    }

    /// Starts one probe on a background thread and returns immediately.
    ///
    /// On completion the probe sets `offline_mode = !reachable` unless the
    /// task was cancelled first.
    pub fn recheck(&self) -> ProbeTask {
        let state = Arc::new(AtomicU8::new(TASK_RUNNING));
        let probe = Arc::clone(&self.probe);
        let policy = Arc::clone(&self.policy);
        let task_state = Arc::clone(&state);

        let spawned = std::thread::Builder::new()
            .name("duodb-reachability".to_string())
            .spawn(move || {
                let started_at = Instant::now();
                let reachable = probe.is_reachable();
                let settled = task_state
                    .compare_exchange(
                        TASK_RUNNING,
                        TASK_SETTLED,
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    )
                    .is_ok();
                if !settled {
                    info!("event=reachability module=connectivity status=cancelled");
                    return None;
                }
                policy.set_offline_mode(!reachable);
                info!(
                    "event=reachability module=connectivity status=ok reachable={} duration_ms={}",
                    reachable,
                    started_at.elapsed().as_millis()
                );
                Some(reachable)
            });

        match spawned {
            Ok(handle) => ProbeTask {
                handle: Some(handle),
                state,
            },
            Err(err) => {
                error!(
                    "event=reachability module=connectivity status=error error_code=spawn_failed error={}",
                    err
                );
                state.store(TASK_CANCELLED, Ordering::SeqCst);
                ProbeTask {
                    handle: None,
                    state,
                }
            }
        }
    }
}
