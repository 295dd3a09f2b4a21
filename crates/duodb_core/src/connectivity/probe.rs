//! Reachability probes.

use super::target::ConnectionTarget;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

/// Answers "is the remote reachable right now". May block.
pub trait ReachabilityProbe: Send + Sync {
    fn is_reachable(&self) -> bool;

    /// Points the probe at the endpoint of a newly opened remote session.
    ///
    /// Probes without an endpoint of their own ignore this.
    fn retarget(&self, _connection_string: &str) {}
}

impl<F> ReachabilityProbe for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_reachable(&self) -> bool {
        self()
    }
}

/// TCP connect probe against the remote endpoint.
#[derive(Debug)]
pub struct TcpProbe {
    target: RwLock<ConnectionTarget>,
    timeout: Duration,
}

impl TcpProbe {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

    pub fn new(target: ConnectionTarget, timeout: Duration) -> Self {
        Self {
            target: RwLock::new(target),
            timeout,
        }
    }

    pub fn for_connection_string(connection_string: &str) -> Self {
        Self::new(
            ConnectionTarget::parse(connection_string),
            Self::DEFAULT_TIMEOUT,
        )
    }

    /// Endpoint the next probe connects to.
    pub fn target(&self) -> ConnectionTarget {
        self.target
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ReachabilityProbe for TcpProbe {
    fn is_reachable(&self) -> bool {
        let target = self.target();
        if target.host.starts_with('/') {
            return false;
        }
        let addrs = match (target.host.as_str(), target.port).to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(_) => return false,
        };
        addrs
            .into_iter()
            .any(|addr| TcpStream::connect_timeout(&addr, self.timeout).is_ok())
    }

    fn retarget(&self, connection_string: &str) {
        *self.target.write().unwrap_or_else(PoisonError::into_inner) =
            ConnectionTarget::parse(connection_string);
    }
}
