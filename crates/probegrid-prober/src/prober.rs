//! Node liveness probes.

use std::time::Duration;

use tokio::net::TcpStream;
use tracing::debug;

use probe_core::NodeSpec;

/// Result of probing a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The node answered the probe.
    Reachable,
    /// The node actively refused or is known unreachable.
    Unreachable,
    /// The probe could not be evaluated (timeout, local error).
    Failed,
}

/// Verdict source for a single node, called once per node per cycle.
///
/// Implementations may time out or fail; the cycle manager records any
/// non-reachable outcome as DOWN and moves on to the next node.
pub trait NodeProber: Send + Sync {
    fn check_liveness(&self, node: &NodeSpec) -> impl Future<Output = ProbeOutcome> + Send;
}

/// TCP-connect probe with a fixed timeout.
///
/// Reachability here means "the node accepts connections on its probe
/// port"; protocol-level health is a different subsystem's concern.
pub struct TcpConnectProber {
    timeout: Duration,
}

impl TcpConnectProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl NodeProber for TcpConnectProber {
    async fn check_liveness(&self, node: &NodeSpec) -> ProbeOutcome {
        let address = node.address();
        match tokio::time::timeout(self.timeout, TcpStream::connect(&address)).await {
            Ok(Ok(_)) => ProbeOutcome::Reachable,
            Ok(Err(e)) => {
                debug!(node = %node.id, %address, error = %e, "probe connection failed");
                ProbeOutcome::Unreachable
            }
            Err(_) => {
                debug!(node = %node.id, %address, "probe timed out");
                ProbeOutcome::Failed
            }
        }
    }
}
