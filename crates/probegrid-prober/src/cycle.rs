//! The probe cycle loop.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use probe_core::{Liveness, NodeSpec};
use probegrid_arena::ProberRegistration;

use crate::prober::{NodeProber, ProbeOutcome};
use crate::wake::UdpWakeListener;

/// Default interval of the prober's own periodic timer.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(30);

/// Runs probe cycles inside the prober process, one at a time.
///
/// Construction requires the [`ProberRegistration`], so only the process
/// holding the arena's prober slot can drive cycles.
pub struct ProbeCycleManager<P> {
    registration: ProberRegistration,
    prober: P,
    nodes: Vec<NodeSpec>,
    probe_interval: Duration,
}

impl<P: NodeProber> ProbeCycleManager<P> {
    pub fn new(registration: ProberRegistration, prober: P, nodes: Vec<NodeSpec>) -> Self {
        Self {
            registration,
            prober,
            nodes,
            probe_interval: DEFAULT_PROBE_INTERVAL,
        }
    }

    /// Set the periodic timer interval.
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    /// Run cycles until shutdown: one per timer tick, plus one per wake
    /// datagram. The timer restarts after every cycle, however it was
    /// triggered.
    pub async fn run(&self, wake: UdpWakeListener, mut shutdown: watch::Receiver<bool>) {
        info!(
            nodes = self.nodes.len(),
            interval = ?self.probe_interval,
            "probe cycle loop starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.probe_interval) => {
                    self.run_cycle().await;
                }
                _ = wake.recv_wake() => {
                    debug!("wake received");
                    self.run_cycle().await;
                }
                _ = shutdown.changed() => {
                    info!("probe cycle loop shutting down");
                    break;
                }
            }
        }
    }

    /// One full cycle: open the epoch, probe every node, publish each
    /// verdict, close the epoch. A node that cannot be evaluated is
    /// recorded DOWN; the cycle always runs to completion.
    pub async fn run_cycle(&self) {
        let epoch = self.registration.begin_cycle();
        let mut changed = 0usize;

        for node in &self.nodes {
            let outcome = self.prober.check_liveness(node).await;
            let liveness = match outcome {
                ProbeOutcome::Reachable => Liveness::Up,
                ProbeOutcome::Unreachable => Liveness::Down,
                ProbeOutcome::Failed => {
                    warn!(node = %node.id, "probe failed; recording down");
                    Liveness::Down
                }
            };

            match self.registration.publish_status(node.id, liveness) {
                Ok(true) => {
                    changed += 1;
                    info!(node = %node.id, status = %liveness, "node status changed");
                }
                Ok(false) => {}
                Err(e) => {
                    // Config/arena mismatch; nothing this cycle can do.
                    error!(node = %node.id, error = %e, "cannot publish status");
                }
            }
        }

        self.registration.complete_cycle(epoch);
        debug!(epoch, changed, "probe cycle completed");
    }
}
