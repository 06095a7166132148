//! The requester-side rendezvous: demand a fresh probe cycle and block,
//! cancellably, until one completes.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::debug;

use probegrid_arena::ProbeArena;

use crate::cancel::CancellationToken;
use crate::error::RendezvousError;
use crate::wake::WakeSender;

/// Default polling quantum for the wait loops.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How a probe request concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeRequest {
    /// A cycle no older than the call completed; the table is fresh.
    Fresh,
    /// Fault detection is off, no prober is registered, or the caller is
    /// the prober itself. Nothing to wait for; cached state stands.
    Skipped,
}

/// Requester-side entry point, one per process.
///
/// Stateless over the shared arena: concurrent calls from any number of
/// processes are fine, and each waiter keys on its own epoch snapshot.
pub struct RendezvousCoordinator<W> {
    arena: Arc<ProbeArena>,
    wake: W,
    poll_interval: Duration,
    fault_detection_enabled: bool,
}

impl<W: WakeSender> RendezvousCoordinator<W> {
    pub fn new(arena: Arc<ProbeArena>, wake: W) -> Self {
        Self {
            arena,
            wake,
            poll_interval: DEFAULT_POLL_INTERVAL,
            fault_detection_enabled: true,
        }
    }

    /// Set the polling quantum of the wait loops.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Honor the fault-detection kill-switch.
    pub fn with_fault_detection(mut self, enabled: bool) -> Self {
        self.fault_detection_enabled = enabled;
        self
    }

    /// Ask the prober for a fresh cycle and wait for it to finish.
    ///
    /// On `Ok(Fresh)` the status table reflects a cycle that started no
    /// earlier than this call. Cancellation aborts the wait with
    /// freshness unknown; the caller falls back to the cached table
    /// rather than treating the request as a system failure.
    pub fn request_fresh_probe(
        &self,
        cancel: &CancellationToken,
    ) -> Result<ProbeRequest, RendezvousError> {
        if !self.fault_detection_enabled {
            debug!("fault detection disabled; skipping probe request");
            return Ok(ProbeRequest::Skipped);
        }
        if !self.arena.is_prober_running() {
            debug!("no prober registered; skipping probe request");
            return Ok(ProbeRequest::Skipped);
        }
        if self.arena.prober_is_self() {
            // The prober never waits on itself.
            return Ok(ProbeRequest::Skipped);
        }

        self.wait_for_fresh_cycle(cancel)?;
        Ok(ProbeRequest::Fresh)
    }

    /// The raw wait protocol, without the availability guard: snapshot
    /// the started epoch, signal the prober once, then wait for a later
    /// cycle to both start and complete.
    ///
    /// A completion alone is not enough. A cycle already in flight at
    /// entry carries results computed before this request, so the wait
    /// keys on a `started` epoch observed strictly after the snapshot
    /// and only then on `completed` reaching that epoch.
    pub fn wait_for_fresh_cycle(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(), RendezvousError> {
        let snapshot = self.arena.started();
        self.wake.wake();

        let fresh_epoch = self.wait_until(cancel, || {
            let started = self.arena.started();
            (started != snapshot).then_some(started)
        })?;
        self.wait_until(cancel, || {
            epoch_reached(self.arena.completed(), fresh_epoch).then_some(())
        })?;

        debug!(snapshot, fresh_epoch, "fresh probe cycle completed");
        Ok(())
    }

    /// Poll until `poll` yields, sleeping one quantum between attempts
    /// and honoring cancellation on every iteration.
    fn wait_until<T>(
        &self,
        cancel: &CancellationToken,
        mut poll: impl FnMut() -> Option<T>,
    ) -> Result<T, RendezvousError> {
        loop {
            if cancel.is_cancelled() {
                return Err(RendezvousError::Cancelled);
            }
            if let Some(value) = poll() {
                return Ok(value);
            }
            thread::sleep(self.poll_interval);
        }
    }
}

/// Wraparound-safe "completed has reached epoch".
fn epoch_reached(completed: u64, epoch: u64) -> bool {
    completed.wrapping_sub(epoch) as i64 >= 0
}
