//! Prober registration and the write side of the control block.
//!
//! Exactly one process may hold a [`ProberRegistration`] at a time; all
//! counter and status writers live on it, so code that merely attached
//! the arena cannot advance a cycle by accident.

use std::sync::Arc;
use std::sync::atomic::{Ordering, fence};

use tracing::{debug, info, warn};

use probe_core::{Liveness, NodeId};

use crate::arena::ProbeArena;
use crate::block::STATUS_UP;
use crate::error::{ArenaError, ArenaResult};

/// Signal 0 checks deliverability without sending anything.
fn process_alive(pid: u32) -> bool {
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

/// The prober process's claim on the arena's write side.
///
/// Dropping the registration vacates the slot, turning subsequent probe
/// requests into no-ops until a prober registers again.
pub struct ProberRegistration {
    arena: Arc<ProbeArena>,
}

impl ProberRegistration {
    /// Claim the prober slot for the calling process.
    ///
    /// Fails if another live process holds the slot. A pid left behind by
    /// a crashed prober is detected with a kill-0 probe and taken over.
    pub fn acquire(arena: Arc<ProbeArena>) -> ArenaResult<Self> {
        let me = std::process::id();
        loop {
            let block = arena.block();
            match block
                .prober_pid
                .compare_exchange(0, me, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    info!(pid = me, "prober registered");
                    return Ok(Self { arena });
                }
                Err(current) => {
                    if process_alive(current) {
                        return Err(ArenaError::ProberAlreadyRunning(current));
                    }
                    warn!(stale_pid = current, "taking over stale prober slot");
                    if block
                        .prober_pid
                        .compare_exchange(current, me, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        info!(pid = me, "prober registered");
                        return Ok(Self { arena });
                    }
                    // Lost the takeover race; re-evaluate the new holder.
                }
            }
        }
    }

    pub fn arena(&self) -> &Arc<ProbeArena> {
        &self.arena
    }

    /// Open a new probe cycle: `started += 1` under the counter lock.
    /// Returns the cycle's epoch.
    pub fn begin_cycle(&self) -> u64 {
        let block = self.arena.block();
        let epoch = {
            let _guard = block.lock_counters();
            let epoch = block.started.load(Ordering::Relaxed).wrapping_add(1);
            block.started.store(epoch, Ordering::Relaxed);
            epoch
        };
        debug!(epoch, "probe cycle started");
        epoch
    }

    /// Publish one node's verdict as a whole-word store. Returns whether
    /// the stored value actually changed; the change counter is bumped
    /// only in that case.
    pub fn publish_status(&self, node: NodeId, liveness: Liveness) -> ArenaResult<bool> {
        if node.is_coordinator() {
            // The coordinator slot is a sentinel; it is never probed and
            // never rewritten.
            return Ok(false);
        }
        let block = self.arena.block();
        let count = block.node_count.load(Ordering::Relaxed);
        if node.as_u32() >= count {
            return Err(ArenaError::NodeOutOfRange {
                id: node.as_u32(),
                count,
            });
        }

        let slot = &block.status[node.as_u32() as usize];
        let word = match liveness {
            Liveness::Up => STATUS_UP,
            Liveness::Down => 0,
        };
        if slot.load(Ordering::Relaxed) == word {
            return Ok(false);
        }
        slot.store(word, Ordering::Release);
        block.status_version.fetch_add(1, Ordering::Release);
        Ok(true)
    }

    /// Close the cycle opened by [`Self::begin_cycle`]. The release fence
    /// orders every status store of this cycle before the counter
    /// advance, so a reader that observes `completed >= epoch` sees all
    /// of the cycle's results.
    pub fn complete_cycle(&self, epoch: u64) {
        fence(Ordering::Release);
        let block = self.arena.block();
        let _guard = block.lock_counters();
        debug_assert!(
            epoch.wrapping_sub(block.completed.load(Ordering::Relaxed)) as i64 >= 0,
            "cycle completion going backwards"
        );
        block.completed.store(epoch, Ordering::Release);
    }
}

impl Drop for ProberRegistration {
    fn drop(&mut self) {
        let me = std::process::id();
        let block = self.arena.block();
        if block
            .prober_pid
            .compare_exchange(me, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            info!(pid = me, "prober slot vacated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_arena() -> (tempfile::TempDir, Arc<ProbeArena>) {
        let dir = tempfile::tempdir().unwrap();
        let arena = ProbeArena::create(&dir.path().join("control.arena"), 4).unwrap();
        (dir, Arc::new(arena))
    }

    #[test]
    fn register_and_vacate() {
        let (_dir, arena) = test_arena();
        assert!(!arena.is_prober_running());

        let registration = ProberRegistration::acquire(arena.clone()).unwrap();
        assert!(arena.is_prober_running());
        assert!(arena.prober_is_self());

        drop(registration);
        assert!(!arena.is_prober_running());
    }

    #[test]
    fn second_registration_in_live_process_fails() {
        let (_dir, arena) = test_arena();
        let _registration = ProberRegistration::acquire(arena.clone()).unwrap();

        let me = std::process::id();
        assert!(matches!(
            ProberRegistration::acquire(arena.clone()),
            Err(ArenaError::ProberAlreadyRunning(pid)) if pid == me
        ));
    }

    #[test]
    fn stale_registration_is_taken_over() {
        let (_dir, arena) = test_arena();
        // Plant a pid that cannot be alive: pid_max on Linux caps at
        // 2^22, so u32::MAX is never a real process.
        arena
            .block()
            .prober_pid
            .store(u32::MAX, Ordering::Release);

        let registration = ProberRegistration::acquire(arena.clone()).unwrap();
        assert!(arena.prober_is_self());
        drop(registration);
    }

    #[test]
    fn cycle_counters_advance_in_order() {
        let (_dir, arena) = test_arena();
        let registration = ProberRegistration::acquire(arena.clone()).unwrap();

        let epoch = registration.begin_cycle();
        assert_eq!(epoch, 1);
        assert_eq!(arena.counters(), (1, 0));

        registration.complete_cycle(epoch);
        assert_eq!(arena.counters(), (1, 1));

        // Monotonic across cycles.
        let next = registration.begin_cycle();
        assert_eq!(next, 2);
        registration.complete_cycle(next);
        assert_eq!(arena.counters(), (2, 2));
    }

    #[test]
    fn publish_status_bumps_version_only_on_change() {
        let (_dir, arena) = test_arena();
        let registration = ProberRegistration::acquire(arena.clone()).unwrap();

        // Same verdict as the initial state: no change, no bump.
        assert!(!registration.publish_status(NodeId(1), Liveness::Up).unwrap());
        assert_eq!(arena.status_version(), 0);

        assert!(registration.publish_status(NodeId(1), Liveness::Down).unwrap());
        assert_eq!(arena.status_version(), 1);
        assert_eq!(arena.status_of(NodeId(1)).unwrap(), Liveness::Down);

        // Re-publishing the same verdict leaves the version alone.
        assert!(!registration.publish_status(NodeId(1), Liveness::Down).unwrap());
        assert_eq!(arena.status_version(), 1);
    }

    #[test]
    fn down_node_recovers() {
        let (_dir, arena) = test_arena();
        let registration = ProberRegistration::acquire(arena.clone()).unwrap();

        registration.publish_status(NodeId(3), Liveness::Down).unwrap();
        assert_eq!(arena.status_version(), 1);

        assert!(registration.publish_status(NodeId(3), Liveness::Up).unwrap());
        assert_eq!(arena.status_of(NodeId(3)).unwrap(), Liveness::Up);
        assert_eq!(arena.status_version(), 2);
    }

    #[test]
    fn publish_to_coordinator_slot_is_a_noop() {
        let (_dir, arena) = test_arena();
        let registration = ProberRegistration::acquire(arena.clone()).unwrap();

        assert!(!registration
            .publish_status(NodeId::COORDINATOR, Liveness::Down)
            .unwrap());
        assert_eq!(arena.status_of(NodeId::COORDINATOR).unwrap(), Liveness::Up);
        assert_eq!(arena.status_version(), 0);
    }

    #[test]
    fn publish_out_of_range_fails() {
        let (_dir, arena) = test_arena();
        let registration = ProberRegistration::acquire(arena.clone()).unwrap();

        assert!(matches!(
            registration.publish_status(NodeId(9), Liveness::Down),
            Err(ArenaError::NodeOutOfRange { id: 9, count: 4 })
        ));
    }
}
