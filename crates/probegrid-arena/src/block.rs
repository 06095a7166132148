//! In-memory layout of the shared control block.
//!
//! The block sits at offset 0 of the mapped arena file. Every field is an
//! atomic word so that independent processes can operate on the mapping
//! without any assumptions beyond "plain word loads and stores are atomic
//! on this address". The layout is `#[repr(C)]` and must never be
//! reordered; attaching processes validate the magic and version before
//! touching anything else.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Magic number identifying a probegrid arena file ("PBGRID01").
pub(crate) const ARENA_MAGIC: u64 = 0x5042_4752_4944_3031;

/// Current arena format version.
pub(crate) const ARENA_VERSION: u32 = 1;

/// Fixed capacity of the status table, coordinator slot included.
pub const MAX_NODES: usize = 1024;

/// Bit 0 of a status word: the node is reachable.
pub(crate) const STATUS_UP: u32 = 1 << 0;

/// Spin lock word states.
const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;

/// The shared control block.
///
/// Lives for the entire runtime of the cluster; created once before any
/// prober or requester attaches and owned jointly from then on.
#[repr(C)]
pub(crate) struct ControlBlock {
    /// Written last during initialization; attach validates it first.
    pub(crate) magic: AtomicU64,
    pub(crate) version: AtomicU32,
    /// Number of valid status slots. Fixed at creation.
    pub(crate) node_count: AtomicU32,
    /// Spin-held mutex word guarding the cycle counters. Critical
    /// sections are one or two word operations; never held across a
    /// sleep, a wake send, or a probe call.
    pub(crate) lock: AtomicU32,
    /// Pid of the registered prober process; 0 means "no prober".
    pub(crate) prober_pid: AtomicU32,
    /// Epoch of the most recently started probe cycle.
    pub(crate) started: AtomicU64,
    /// Epoch of the most recently completed probe cycle. Invariant:
    /// `completed <= started` under wraparound-safe comparison.
    pub(crate) completed: AtomicU64,
    /// Bumped exactly when a node's status word actually changes.
    pub(crate) status_version: AtomicU64,
    /// One whole-word status per node, indexed by node id.
    pub(crate) status: [AtomicU32; MAX_NODES],
}

/// Byte size of the arena file.
pub(crate) const BLOCK_SIZE: usize = size_of::<ControlBlock>();

impl ControlBlock {
    /// Acquire the counter lock, spinning until it is free.
    pub(crate) fn lock_counters(&self) -> CounterGuard<'_> {
        while self
            .lock
            .compare_exchange_weak(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            std::hint::spin_loop();
        }
        CounterGuard { lock: &self.lock }
    }
}

/// RAII guard for the counter lock.
pub(crate) struct CounterGuard<'a> {
    lock: &'a AtomicU32,
}

impl Drop for CounterGuard<'_> {
    fn drop(&mut self) {
        self.lock.store(UNLOCKED, Ordering::Release);
    }
}
