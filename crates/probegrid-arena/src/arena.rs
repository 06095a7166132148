//! Arena handle: creation, attachment, and the read side.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use memmap2::{MmapMut, MmapOptions};
use tracing::info;

use probe_core::{Liveness, NodeId};

use crate::block::{ARENA_MAGIC, ARENA_VERSION, BLOCK_SIZE, ControlBlock, MAX_NODES, STATUS_UP};
use crate::error::{ArenaError, ArenaResult};

/// Handle to the shared control arena.
///
/// Each participating process holds exactly one handle over the same
/// mapped file. Reads never block; counter accesses take the short spin
/// lock as the write side does. All write operations live on
/// [`crate::ProberRegistration`].
pub struct ProbeArena {
    /// Points at offset 0 of the mapping. Derived from the mutable map
    /// once, so atomic stores through it are sound.
    block: *const ControlBlock,
    /// Keeps the mapping alive for the lifetime of the handle.
    _map: MmapMut,
    path: PathBuf,
}

// The raw pointer suppresses the auto traits. Every access through it is
// an atomic operation on memory that outlives the handle via `_map`.
unsafe impl Send for ProbeArena {}
unsafe impl Sync for ProbeArena {}

impl ProbeArena {
    /// Create and initialize the arena file. One-time, ordered before any
    /// attach; a second concurrent create loses the `create_new` race and
    /// fails cleanly.
    ///
    /// `node_count` fixes the status table: slot 0 is the coordinator,
    /// worker ids run `1..node_count`. All slots start UP.
    pub fn create(path: &Path, node_count: u32) -> ArenaResult<Self> {
        if node_count < 2 || node_count as usize > MAX_NODES {
            return Err(ArenaError::InvalidNodeCount { count: node_count });
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| ArenaError::Create {
                path: path.to_path_buf(),
                cause: e.to_string(),
            })?;

        file.set_len(BLOCK_SIZE as u64).map_err(|e| ArenaError::Create {
            path: path.to_path_buf(),
            cause: e.to_string(),
        })?;

        let mut map = unsafe {
            MmapOptions::new()
                .len(BLOCK_SIZE)
                .map_mut(&file)
                .map_err(|e| ArenaError::Create {
                    path: path.to_path_buf(),
                    cause: e.to_string(),
                })?
        };

        let arena = Self {
            block: map.as_mut_ptr() as *const ControlBlock,
            _map: map,
            path: path.to_path_buf(),
        };

        // A fresh file is zero-filled: lock free, counters zero, no
        // prober. Initialize the table and identity, magic last so a
        // concurrent attach never sees a half-built block.
        let block = arena.block();
        for slot in block.status.iter().take(node_count as usize) {
            slot.store(STATUS_UP, Ordering::Relaxed);
        }
        block.node_count.store(node_count, Ordering::Relaxed);
        block.version.store(ARENA_VERSION, Ordering::Relaxed);
        block.magic.store(ARENA_MAGIC, Ordering::Release);

        arena._map.flush().map_err(|e| ArenaError::Create {
            path: path.to_path_buf(),
            cause: e.to_string(),
        })?;

        info!(path = %path.display(), node_count, "control arena created");
        Ok(arena)
    }

    /// Map an existing arena. Fails loudly if the file is missing,
    /// truncated, or not a probegrid arena; there is no lazy
    /// initialization path.
    pub fn attach(path: &Path) -> ArenaResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| ArenaError::Open {
                path: path.to_path_buf(),
                cause: e.to_string(),
            })?;

        let len = file
            .metadata()
            .map_err(|e| ArenaError::Open {
                path: path.to_path_buf(),
                cause: e.to_string(),
            })?
            .len();
        if (len as usize) < BLOCK_SIZE {
            return Err(ArenaError::Corrupt {
                path: path.to_path_buf(),
                cause: format!("truncated: {len} bytes, need {BLOCK_SIZE}"),
            });
        }

        let mut map = unsafe {
            MmapOptions::new()
                .len(BLOCK_SIZE)
                .map_mut(&file)
                .map_err(|e| ArenaError::Open {
                    path: path.to_path_buf(),
                    cause: e.to_string(),
                })?
        };

        let arena = Self {
            block: map.as_mut_ptr() as *const ControlBlock,
            _map: map,
            path: path.to_path_buf(),
        };

        if let Err(cause) = arena.validate() {
            return Err(ArenaError::Corrupt {
                path: path.to_path_buf(),
                cause,
            });
        }
        Ok(arena)
    }

    fn validate(&self) -> Result<(), String> {
        let block = self.block();
        let magic = block.magic.load(Ordering::Acquire);
        if magic != ARENA_MAGIC {
            return Err(format!("bad magic {magic:#018x}"));
        }
        let version = block.version.load(Ordering::Relaxed);
        if version != ARENA_VERSION {
            return Err(format!("unsupported format version {version}"));
        }
        let count = block.node_count.load(Ordering::Relaxed);
        if count < 2 || count as usize > MAX_NODES {
            return Err(format!("invalid node count {count}"));
        }
        Ok(())
    }

    pub(crate) fn block(&self) -> &ControlBlock {
        // The mapping is page-aligned, which exceeds the block's 8-byte
        // alignment, and is at least BLOCK_SIZE long.
        unsafe { &*self.block }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of status slots, coordinator slot included.
    pub fn node_count(&self) -> u32 {
        self.block().node_count.load(Ordering::Relaxed)
    }

    /// Epoch of the most recently started probe cycle.
    pub fn started(&self) -> u64 {
        let block = self.block();
        let _guard = block.lock_counters();
        block.started.load(Ordering::Acquire)
    }

    /// Epoch of the most recently completed probe cycle.
    pub fn completed(&self) -> u64 {
        let block = self.block();
        let _guard = block.lock_counters();
        block.completed.load(Ordering::Acquire)
    }

    /// Both epochs under one lock hold.
    pub fn counters(&self) -> (u64, u64) {
        let block = self.block();
        let _guard = block.lock_counters();
        (
            block.started.load(Ordering::Acquire),
            block.completed.load(Ordering::Acquire),
        )
    }

    /// Most recently published liveness verdict for a node. Lock-free.
    ///
    /// The coordinator sentinel is always reported UP.
    pub fn status_of(&self, node: NodeId) -> ArenaResult<Liveness> {
        if node.is_coordinator() {
            return Ok(Liveness::Up);
        }
        let block = self.block();
        let count = block.node_count.load(Ordering::Relaxed);
        if node.as_u32() >= count {
            return Err(ArenaError::NodeOutOfRange {
                id: node.as_u32(),
                count,
            });
        }
        let word = block.status[node.as_u32() as usize].load(Ordering::Acquire);
        if word & STATUS_UP != 0 {
            Ok(Liveness::Up)
        } else {
            Ok(Liveness::Down)
        }
    }

    /// Change counter over the status table. Lock-free.
    pub fn status_version(&self) -> u64 {
        self.block().status_version.load(Ordering::Acquire)
    }

    /// Pid of the registered prober, if any.
    pub fn prober_pid(&self) -> Option<u32> {
        match self.block().prober_pid.load(Ordering::Acquire) {
            0 => None,
            pid => Some(pid),
        }
    }

    pub fn is_prober_running(&self) -> bool {
        self.prober_pid().is_some()
    }

    /// Whether the calling process is the registered prober.
    pub fn prober_is_self(&self) -> bool {
        self.prober_pid() == Some(std::process::id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::ProberRegistration;
    use std::io::Write;

    fn arena_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("control.arena")
    }

    #[test]
    fn create_then_attach() {
        let dir = tempfile::tempdir().unwrap();
        let path = arena_path(&dir);

        let arena = ProbeArena::create(&path, 4).unwrap();
        assert_eq!(arena.node_count(), 4);
        assert_eq!(arena.counters(), (0, 0));
        assert!(!arena.is_prober_running());

        let other = ProbeArena::attach(&path).unwrap();
        assert_eq!(other.node_count(), 4);
    }

    #[test]
    fn create_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = arena_path(&dir);

        ProbeArena::create(&path, 4).unwrap();
        assert!(matches!(
            ProbeArena::create(&path, 4),
            Err(ArenaError::Create { .. })
        ));
    }

    #[test]
    fn create_validates_node_count() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ProbeArena::create(&arena_path(&dir), 1),
            Err(ArenaError::InvalidNodeCount { count: 1 })
        ));
        assert!(matches!(
            ProbeArena::create(&arena_path(&dir), MAX_NODES as u32 + 1),
            Err(ArenaError::InvalidNodeCount { .. })
        ));
    }

    #[test]
    fn attach_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ProbeArena::attach(&arena_path(&dir)),
            Err(ArenaError::Open { .. })
        ));
    }

    #[test]
    fn attach_rejects_foreign_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = arena_path(&dir);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&vec![0u8; BLOCK_SIZE]).unwrap();

        assert!(matches!(
            ProbeArena::attach(&path),
            Err(ArenaError::Corrupt { .. })
        ));
    }

    #[test]
    fn attach_rejects_truncated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = arena_path(&dir);
        std::fs::write(&path, b"short").unwrap();

        assert!(matches!(
            ProbeArena::attach(&path),
            Err(ArenaError::Corrupt { .. })
        ));
    }

    #[test]
    fn all_nodes_start_up() {
        let dir = tempfile::tempdir().unwrap();
        let arena = ProbeArena::create(&arena_path(&dir), 4).unwrap();

        for id in 0..4 {
            assert_eq!(arena.status_of(NodeId(id)).unwrap(), Liveness::Up);
        }
        assert_eq!(arena.status_version(), 0);
    }

    #[test]
    fn coordinator_is_always_up() {
        let dir = tempfile::tempdir().unwrap();
        let arena = ProbeArena::create(&arena_path(&dir), 2).unwrap();
        assert_eq!(arena.status_of(NodeId::COORDINATOR).unwrap(), Liveness::Up);
    }

    #[test]
    fn status_of_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let arena = ProbeArena::create(&arena_path(&dir), 4).unwrap();

        assert!(matches!(
            arena.status_of(NodeId(4)),
            Err(ArenaError::NodeOutOfRange { id: 4, count: 4 })
        ));
    }

    #[test]
    fn two_handles_share_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = arena_path(&dir);
        let writer = ProbeArena::create(&path, 4).unwrap();
        let reader = ProbeArena::attach(&path).unwrap();

        let writer = std::sync::Arc::new(writer);
        let registration = ProberRegistration::acquire(writer.clone()).unwrap();
        let epoch = registration.begin_cycle();
        registration.publish_status(NodeId(2), Liveness::Down).unwrap();
        registration.complete_cycle(epoch);

        assert_eq!(reader.counters(), (1, 1));
        assert_eq!(reader.status_of(NodeId(2)).unwrap(), Liveness::Down);
        assert_eq!(reader.status_version(), 1);
    }
}
