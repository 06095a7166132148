//! Lock-free read API over the cached status table.

use std::sync::Arc;

use probe_core::{Liveness, NodeId};

use crate::arena::ProbeArena;
use crate::error::ArenaResult;

/// Read handle over the status table.
///
/// Reads never block and never force a probe; they return whatever the
/// most recently completed cycle published. The `fault_detection_enabled`
/// flag is the explicit kill-switch: with it off, the down-node checks
/// and the change counter report "nothing is wrong", while [`Self::get`]
/// still exposes the raw cached verdicts.
#[derive(Clone)]
pub struct StatusCache {
    arena: Arc<ProbeArena>,
    fault_detection_enabled: bool,
}

impl StatusCache {
    pub fn new(arena: Arc<ProbeArena>, fault_detection_enabled: bool) -> Self {
        Self {
            arena,
            fault_detection_enabled,
        }
    }

    /// Cached verdict for one node. The coordinator sentinel is always UP.
    pub fn get(&self, node: NodeId) -> ArenaResult<Liveness> {
        self.arena.status_of(node)
    }

    /// Change counter over the table; 0 while fault detection is off.
    ///
    /// Callers use this to detect "anything changed since I last looked"
    /// without forcing a fresh probe. A version observed after the reads
    /// it guards means possibly-stale data, never torn data.
    pub fn version(&self) -> u64 {
        if !self.fault_detection_enabled {
            return 0;
        }
        self.arena.status_version()
    }

    /// Whether a node is cached as DOWN; always false with fault
    /// detection off.
    pub fn is_down(&self, node: NodeId) -> ArenaResult<bool> {
        if !self.fault_detection_enabled {
            return Ok(false);
        }
        Ok(self.get(node)?.is_down())
    }

    /// Whether any of the given nodes is cached as DOWN.
    pub fn any_down(&self, nodes: &[NodeId]) -> ArenaResult<bool> {
        for &node in nodes {
            if self.is_down(node)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
