//! Core identifiers and verdicts shared by every probegrid crate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a node in the cluster.
///
/// Id 0 is reserved for the coordinator, which is never probed and is
/// always reported reachable. Worker nodes use ids starting at 1; the id
/// doubles as the node's slot index in the shared status table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Reserved id for the coordinator process.
    pub const COORDINATOR: NodeId = NodeId(0);

    /// Whether this id is the coordinator sentinel.
    pub fn is_coordinator(self) -> bool {
        self == Self::COORDINATOR
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Liveness verdict for a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    Up,
    Down,
}

impl Liveness {
    pub fn is_up(self) -> bool {
        self == Liveness::Up
    }

    pub fn is_down(self) -> bool {
        self == Liveness::Down
    }
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Liveness::Up => write!(f, "up"),
            Liveness::Down => write!(f, "down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinator_sentinel() {
        assert!(NodeId::COORDINATOR.is_coordinator());
        assert!(!NodeId(1).is_coordinator());
    }

    #[test]
    fn node_id_display() {
        assert_eq!(NodeId(7).to_string(), "node-7");
    }

    #[test]
    fn liveness_predicates() {
        assert!(Liveness::Up.is_up());
        assert!(!Liveness::Up.is_down());
        assert!(Liveness::Down.is_down());
    }
}
