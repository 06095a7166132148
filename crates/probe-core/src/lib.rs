pub mod config;
pub mod types;

pub use config::{ClusterConfig, FaultDetectionConfig, GridConfig, NodeSpec};
pub use types::{Liveness, NodeId};
