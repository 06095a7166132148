//! grid.toml configuration parser.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::NodeId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub fault_detection: FaultDetectionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Path of the shared control arena file.
    pub arena_path: PathBuf,
    /// The worker nodes whose reachability is tracked.
    pub nodes: Vec<NodeSpec>,
}

/// A single worker node entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeSpec {
    pub id: NodeId,
    pub host: String,
    pub port: u16,
}

impl NodeSpec {
    /// The `host:port` address probed for liveness.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultDetectionConfig {
    /// Master switch for fault detection. When false, down-node checks
    /// and the status version report nothing and probe requests are
    /// skipped; the cached table is still readable.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Interval of the prober's own periodic timer (e.g. "30s").
    #[serde(default = "default_probe_interval")]
    pub probe_interval: String,
    /// Per-node liveness probe timeout (e.g. "2s").
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: String,
    /// Polling quantum for requesters waiting on a cycle (e.g. "50ms").
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
    /// UDP port the prober listens on for wake datagrams.
    #[serde(default = "default_wake_port")]
    pub wake_port: u16,
}

fn default_enabled() -> bool {
    true
}

fn default_probe_interval() -> String {
    "30s".to_string()
}

fn default_probe_timeout() -> String {
    "2s".to_string()
}

fn default_poll_interval() -> String {
    "50ms".to_string()
}

fn default_wake_port() -> u16 {
    7401
}

impl Default for FaultDetectionConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            probe_interval: default_probe_interval(),
            probe_timeout: default_probe_timeout(),
            poll_interval: default_poll_interval(),
            wake_port: default_wake_port(),
        }
    }
}

impl FaultDetectionConfig {
    pub fn probe_interval(&self) -> Duration {
        parse_duration(&self.probe_interval).unwrap_or(Duration::from_secs(30))
    }

    pub fn probe_timeout(&self) -> Duration {
        parse_duration(&self.probe_timeout).unwrap_or(Duration::from_secs(2))
    }

    pub fn poll_interval(&self) -> Duration {
        parse_duration(&self.poll_interval).unwrap_or(Duration::from_millis(50))
    }
}

impl ClusterConfig {
    /// Number of status slots the arena needs: one per node id plus the
    /// coordinator's slot 0.
    pub fn table_size(&self) -> u32 {
        self.nodes.iter().map(|n| n.id.as_u32()).max().unwrap_or(0) + 1
    }
}

impl GridConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: GridConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks that TOML parsing cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cluster.nodes.is_empty() {
            anyhow::bail!("cluster has no nodes");
        }
        let mut seen = HashSet::new();
        for node in &self.cluster.nodes {
            if node.id.is_coordinator() {
                anyhow::bail!("node id 0 is reserved for the coordinator");
            }
            if !seen.insert(node.id) {
                anyhow::bail!("duplicate node id {}", node.id);
            }
        }
        Ok(())
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
