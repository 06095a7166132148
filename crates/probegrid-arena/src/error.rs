//! Error types for the shared control arena.

use std::path::PathBuf;

use thiserror::Error;

use crate::block::MAX_NODES;

/// Result type alias for arena operations.
pub type ArenaResult<T> = Result<T, ArenaError>;

/// Errors that can occur while creating, attaching, or using the arena.
#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("failed to create arena {path}: {cause}")]
    Create { path: PathBuf, cause: String },

    #[error("failed to open arena {path}: {cause}")]
    Open { path: PathBuf, cause: String },

    #[error("arena {path} is not usable: {cause}")]
    Corrupt { path: PathBuf, cause: String },

    #[error("node table needs 2..={} slots, got {count}", MAX_NODES)]
    InvalidNodeCount { count: u32 },

    #[error("node id {id} is outside the {count}-slot status table")]
    NodeOutOfRange { id: u32, count: u32 },

    #[error("a prober is already running (pid {0})")]
    ProberAlreadyRunning(u32),
}
