//! Error types for the rendezvous protocol.

use thiserror::Error;

/// Errors that can cross the coordinator boundary.
///
/// Everything else is absorbed: a missing prober is a no-op success and
/// node probe failures never leave the prober process.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RendezvousError {
    /// The wait was interrupted before a fresh cycle completed. The
    /// caller must treat freshness as unknown and fall back to the
    /// cached table.
    #[error("cancelled while waiting for a probe cycle; freshness not established")]
    Cancelled,
}
