//! probegrid-rendezvous — the requester side of fault detection.
//!
//! Any number of coordinator processes can demand an up-to-date view of
//! node liveness. The [`RendezvousCoordinator`] signals the prober over a
//! best-effort wake channel, then poll-sleeps on the shared cycle
//! counters until a cycle that started *after* the request has fully
//! completed. The wait is cooperative: a [`CancellationToken`] is checked
//! every quantum, so a process being asked to stop never hangs here.

pub mod cancel;
pub mod coordinator;
pub mod error;
pub mod wake;

pub use cancel::CancellationToken;
pub use coordinator::{DEFAULT_POLL_INTERVAL, ProbeRequest, RendezvousCoordinator};
pub use error::RendezvousError;
pub use wake::{NoopWake, UdpWakeSender, WakeSender};
