//! probegrid-prober — the single process that produces status.
//!
//! The prober owns the write side of the shared arena. Its cycle loop
//! runs one probe round per timer tick and one per wake datagram:
//!
//! ```text
//! ProbeCycleManager::run
//!   ├── timer tick ──────┐
//!   ├── wake datagram ───┤→ run_cycle
//!   │                    │    ├── begin_cycle()            started += 1
//!   │                    │    ├── NodeProber::check_liveness per node
//!   │                    │    ├── publish_status per node
//!   │                    │    └── complete_cycle(epoch)    completed = epoch
//!   └── shutdown watch → break
//! ```
//!
//! A node that cannot be evaluated is recorded DOWN and the cycle still
//! completes; nothing a single node does can stall the rendezvous of the
//! requesters waiting on `completed`.

pub mod cycle;
pub mod prober;
pub mod wake;

pub use cycle::ProbeCycleManager;
pub use prober::{NodeProber, ProbeOutcome, TcpConnectProber};
pub use wake::UdpWakeListener;
