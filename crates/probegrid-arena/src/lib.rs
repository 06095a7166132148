//! probegrid-arena — the shared control block for cluster fault detection.
//!
//! One memory-mapped file holds everything the prober process and the
//! requester processes share: a spin-held counter lock, the probe cycle
//! epochs, the per-node status table, and the prober's registration slot.
//! Every field is an atomic word, so the table is readable without any
//! coordination and a single store can never be observed torn.
//!
//! # Architecture
//!
//! ```text
//! ProbeArena (one handle per process, all mapping the same file)
//!   ├── create()            one-time init, magic written last
//!   ├── attach()            validates magic/version before use
//!   ├── started()/completed()   counter reads under the spin lock
//!   ├── status_of()/status_version()   lock-free reads
//!   └── ProberRegistration::acquire()
//!         ├── begin_cycle()        started += 1
//!         ├── publish_status()     whole-word store, version bump on change
//!         └── complete_cycle()     fence, then completed = epoch
//! ```
//!
//! # Write discipline
//!
//! Exactly one process holds a [`ProberRegistration`] at a time; the
//! counter and status writers live on that guard, so the single-writer
//! rule is enforced by the type system rather than by convention. Readers
//! observing `completed >= N` are guaranteed to see every status store
//! belonging to cycle `N`.

pub mod arena;
pub mod block;
pub mod error;
pub mod registration;
pub mod status;

pub use arena::ProbeArena;
pub use block::MAX_NODES;
pub use error::{ArenaError, ArenaResult};
pub use registration::ProberRegistration;
pub use status::StatusCache;
