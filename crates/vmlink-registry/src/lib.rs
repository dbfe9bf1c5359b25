//! vmlink-registry — the peer connection registry.
//!
//! Tracks, per neighbouring VM, whether a fast-path channel exists, its
//! hardware and network address identity, and whether it is healthy,
//! stale, or being torn down ahead of migration.
//!
//! Two indices share one structural lock:
//! - [`MacIndex`] owns the entries (arena slots addressed by [`EntryHandle`]).
//! - [`IpIndex`] holds handles only; it never allocates or frees.
//!
//! Lookups take a short per-bucket read lock and never the structural lock.
//! The lifecycle passes (`check_timeout`, `update`, `mark_suspend_all`,
//! `reap_suspended`, `drain_all`) live in [`lifecycle`].

pub mod arena;
pub mod bucket;
pub mod channel;
pub mod clock;
pub mod entry;
pub mod error;
pub mod index;
pub mod lifecycle;
pub mod maintenance;
pub mod registry;
pub mod signal;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use arena::{Arena, EntryHandle};
pub use bucket::{BucketKey, BucketStore, StructuralLock};
pub use channel::{Channel, ChannelId, PeerNotifier};
pub use clock::{Clock, MonotonicClock};
pub use entry::{ConnectionEntry, EntrySnapshot, EntryStatus, PeerId};
pub use error::RegistryError;
pub use index::{IpIndex, MacIndex};
pub use lifecycle::UpdateOutcome;
pub use maintenance::{freeze, sweep_loop, sweep_once, SweepReport};
pub use registry::Registry;
pub use signal::SuspendSignal;
