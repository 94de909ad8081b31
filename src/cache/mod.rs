//! Cache Module
//!
//! Provides a concurrent in-memory cache with idle-time eviction and
//! per-entry cleanup hooks.

mod cleanup;
mod clock;
mod entry;
mod lifecycle;
mod store;


// Re-export public types
pub use cleanup::{Cleanup, CleanupHook};
pub use lifecycle::LifecycleState;
pub use store::{ExpiringCache, SweepOutcome};

pub(crate) use clock::Clock;
pub(crate) use entry::CacheEntry;
pub(crate) use lifecycle::Lifecycle;
pub(crate) use store::CacheCore;
