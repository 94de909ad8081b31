//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with idle tracking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::cache::clock::duration_to_nanos;
use crate::cache::cleanup::CleanupHook;

// == Cache Entry ==
/// A stored value plus the metadata the reaper needs.
pub struct CacheEntry<V> {
    /// The stored value
    value: V,
    /// Identity of this insertion; a replacement under the same key gets a new id
    id: u64,
    /// Last successful `get` (or insertion), nanoseconds since the cache epoch
    last_access: AtomicU64,
    /// Runs at most once, after the entry has left the map through eviction
    cleanup: Option<CleanupHook<V>>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry stamped with the insertion time.
    pub fn new(value: V, id: u64, now: u64, cleanup: Option<CleanupHook<V>>) -> Self {
        Self {
            value,
            id,
            last_access: AtomicU64::new(now),
            cleanup,
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn last_access(&self) -> u64 {
        self.last_access.load(Ordering::Acquire)
    }

    pub fn has_cleanup(&self) -> bool {
        self.cleanup.is_some()
    }

    // == Touch ==
    /// Records an access at `now`.
    ///
    /// Uses `fetch_max` so a reader that sampled the clock earlier can never
    /// move the stamp backwards.
    pub fn touch(&self, now: u64) {
        self.last_access.fetch_max(now, Ordering::AcqRel);
    }

    // == Is Idle ==
    /// Checks whether the entry has gone unaccessed for at least `idle_timeout`.
    ///
    /// Boundary condition: an entry whose age equals the timeout is idle.
    pub fn is_idle(&self, now: u64, idle_timeout: Duration) -> bool {
        now.saturating_sub(self.last_access()) >= duration_to_nanos(idle_timeout)
    }

    /// Splits the entry into its value and its cleanup hook.
    pub fn into_parts(self) -> (V, Option<CleanupHook<V>>) {
        (self.value, self.cleanup)
    }
}

impl<V: fmt::Debug> fmt::Debug for CacheEntry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("value", &self.value)
            .field("id", &self.id)
            .field("last_access", &self.last_access())
            .field("has_cleanup", &self.has_cleanup())
            .finish()
    }
}
