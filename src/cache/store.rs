//! Cache Store Module
//!
//! Main cache engine combining sharded storage with idle tracking and a
//! background reaper.

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::cleanup::{hook_for, run_hook, Cleanup, CleanupHook};
use crate::cache::{CacheEntry, Clock, Lifecycle, LifecycleState};
use crate::config::CacheConfig;
use crate::error::{CacheError, CleanupError, Result};
use crate::tasks::spawn_reaper;

// == Sweep Outcome ==
/// What a single eviction sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Entries inspected
    pub scanned: usize,
    /// Entries removed for being idle
    pub evicted: usize,
    /// Evicted entries whose cleanup hook failed or panicked
    pub cleanup_failures: usize,
}

// == Cache Core ==
/// State shared between the cache handle and its reaper task.
pub(crate) struct CacheCore<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    clock: Clock,
    next_id: AtomicU64,
    config: CacheConfig,
    lifecycle: Lifecycle,
    /// Serializes sweeps; the reaper and `sweep_now` never overlap
    sweep_lock: Mutex<()>,
}

impl<K, V> CacheCore<K, V> {
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }
}

impl<K, V> CacheCore<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            clock: Clock::new(),
            next_id: AtomicU64::new(0),
            config,
            lifecycle: Lifecycle::new(),
            sweep_lock: Mutex::new(()),
        }
    }

    fn insert(&self, key: K, value: V, cleanup: Option<CleanupHook<V>>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = CacheEntry::new(value, id, self.clock.now(), cleanup);

        // The replaced entry is dropped here, outside the shard lock, and
        // its hook is never run.
        let _replaced = self.entries.insert(key, entry);
    }

    // == Sweep ==
    /// Evicts every entry that has been idle for at least the idle timeout
    /// and runs the cleanup hooks of the evicted entries.
    ///
    /// Scanning and removal happen under the sweep lock. Hooks run after it
    /// is released, so a hook may call back into the cache, `sweep_now`
    /// included.
    pub fn sweep(&self) -> SweepOutcome {
        let (scanned, evicted) = {
            let _guard = self.sweep_lock.lock();
            let now = self.clock.now();
            let (scanned, candidates) = self.collect_idle(now);
            (scanned, self.evict(candidates, now))
        };

        let mut outcome = SweepOutcome {
            scanned,
            evicted: evicted.len(),
            cleanup_failures: 0,
        };

        for (key, entry) in evicted {
            let (value, cleanup) = entry.into_parts();
            if let Some(hook) = cleanup {
                if let Err(err) = run_hook(hook, &value) {
                    outcome.cleanup_failures += 1;
                    warn!(key = ?key, error = %err, "Cleanup failed for evicted entry");
                }
            }
        }

        outcome
    }

    /// Returns the number of entries scanned and the `(key, id)` of each
    /// idle one. Shard locks are released before this returns.
    fn collect_idle(&self, now: u64) -> (usize, Vec<(K, u64)>) {
        let idle_timeout = self.config.idle_timeout;
        let mut scanned = 0;
        let mut candidates = Vec::new();
        for item in self.entries.iter() {
            scanned += 1;
            if item.value().is_idle(now, idle_timeout) {
                candidates.push((item.key().clone(), item.value().id()));
            }
        }
        (scanned, candidates)
    }

    /// Compare-and-remove for each candidate. An entry replaced since the
    /// scan (different id) or read since the scan (no longer idle) stays.
    fn evict(&self, candidates: Vec<(K, u64)>, now: u64) -> Vec<(K, CacheEntry<V>)> {
        let idle_timeout = self.config.idle_timeout;
        candidates
            .into_iter()
            .filter_map(|(key, id)| {
                self.entries.remove_if(&key, |_, entry| {
                    entry.id() == id && entry.is_idle(now, idle_timeout)
                })
            })
            .collect()
    }
}

// == Expiring Cache ==
/// A concurrent key-value cache that evicts idle entries in the background.
///
/// `get`, `put` and `remove` never fail and never wait for the reaper
/// beyond a single shard lock. An entry that goes `idle_timeout` without a
/// `get` is removed by the next reaper sweep, and its cleanup hook (if any)
/// runs exactly once after removal. Overwriting or removing an entry hands
/// it back without running cleanup.
///
/// Must be created inside a tokio runtime (or given a [`Handle`]) because
/// the reaper runs as a tokio task. Dropping the cache shuts the reaper down.
pub struct ExpiringCache<K, V> {
    core: Arc<CacheCore<K, V>>,
    reaper: JoinHandle<()>,
}

impl<K, V> ExpiringCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache and starts its reaper on the current tokio runtime.
    ///
    /// # Errors
    /// - `CacheError::InvalidConfig` if either duration is zero
    /// - `CacheError::NoRuntime` if called outside a tokio runtime
    pub fn new(config: CacheConfig) -> Result<Self> {
        let handle = Handle::try_current().map_err(|_| CacheError::NoRuntime)?;
        Self::with_handle(config, &handle)
    }

    /// Creates a cache whose reaper runs on the given runtime.
    pub fn with_handle(config: CacheConfig, handle: &Handle) -> Result<Self> {
        config.validate()?;

        let core = Arc::new(CacheCore::new(config));
        let reaper = spawn_reaper(core.clone(), handle);

        info!(
            "Cache created: idle_timeout={:?}, reaper_period={:?}",
            config.idle_timeout, config.reaper_period
        );

        Ok(Self { core, reaper })
    }

    // == Get ==
    /// Retrieves a clone of the value and resets the entry's idle clock.
    ///
    /// Returns `None` on a miss.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        let item = self.core.entries.get(key)?;
        let entry = item.value();
        entry.touch(self.core.clock.now());
        Some(entry.value().clone())
    }

    // == Put ==
    /// Inserts or replaces the value under `key`.
    ///
    /// A replaced entry is discarded without running its cleanup.
    pub fn put(&self, key: K, value: V) {
        self.core.insert(key, value, None);
    }

    /// Inserts or replaces the value and attaches a cleanup hook that runs
    /// once if the entry is evicted for being idle.
    pub fn put_with_cleanup<F>(&self, key: K, value: V, cleanup: F)
    where
        F: FnOnce(&V) -> std::result::Result<(), CleanupError> + Send + Sync + 'static,
    {
        self.core.insert(key, value, Some(Box::new(cleanup)));
    }

    /// Inserts or replaces a value that carries its own [`Cleanup`].
    pub fn put_cleanable(&self, key: K, value: V)
    where
        V: Cleanup,
    {
        self.core.insert(key, value, Some(hook_for::<V>()));
    }

    // == Remove ==
    /// Removes and returns the value, handing ownership back to the caller.
    ///
    /// The entry's cleanup hook is dropped without running.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.core
            .entries
            .remove(key)
            .map(|(_, entry)| entry.into_parts().0)
    }

    /// Checks for a key without resetting its idle clock.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.core.entries.contains_key(key)
    }

    // == Sweep Now ==
    /// Runs one eviction sweep on the calling thread.
    ///
    /// Waits for a reaper sweep in progress to finish first. Works in any
    /// lifecycle state.
    pub fn sweep_now(&self) -> SweepOutcome {
        self.core.sweep()
    }

    // == Shutdown ==
    /// Stops scheduling reaper sweeps.
    ///
    /// Does not wait for an in-flight sweep or its cleanup hooks. Calling it
    /// again is a no-op.
    pub fn shutdown(&self) {
        if self.core.lifecycle.shutdown() {
            info!("Cache shutdown requested, reaper is {}", self.state());
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.core.lifecycle.state()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.core.config
    }

    /// Returns true once the reaper task has exited.
    pub fn is_reaper_finished(&self) -> bool {
        self.reaper.is_finished()
    }

    // == Length ==
    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.core.entries.len()
    }

    // == Is Empty ==
    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.core.entries.is_empty()
    }
}

impl<K, V> Drop for ExpiringCache<K, V> {
    fn drop(&mut self) {
        self.core.lifecycle.shutdown();
    }
}

impl<K: Eq + Hash, V> fmt::Debug for ExpiringCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiringCache")
            .field("entries", &self.core.entries.len())
            .field("config", &self.core.config)
            .field("state", &self.core.lifecycle.state())
            .finish()
    }
}
