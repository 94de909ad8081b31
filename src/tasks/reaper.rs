//! Idle Entry Reaper
//!
//! Background task that periodically evicts idle cache entries.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::{self, JoinHandle};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cache::CacheCore;

/// Spawns the task that sweeps the cache every `reaper_period`.
///
/// The first sweep happens one full period after spawning. The task exits
/// as soon as shutdown is requested, or after the sweep in flight when
/// shutdown arrives; it never starts a new sweep once the cache has left
/// the running state.
///
/// Each sweep runs on tokio's blocking pool, so slow cleanup hooks never
/// occupy a runtime worker that caller tasks need.
///
/// # Returns
/// A JoinHandle for the spawned task. Stopping the task goes through the
/// cache lifecycle, not through `abort`, so an in-flight sweep always
/// finishes its cleanup hooks.
pub(crate) fn spawn_reaper<K, V>(core: Arc<CacheCore<K, V>>, handle: &Handle) -> JoinHandle<()>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    let period = core.config().reaper_period;
    // Owned by the future, so it also fires when the runtime drops the task
    // before or while it runs
    let stopped = StopOnDrop(core.clone());

    handle.spawn(async move {
        let _stopped = stopped;

        info!("Starting reaper with period of {:?}", period);

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = core.lifecycle().wait_for_shutdown() => break,
            }

            if !core.lifecycle().begin_sweep() {
                break;
            }

            let sweeper = core.clone();
            match task::spawn_blocking(move || sweeper.sweep()).await {
                Ok(outcome) if outcome.evicted > 0 => {
                    info!(
                        "Reaper sweep: evicted {} of {} entries ({} cleanup failures)",
                        outcome.evicted, outcome.scanned, outcome.cleanup_failures
                    );
                }
                Ok(outcome) => {
                    debug!("Reaper sweep: no idle entries among {}", outcome.scanned);
                }
                Err(err) => {
                    warn!("Reaper sweep did not complete: {}", err);
                }
            }

            if !core.lifecycle().end_sweep() {
                break;
            }
        }

        info!("Reaper stopped");
    })
}

/// Marks the lifecycle stopped however the reaper future ends.
struct StopOnDrop<K, V>(Arc<CacheCore<K, V>>);

impl<K, V> Drop for StopOnDrop<K, V> {
    fn drop(&mut self) {
        self.0.lifecycle().mark_stopped();
    }
}
