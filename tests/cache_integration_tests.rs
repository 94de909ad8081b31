//! Integration Tests for the Expiring Cache
//!
//! Exercises the public API end to end, including the background reaper,
//! on both a paused clock and a real multi-threaded runtime.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use idle_cache::{
    CacheConfig, CacheError, Cleanup, CleanupError, ExpiringCache, LifecycleState,
};

// == Helper Functions ==

fn scenario_config() -> CacheConfig {
    CacheConfig::new(Duration::from_secs(15), Duration::from_secs(10))
}

fn counting_hook(
    counter: &Arc<AtomicUsize>,
) -> impl FnOnce(&String) -> Result<(), CleanupError> + Send + Sync + 'static {
    let counter = counter.clone();
    move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Polls `condition` on the calling thread until it holds or `timeout` passes.
fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

struct FileHandle {
    closed: AtomicUsize,
}

impl Cleanup for FileHandle {
    fn cleanup(&self) -> Result<(), CleanupError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// == Basic Operation Tests ==

#[tokio::test]
async fn test_get_missing_key() {
    let cache: ExpiringCache<u128, String> = ExpiringCache::new(scenario_config()).unwrap();
    assert_eq!(cache.get(&0x1234_5678_9abc_def0_u128), None);
}

#[tokio::test]
async fn test_put_then_get() {
    let cache = ExpiringCache::new(scenario_config()).unwrap();

    cache.put(7u128, "seven".to_string());

    assert_eq!(cache.get(&7u128), Some("seven".to_string()));
}

#[tokio::test]
async fn test_put_overwrite_returns_latest() {
    let cache = ExpiringCache::new(scenario_config()).unwrap();
    let first_cleaned = Arc::new(AtomicUsize::new(0));

    cache.put_with_cleanup("k".to_string(), "v1".to_string(), counting_hook(&first_cleaned));
    cache.put("k".to_string(), "v2".to_string());
    cache.sweep_now();

    assert_eq!(cache.get("k"), Some("v2".to_string()));
    assert_eq!(first_cleaned.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_remove_returns_value_without_cleanup() {
    let cache = ExpiringCache::new(scenario_config()).unwrap();
    let cleaned = Arc::new(AtomicUsize::new(0));

    cache.put_with_cleanup("k".to_string(), "v".to_string(), counting_hook(&cleaned));

    assert_eq!(cache.remove("k"), Some("v".to_string()));
    assert_eq!(cache.get("k"), None);
    assert_eq!(cleaned.load(Ordering::SeqCst), 0);
}

#[test]
fn test_new_requires_runtime() {
    let result = ExpiringCache::<String, String>::new(scenario_config());
    assert!(matches!(result, Err(CacheError::NoRuntime)));
}

#[test]
fn test_with_handle_outside_runtime_context() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let cache = ExpiringCache::with_handle(scenario_config(), rt.handle()).unwrap();

    cache.put("k".to_string(), 1u32);

    assert_eq!(cache.get("k"), Some(1));
    assert_eq!(cache.state(), LifecycleState::Running);
}

// == Reaper Scenario Tests ==

#[tokio::test(start_paused = true)]
async fn test_scenario_unaccessed_entry_is_evicted_once() {
    let cache = ExpiringCache::new(scenario_config()).unwrap();
    let cleaned = Arc::new(AtomicUsize::new(0));

    cache.put_with_cleanup("A".to_string(), "a".to_string(), counting_hook(&cleaned));

    tokio::time::sleep(Duration::from_secs(30)).await;

    assert!(cache.get("A").is_none(), "A should be gone by t=30s");
    assert_eq!(cleaned.load(Ordering::SeqCst), 1);

    // Later sweeps must not run the hook again
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(cleaned.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_get_resets_idle_clock() {
    let cache = ExpiringCache::new(scenario_config()).unwrap();
    let cleaned = Arc::new(AtomicUsize::new(0));

    cache.put_with_cleanup("B".to_string(), "b".to_string(), counting_hook(&cleaned));

    tokio::time::sleep(Duration::from_secs(12)).await;
    assert_eq!(cache.get("B"), Some("b".to_string()));

    tokio::time::sleep(Duration::from_secs(8)).await;
    assert!(cache.contains_key("B"), "B must survive the t=20s sweep");
    assert_eq!(cleaned.load(Ordering::SeqCst), 0);

    // Eligible from t=27s, removed by the t=30s sweep
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert!(!cache.contains_key("B"));
    assert_eq!(cleaned.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cleanable_values_are_cleaned_on_eviction() {
    let cache = ExpiringCache::new(scenario_config()).unwrap();
    let handle = Arc::new(FileHandle {
        closed: AtomicUsize::new(0),
    });

    cache.put_cleanable("conn".to_string(), handle.clone());
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert!(cache.is_empty());
    assert_eq!(handle.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failing_cleanup_does_not_stop_sweep() {
    let cache = ExpiringCache::new(scenario_config()).unwrap();
    let cleaned = Arc::new(AtomicUsize::new(0));

    cache.put_with_cleanup("bad".to_string(), "x".to_string(), |_| {
        Err(CleanupError::failed("lock already released"))
    });
    for i in 0..10 {
        cache.put_with_cleanup(format!("good{}", i), "x".to_string(), counting_hook(&cleaned));
    }

    tokio::time::sleep(Duration::from_secs(21)).await;

    assert!(cache.is_empty());
    assert_eq!(cleaned.load(Ordering::SeqCst), 10);
}

#[tokio::test(start_paused = true)]
async fn test_no_eviction_after_shutdown() {
    let cache = ExpiringCache::new(scenario_config()).unwrap();
    let cleaned = Arc::new(AtomicUsize::new(0));

    cache.put_with_cleanup("k".to_string(), "v".to_string(), counting_hook(&cleaned));
    cache.shutdown();
    cache.shutdown();

    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(cache.state(), LifecycleState::Stopped);
    assert!(cache.is_reaper_finished());
    assert_eq!(cache.get("k"), Some("v".to_string()));
    assert_eq!(cleaned.load(Ordering::SeqCst), 0);

    // Manual sweeps are still available to the owner
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(cache.sweep_now().evicted, 1);
    assert_eq!(cleaned.load(Ordering::SeqCst), 1);
}

// == Concurrency Tests ==

#[test]
fn test_shutdown_during_sweep_does_not_wait() {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();
    let config = CacheConfig::new(Duration::from_millis(10), Duration::from_millis(20));
    let cache = ExpiringCache::with_handle(config, rt.handle()).unwrap();

    let started = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    {
        let started = started.clone();
        let release = release.clone();
        cache.put_with_cleanup("slow".to_string(), "v".to_string(), move |_| {
            started.wait();
            release.wait();
            Ok(())
        });
    }

    // The reaper is now blocked inside the hook
    started.wait();
    cache.shutdown();
    assert_eq!(cache.state(), LifecycleState::ShuttingDown);
    assert!(!cache.is_reaper_finished());

    release.wait();
    assert!(wait_until(Duration::from_secs(5), || {
        cache.state() == LifecycleState::Stopped && cache.is_reaper_finished()
    }));

    // Data operations keep working after the reaper is gone
    cache.put("after".to_string(), "v".to_string());
    assert_eq!(cache.get("after"), Some("v".to_string()));
}

#[test]
fn test_concurrent_disjoint_writers() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let cache = Arc::new(ExpiringCache::with_handle(scenario_config(), rt.handle()).unwrap());
    let threads = 8;
    let keys_per_thread = 200;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..keys_per_thread {
                    let key = format!("{}-{}", t, i);
                    cache.put(key.clone(), 0usize);
                    cache.put(key.clone(), i);
                    assert_eq!(cache.get(&key), Some(i));
                    if i % 4 == 0 {
                        assert_eq!(cache.remove(&key), Some(i));
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Worker thread should not panic");
    }

    let expected_per_thread = keys_per_thread - keys_per_thread / 4;
    assert_eq!(cache.len(), threads * expected_per_thread);
    for t in 0..threads {
        for i in 0..keys_per_thread {
            let key = format!("{}-{}", t, i);
            let expected = if i % 4 == 0 { None } else { Some(i) };
            assert_eq!(cache.get(&key), expected);
        }
    }
}

#[test]
fn test_readers_keep_entry_alive_under_real_reaper() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let config = CacheConfig::new(Duration::from_millis(250), Duration::from_millis(20));
    let cache = Arc::new(ExpiringCache::with_handle(config, rt.handle()).unwrap());
    let cleaned = Arc::new(AtomicUsize::new(0));

    cache.put_with_cleanup("hot".to_string(), "v".to_string(), counting_hook(&cleaned));
    cache.put_with_cleanup("cold".to_string(), "v".to_string(), counting_hook(&cleaned));

    let reader = {
        let cache = cache.clone();
        thread::spawn(move || {
            let start = Instant::now();
            while start.elapsed() < Duration::from_millis(600) {
                assert!(cache.get("hot").is_some(), "hot entry was evicted");
                thread::sleep(Duration::from_millis(10));
            }
        })
    };
    reader.join().expect("reader should keep the hot entry");

    assert!(cache.contains_key("hot"));
    assert!(!cache.contains_key("cold"));
    assert_eq!(cleaned.load(Ordering::SeqCst), 1);
}
