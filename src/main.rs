//! Idle Cache demo
//!
//! Caches a handful of fake client sessions, keeps one of them busy and
//! lets the reaper close the others once they go idle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use idle_cache::{CacheConfig, Cleanup, CleanupError, ExpiringCache};

/// A stand-in for a resource that must be released, such as a connection.
#[derive(Debug)]
struct Session {
    id: u32,
    open: AtomicBool,
}

impl Session {
    fn open(id: u32) -> Arc<Self> {
        Arc::new(Self {
            id,
            open: AtomicBool::new(true),
        })
    }
}

impl Cleanup for Session {
    fn cleanup(&self) -> Result<(), CleanupError> {
        if !self.open.swap(false, Ordering::SeqCst) {
            return Err(CleanupError::failed(format!(
                "session {} was already closed",
                self.id
            )));
        }
        info!("Closed idle session {}", self.id);
        Ok(())
    }
}

/// Main entry point for the demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache, which starts its reaper
/// 4. Insert sessions and keep one of them active
/// 5. Shut the cache down on SIGINT/SIGTERM or after `DEMO_RUN_SECS`
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "idle_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Idle Cache demo");

    let config = CacheConfig::from_env();
    info!(
        "Configuration loaded: idle_timeout={:?}, reaper_period={:?}",
        config.idle_timeout, config.reaper_period
    );

    let cache: ExpiringCache<String, Arc<Session>> =
        ExpiringCache::new(config).context("failed to create cache")?;

    for id in 1..=3 {
        cache.put_cleanable(format!("session-{}", id), Session::open(id));
    }
    info!("Inserted {} sessions", cache.len());

    let run_for = std::env::var("DEMO_RUN_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs);

    let keep_alive = async {
        let period = (config.idle_timeout / 2).max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if cache.get("session-1").is_none() {
                warn!("Active session was evicted");
            }
            info!("Sessions remaining: {}", cache.len());
        }
    };

    let deadline = async {
        match run_for {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = keep_alive => {}
        _ = deadline => {
            info!("Demo run time elapsed");
        }
        _ = shutdown_signal() => {}
    }

    cache.shutdown();
    info!("Demo finished with {} sessions cached", cache.len());

    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
