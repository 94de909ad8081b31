//! Configuration Module
//!
//! Handles loading and validating cache timing parameters.

use std::env;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Default idle timeout in milliseconds
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 15_000;

/// Default interval between reaper sweeps in milliseconds
pub const DEFAULT_REAPER_PERIOD_MS: u64 = 10_000;

/// Cache timing parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Entries with no `get` for this long become eligible for eviction
    pub idle_timeout: Duration,
    /// Interval between background eviction sweeps
    pub reaper_period: Duration,
}

impl CacheConfig {
    /// Creates a config from explicit durations.
    pub fn new(idle_timeout: Duration, reaper_period: Duration) -> Self {
        Self {
            idle_timeout,
            reaper_period,
        }
    }

    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_IDLE_TIMEOUT_MS` - Idle timeout in milliseconds (default: 15000)
    /// - `CACHE_REAPER_PERIOD_MS` - Sweep interval in milliseconds (default: 10000)
    ///
    /// Missing or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self {
            idle_timeout: Duration::from_millis(
                env::var("CACHE_IDLE_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_IDLE_TIMEOUT_MS),
            ),
            reaper_period: Duration::from_millis(
                env::var("CACHE_REAPER_PERIOD_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_REAPER_PERIOD_MS),
            ),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_reaper_period(mut self, reaper_period: Duration) -> Self {
        self.reaper_period = reaper_period;
        self
    }

    /// Checks that both durations are usable.
    ///
    /// A zero reaper period would spin the reaper; a zero idle timeout
    /// would evict every entry on every sweep.
    pub fn validate(&self) -> Result<()> {
        if self.idle_timeout.is_zero() {
            return Err(CacheError::InvalidConfig(
                "idle_timeout must be greater than zero".to_string(),
            ));
        }
        if self.reaper_period.is_zero() {
            return Err(CacheError::InvalidConfig(
                "reaper_period must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_millis(DEFAULT_IDLE_TIMEOUT_MS),
            reaper_period: Duration::from_millis(DEFAULT_REAPER_PERIOD_MS),
        }
    }
}
