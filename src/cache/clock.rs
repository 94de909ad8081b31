//! Cache Clock Module
//!
//! Converts instants into compact nanosecond stamps relative to a per-cache
//! epoch so access times can live in an atomic.

use std::time::Duration;

use tokio::time::Instant;

// == Clock ==
/// Monotonic reference point shared by every entry of one cache.
///
/// Reads `tokio::time::Instant`, which follows a paused test clock.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    epoch: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    // == Now ==
    /// Returns the current time as nanoseconds since the epoch.
    #[inline]
    pub fn now(&self) -> u64 {
        self.stamp(Instant::now())
    }

    /// Converts an instant into a stamp, clamping instants before the epoch to 0.
    #[inline]
    fn stamp(&self, instant: Instant) -> u64 {
        duration_to_nanos(instant.saturating_duration_since(self.epoch))
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// Saturating conversion; u64 nanoseconds cover several centuries.
#[inline]
pub fn duration_to_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
