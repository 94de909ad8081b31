//! Idle Cache - A concurrent in-memory cache with idle-time eviction
//!
//! Entries that go unread for the configured idle timeout are evicted by a
//! background reaper, which runs each evicted entry's cleanup hook once.

pub mod cache;
pub mod config;
pub mod error;
mod tasks;

pub use cache::{Cleanup, CleanupHook, ExpiringCache, LifecycleState, SweepOutcome};
pub use config::CacheConfig;
pub use error::{CacheError, CleanupError};
