//! Background Tasks Module
//!
//! Contains background tasks that run for the lifetime of a cache.
//!
//! # Tasks
//! - Reaper: Evicts idle cache entries at the configured period

mod reaper;

pub(crate) use reaper::spawn_reaper;
