//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Errors raised while constructing a cache.
///
/// Data operations never fail: a missing key is reported as `None`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Configuration values are unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No tokio runtime was available to host the reaper task
    #[error("No tokio runtime available to run the reaper")]
    NoRuntime,
}

// == Cleanup Error Enum ==
/// Failure reported by an entry's cleanup hook during eviction.
///
/// These are logged by the sweep and never reach the caller of a public
/// cache operation.
#[derive(Error, Debug)]
pub enum CleanupError {
    /// Hook reported a failure with a message
    #[error("Cleanup failed: {0}")]
    Failed(String),

    /// Hook reported a failure from an underlying error
    #[error("Cleanup failed: {0}")]
    Source(#[from] Box<dyn std::error::Error + Send + Sync>),

    /// Hook panicked
    #[error("Cleanup panicked: {0}")]
    Panicked(String),
}

impl CleanupError {
    /// Shorthand for a message-only failure.
    pub fn failed(message: impl Into<String>) -> Self {
        CleanupError::Failed(message.into())
    }
}

impl From<std::io::Error> for CleanupError {
    fn from(err: std::io::Error) -> Self {
        CleanupError::Source(Box::new(err))
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache construction.
pub type Result<T> = std::result::Result<T, CacheError>;
