//! Cleanup Capability Module
//!
//! Values may carry a one-shot cleanup action that the reaper runs after
//! evicting them. Plain values need nothing: the hook is optional and is
//! attached per entry, not required of the value type.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::CleanupError;

/// One-shot cleanup action attached to a single cache entry.
pub type CleanupHook<V> = Box<dyn FnOnce(&V) -> Result<(), CleanupError> + Send + Sync>;

// == Cleanup Trait ==
/// Values that know how to release their own resources.
///
/// Insert such values with [`ExpiringCache::put_cleanable`] and the reaper
/// calls `cleanup` once when the entry is evicted for being idle.
///
/// [`ExpiringCache::put_cleanable`]: crate::cache::ExpiringCache::put_cleanable
pub trait Cleanup {
    fn cleanup(&self) -> Result<(), CleanupError>;
}

impl<T: Cleanup + ?Sized> Cleanup for Arc<T> {
    fn cleanup(&self) -> Result<(), CleanupError> {
        (**self).cleanup()
    }
}

impl<T: Cleanup + ?Sized> Cleanup for Box<T> {
    fn cleanup(&self) -> Result<(), CleanupError> {
        (**self).cleanup()
    }
}

/// Builds the hook used by `put_cleanable`.
pub fn hook_for<V>() -> CleanupHook<V>
where
    V: Cleanup + 'static,
{
    Box::new(|value: &V| value.cleanup())
}

// == Run Hook ==
/// Runs a hook, turning a panic into [`CleanupError::Panicked`].
pub fn run_hook<V>(hook: CleanupHook<V>, value: &V) -> Result<(), CleanupError> {
    match catch_unwind(AssertUnwindSafe(|| hook(value))) {
        Ok(result) => result,
        Err(payload) => Err(CleanupError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
