//! Lifecycle Module
//!
//! Tracks whether background eviction is still allowed to run.

use std::fmt;

use parking_lot::Mutex;
use tokio::sync::Notify;

// == Lifecycle State ==
/// Background eviction state of a cache.
///
/// Data operations work in every state; only the reaper is affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Reaper sweeps on schedule
    Running,
    /// Shutdown requested while a reaper sweep was in flight
    ShuttingDown,
    /// No further reaper sweeps will start
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Running => "running",
            LifecycleState::ShuttingDown => "shutting down",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct Inner {
    state: LifecycleState,
    sweeping: bool,
}

// == Lifecycle ==
/// Shared between the cache handle and its reaper task.
#[derive(Debug)]
pub struct Lifecycle {
    inner: Mutex<Inner>,
    wake: Notify,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: LifecycleState::Running,
                sweeping: false,
            }),
            wake: Notify::new(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.lock().state
    }

    // == Begin Sweep ==
    /// Called by the reaper before a scheduled sweep.
    ///
    /// Returns false once shutdown has been requested; the reaper must exit.
    pub fn begin_sweep(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != LifecycleState::Running {
            return false;
        }
        inner.sweeping = true;
        true
    }

    // == End Sweep ==
    /// Called by the reaper after a sweep completes.
    ///
    /// Completes a pending shutdown and returns whether the reaper should
    /// keep going.
    pub fn end_sweep(&self) -> bool {
        let mut inner = self.inner.lock();
        inner.sweeping = false;
        match inner.state {
            LifecycleState::Running => true,
            LifecycleState::ShuttingDown | LifecycleState::Stopped => {
                inner.state = LifecycleState::Stopped;
                false
            }
        }
    }

    // == Shutdown ==
    /// Requests that no further sweeps start.
    ///
    /// Never blocks on an in-flight sweep. Returns true only for the call
    /// that moved the state out of `Running`.
    pub fn shutdown(&self) -> bool {
        let initiated = {
            let mut inner = self.inner.lock();
            if inner.state != LifecycleState::Running {
                false
            } else {
                inner.state = if inner.sweeping {
                    LifecycleState::ShuttingDown
                } else {
                    LifecycleState::Stopped
                };
                true
            }
        };
        if initiated {
            // notify_one keeps a permit if the reaper is not parked yet
            self.wake.notify_one();
        }
        initiated
    }

    /// Completes when `shutdown` has been called.
    pub async fn wait_for_shutdown(&self) {
        self.wake.notified().await;
    }

    /// Marks the lifecycle stopped when the reaper exits for any reason.
    pub fn mark_stopped(&self) {
        let mut inner = self.inner.lock();
        inner.sweeping = false;
        inner.state = LifecycleState::Stopped;
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
