//! Timer Provider Implementation using Tokio

use bridge_traits::time::{TimerCallback, TimerHandle, TimerProvider};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::trace;

/// Tokio-based timer provider
///
/// Each deadline is a spawned task that sleeps until the deadline and then
/// runs its callback. Cancelling the handle aborts the task. Outside a Tokio
/// runtime the provider falls back to a sleeping OS thread.
#[derive(Clone)]
pub struct TokioTimerProvider {
    handle: Option<Handle>,
}

impl TokioTimerProvider {
    /// Create a provider bound to the current Tokio runtime, if any
    pub fn new() -> Self {
        Self {
            handle: Handle::try_current().ok(),
        }
    }

    /// Create a provider bound to an explicit runtime
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    fn delay_until(deadline: DateTime<Utc>) -> Duration {
        (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }
}

impl Default for TokioTimerProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerProvider for TokioTimerProvider {
    fn schedule_at(&self, deadline: DateTime<Utc>, callback: TimerCallback) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let delay = Self::delay_until(deadline);
        trace!(deadline = %deadline, delay_ms = delay.as_millis() as u64, "Scheduling timer");

        match &self.handle {
            Some(handle) => {
                let task = handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if !flag.load(Ordering::SeqCst) {
                        callback();
                    }
                });
                TimerHandle::new(cancelled).with_abort(move || task.abort())
            }
            None => {
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    if !flag.load(Ordering::SeqCst) {
                        callback();
                    }
                });
                TimerHandle::new(cancelled)
            }
        }
    }
}
