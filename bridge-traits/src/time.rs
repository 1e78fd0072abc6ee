//! Time, Timer and Logging Abstractions
//!
//! Provides an injectable wall-clock source, schedulable deadlines and a
//! logging sink for testing and platform integration.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::Result;

/// Time source trait
///
/// Abstracts system time to enable deterministic testing.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::time::Clock;
///
/// fn log_timestamp(clock: &dyn Clock) {
///     let now = clock.now();
///     println!("Current time: {}", now);
/// }
/// ```
pub trait Clock: Send + Sync {
    /// Get current UTC time
    fn now(&self) -> DateTime<Utc>;

    /// Get current Unix timestamp in milliseconds
    fn unix_timestamp_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// System clock implementation using actual system time
#[derive(Debug, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Virtual clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock() = instant;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

// ============================================================================
// Timers
// ============================================================================

/// Work to run once a deadline is reached.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a registered deadline.
///
/// Dropping the handle does not cancel the timer; call [`TimerHandle::cancel`].
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    abort: Option<Box<dyn FnOnce() + Send>>,
}

impl TimerHandle {
    /// Create a handle around a shared cancellation flag.
    pub fn new(cancelled: Arc<AtomicBool>) -> Self {
        Self {
            cancelled,
            abort: None,
        }
    }

    /// Attach an extra action run on cancel (e.g. aborting a task).
    pub fn with_abort(mut self, abort: impl FnOnce() + Send + 'static) -> Self {
        self.abort = Some(Box::new(abort));
        self
    }

    /// Cancel the timer. Idempotent.
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(abort) = self.abort.take() {
            abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Schedulable deadline capability
///
/// Live implementations sleep until the deadline on a runtime; the
/// [`ManualTimerProvider`] runs callbacks when a test advances virtual time.
/// A callback whose handle was cancelled before its deadline must never run.
pub trait TimerProvider: Send + Sync {
    /// Run `callback` once `deadline` has passed. Past deadlines fire as soon
    /// as possible.
    fn schedule_at(&self, deadline: DateTime<Utc>, callback: TimerCallback) -> TimerHandle;
}

struct PendingTimer {
    deadline: DateTime<Utc>,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    callback: TimerCallback,
}

/// Deterministic timer provider driven by a [`ManualClock`].
pub struct ManualTimerProvider {
    clock: Arc<ManualClock>,
    pending: Mutex<Vec<PendingTimer>>,
    next_seq: AtomicU64,
}

impl ManualTimerProvider {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            pending: Mutex::new(Vec::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn clock(&self) -> Arc<ManualClock> {
        Arc::clone(&self.clock)
    }

    /// Advance virtual time by `by`, firing due timers in deadline order.
    pub fn advance(&self, by: chrono::Duration) {
        let target = self.clock.now() + by;
        self.advance_to(target);
    }

    /// Advance virtual time to `target`, firing due timers in deadline order.
    ///
    /// Timers registered by callbacks are fired in the same pass when their
    /// deadline is not after `target`. The clock reads each timer's deadline
    /// while its callback runs.
    pub fn advance_to(&self, target: DateTime<Utc>) {
        while let Some(timer) = self.pop_due(target) {
            if timer.deadline > self.clock.now() {
                self.clock.set(timer.deadline);
            }
            if !timer.cancelled.load(Ordering::SeqCst) {
                (timer.callback)();
            }
        }
        if target > self.clock.now() {
            self.clock.set(target);
        }
    }

    /// Number of registered timers that are neither fired nor cancelled.
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .iter()
            .filter(|t| !t.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Earliest live deadline, if any.
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.pending
            .lock()
            .iter()
            .filter(|t| !t.cancelled.load(Ordering::SeqCst))
            .map(|t| t.deadline)
            .min()
    }

    fn pop_due(&self, target: DateTime<Utc>) -> Option<PendingTimer> {
        let mut pending = self.pending.lock();
        pending.retain(|t| !t.cancelled.load(Ordering::SeqCst));
        let index = pending
            .iter()
            .enumerate()
            .filter(|(_, t)| t.deadline <= target)
            .min_by_key(|(_, t)| (t.deadline, t.seq))
            .map(|(index, _)| index)?;
        Some(pending.swap_remove(index))
    }
}

impl TimerProvider for ManualTimerProvider {
    fn schedule_at(&self, deadline: DateTime<Utc>, callback: TimerCallback) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.pending.lock().push(PendingTimer {
            deadline,
            seq,
            cancelled: Arc::clone(&cancelled),
            callback,
        });
        TimerHandle::new(cancelled)
    }
}

// ============================================================================
// Logging
// ============================================================================

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Structured log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Target module/component
    pub target: String,
    /// Log message
    pub message: String,
    /// Structured fields
    pub fields: HashMap<String, String>,
    /// Name of the enclosing span
    pub span_id: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: HashMap::new(),
            span_id: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_span_id(mut self, span_id: impl Into<String>) -> Self {
        self.span_id = Some(span_id.into());
        self
    }
}

/// Logger sink trait
///
/// Forwards structured logs (including reported errors) from the core to the
/// host's error-reporting pipeline.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::time::{LoggerSink, LogEntry, LogLevel};
///
/// async fn report(logger: &dyn LoggerSink, error: &str) {
///     let entry = LogEntry::new(LogLevel::Error, "core_playback", error)
///         .with_field("component", "cache");
///     logger.log(entry).await.ok();
/// }
/// ```
#[async_trait::async_trait]
pub trait LoggerSink: Send + Sync {
    /// Forward a log entry to the host logging system
    async fn log(&self, entry: LogEntry) -> Result<()>;

    /// Flush any buffered logs
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Get the minimum log level that will be processed
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

/// Console logger implementation for testing/development
#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    pub min_level: LogLevel,
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
        }
    }
}

#[async_trait::async_trait]
impl LoggerSink for ConsoleLogger {
    async fn log(&self, entry: LogEntry) -> Result<()> {
        if entry.level >= self.min_level {
            let level_str = match entry.level {
                LogLevel::Trace => "TRACE",
                LogLevel::Debug => "DEBUG",
                LogLevel::Info => "INFO",
                LogLevel::Warn => "WARN",
                LogLevel::Error => "ERROR",
            };

            println!(
                "[{}] {} {}: {}",
                entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
                level_str,
                entry.target,
                entry.message
            );

            if !entry.fields.is_empty() {
                println!("  Fields: {:?}", entry.fields);
            }
        }
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }
}
