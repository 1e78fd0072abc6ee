//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the scheduled-playback core and
//! platform-specific implementations. Each trait represents a capability that
//! the core requires but that must be implemented differently per platform.
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Resumable single-file downloads
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Directory listing, moves, deletes, free space
//!
//! ### Audio
//! - [`AudioEngine`](playback::AudioEngine) - Shared engine/mixer graph
//! - [`PlayerNode`](playback::PlayerNode) - Per-player node with sample-accurate scheduling
//!
//! ### Time & Logging
//! - [`Clock`](time::Clock) - Wall-clock source for deterministic testing
//! - [`TimerProvider`](time::TimerProvider) - Schedulable deadlines with cancellable handles
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Filesystem, HTTP, timers |
//! | Engine   | host-provided       | 📋 Injected by the composition root |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert platform-specific errors to `BridgeError` and
//! keep the path or URL involved in the message.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so that a single instance can
//! be shared by the download manager, the players and timer callbacks.
//!
//! ## Testing
//!
//! [`ManualClock`](time::ManualClock) and
//! [`ManualTimerProvider`](time::ManualTimerProvider) replace the live time
//! sources in tests: callbacks run only when the test advances virtual time.

pub mod error;
pub mod http;
pub mod playback;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{DownloadOutcome, DownloadRequest, HttpClient, ProgressCallback};
pub use playback::{AudioCodec, AudioEngine, AudioFile, AudioFormat, EngineTime, PlayerNode};
pub use storage::{FileMetadata, FileSystemAccess};
pub use time::{
    Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, ManualTimerProvider,
    SystemClock, TimerCallback, TimerHandle, TimerProvider,
};
