//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! This crate provides implementations of the bridge traits using
//! desktop-appropriate libraries:
//! - `HttpClient` using `reqwest` with `Range`-based resume
//! - `FileSystemAccess` using `tokio::fs`, with `fs2` for free-space queries
//! - `TimerProvider` using Tokio sleeps with abortable tasks
//!
//! The audio engine is not provided here; hosts inject their own.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, TokioFileSystem, TokioTimerProvider};
//!
//! #[tokio::main]
//! async fn main() {
//!     let http_client = ReqwestHttpClient::new();
//!     let fs = TokioFileSystem::new();
//!     let timers = TokioTimerProvider::new();
//!
//!     // Use in core configuration
//! }
//! ```

mod filesystem;
mod http;
mod timer;

pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
pub use timer::TokioTimerProvider;
