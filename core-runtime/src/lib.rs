//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the playback crates:
//! - Logging and tracing bootstrap with host `LoggerSink` forwarding
//! - `CoreConfig` holding the injected host bridges
//! - Event bus for download and player notifications
//!
//! ## Overview
//!
//! Nothing in here knows about spins or caches. The crate establishes the
//! logging conventions, the fail-fast configuration of host capabilities and
//! the broadcast channel that `core-playback` publishes to.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
