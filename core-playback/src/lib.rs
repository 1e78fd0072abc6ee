//! # Scheduled Playback Core
//!
//! Downloads audio assets, caches them under a size ceiling and plays them
//! at their scheduled airtime on a shared audio engine.
//!
//! ## Overview
//!
//! This crate handles:
//! - The on-disk audio cache and its pruning policy ([`cache`])
//! - Resumable downloads tracked by a process-wide [`DownloadManager`]
//! - File decoding with symphonia (optional, feature-gated) for loudness
//!   normalization
//! - The spin/schedule data model ([`schedule`])
//! - Spin players that bind airtime to the engine's sample clock, with fades
//!   and cleanup timers ([`player`])
//! - A station player that drives a pool of spin players from a schedule
//!
//! ```text
//! Schedule ─► StationPlayer ─► SpinPlayer ─► DownloadManager ─► CacheDirectory
//!                                  │                │
//!                                  │                └──► FileDownloader
//!                                  └──► AudioEngine / TimerProvider
//! ```

pub mod cache;
pub mod config;
pub mod decoder;
pub mod error;
pub mod normalization;
pub mod player;
pub mod schedule;
pub mod station;
pub mod traits;

pub use cache::{
    CacheConfig, CacheDirectory, CacheEntry, DownloadId, DownloadManager, DownloadState,
    FileDownloader, PruneReport,
};
pub use config::PlayerConfig;
pub use error::{PlaybackError, Result};
pub use normalization::Normalization;
pub use player::{FadeRamp, PlayerContext, PlayerState, SpinPlayer};
pub use schedule::{AudioBlock, Fade, Schedule, Spin};
pub use station::StationPlayer;
pub use traits::AudioFileDecoder;

#[cfg(feature = "decoder")]
pub use decoder::SymphoniaFileDecoder;
