//! # Core Playback Traits
//!
//! Abstractions the playback core owns, as opposed to the host capabilities in
//! `bridge-traits`.
//!
//! ## Decoding
//!
//! The players never stream PCM themselves; the engine plays files directly.
//! Decoding is needed for two things only:
//!
//! - opening a cached file to learn its format and length in frames
//! - reading one channel's samples for peak-amplitude normalization
//!
//! Both are blocking, CPU-bound calls. Callers run them on the blocking pool
//! (`tokio::task::spawn_blocking`) so timer callbacks and player control are
//! never held up by a full-file decode.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use core_playback::AudioFileDecoder;
//! use std::path::Path;
//!
//! fn peak(decoder: &dyn AudioFileDecoder, path: &Path) -> core_playback::Result<f32> {
//!     let samples = decoder.read_channel_samples(path, 0)?;
//!     Ok(samples.iter().fold(0.0_f32, |peak, s| peak.max(s.abs())))
//! }
//! ```

use crate::error::Result;
use bridge_traits::AudioFile;
use std::path::Path;

/// Opens local audio files and extracts decoded samples.
///
/// ## Threading Model
///
/// Implementations must be `Send + Sync`; a single decoder is shared by every
/// player in the process and called from blocking worker threads.
///
/// ## Implementation Notes
///
/// - Samples are f32 normalized to `[-1.0, 1.0]`
/// - `read_channel_samples` covers every frame of the file in a single pass
/// - A channel index beyond the file's channel count is an error
pub trait AudioFileDecoder: Send + Sync {
    /// Probe `path` and describe it as an engine-playable file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, its container is not
    /// recognized, or it has no decodable audio track.
    fn open(&self, path: &Path) -> Result<AudioFile>;

    /// Decode every frame of `path` and return the samples of one channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be decoded or `channel` does not
    /// exist.
    fn read_channel_samples(&self, path: &Path, channel: usize) -> Result<Vec<f32>>;
}
