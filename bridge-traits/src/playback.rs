//! Audio engine bridge traits and supporting audio types.
//!
//! The platform audio engine is a black box to the core: a shared mixer graph
//! onto which each player attaches one playable node. Nodes can play a whole
//! file or a segment of it, either immediately or at a future time expressed
//! on the engine's own sample clock. Host applications provide concrete
//! implementations; tests substitute a double that advances a virtual clock.

use crate::error::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Supported audio codec identifiers.
///
/// This enum is intentionally extensible; use [`AudioCodec::Other`] for codecs
/// not explicitly listed here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AudioCodec {
    Mp3,
    Aac,
    Flac,
    Vorbis,
    Opus,
    Wav,
    Alac,
    /// Codec is unknown or not yet mapped to a dedicated variant.
    Unknown,
    /// Vendor- or platform-specific codec.
    Other(String),
}

/// Stream metadata describing the decoded PCM format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFormat {
    /// Codec identifier associated with the source.
    pub codec: AudioCodec,
    /// Sample rate in hertz.
    pub sample_rate: u32,
    /// Number of audio channels.
    pub channels: u16,
}

impl AudioFormat {
    /// Create a new audio format description.
    pub fn new(codec: AudioCodec, sample_rate: u32, channels: u16) -> Self {
        Self {
            codec,
            sample_rate,
            channels,
        }
    }
}

/// A local audio file opened for playback.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFile {
    pub path: PathBuf,
    pub format: AudioFormat,
    /// Length of the file in sample frames.
    pub frame_count: u64,
}

impl AudioFile {
    pub fn new(path: impl Into<PathBuf>, format: AudioFormat, frame_count: u64) -> Self {
        Self {
            path: path.into(),
            format,
            frame_count,
        }
    }

    pub fn duration(&self) -> Duration {
        if self.format.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count as f64 / self.format.sample_rate as f64)
    }

    /// Frame index reached after `elapsed` of playback, clamped to the file length.
    pub fn frame_at(&self, elapsed: Duration) -> u64 {
        let frame = (elapsed.as_secs_f64() * self.format.sample_rate as f64).round() as u64;
        frame.min(self.frame_count)
    }
}

/// A point on the engine's sample clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineTime {
    pub sample_time: i64,
    pub sample_rate: f64,
}

impl EngineTime {
    pub fn new(sample_time: i64, sample_rate: f64) -> Self {
        Self {
            sample_time,
            sample_rate,
        }
    }

    /// The engine time `seconds` after this one (negative moves backwards).
    pub fn offset_by_seconds(&self, seconds: f64) -> Self {
        let frames = (seconds * self.sample_rate).round() as i64;
        Self {
            sample_time: self.sample_time + frames,
            sample_rate: self.sample_rate,
        }
    }
}

/// Shared engine/mixer graph.
///
/// One engine instance is shared by every player in the process. `start` and
/// `pause` must be safe to call when another player already started or paused
/// the engine.
pub trait AudioEngine: Send + Sync {
    /// Attach a new playable node and connect it to the main mixer.
    ///
    /// Each player calls this exactly once.
    fn attach_player(&self) -> Result<Arc<dyn PlayerNode>>;

    /// Start rendering. No-op when already running.
    fn start(&self) -> Result<()>;

    /// Pause rendering. No-op when already paused.
    fn pause(&self) -> Result<()>;

    fn is_running(&self) -> bool;
}

/// One playable node attached to the shared engine.
pub trait PlayerNode: Send + Sync {
    /// Start the node. Scheduled material plays at its scheduled time.
    fn play(&self) -> Result<()>;

    /// Stop output and drop all scheduled material.
    fn stop(&self);

    /// Current render time of the node, or `None` while the engine is not rendering.
    fn current_render_time(&self) -> Option<EngineTime>;

    /// Schedule the whole file. `None` plays as soon as possible.
    fn schedule_file(&self, file: &AudioFile, at: Option<EngineTime>) -> Result<()>;

    /// Schedule `frame_count` frames starting at `start_frame`.
    fn schedule_segment(
        &self,
        file: &AudioFile,
        start_frame: u64,
        frame_count: u64,
        at: Option<EngineTime>,
    ) -> Result<()>;

    /// Raw engine volume of this node.
    fn volume(&self) -> f32;

    fn set_volume(&self, volume: f32);
}
