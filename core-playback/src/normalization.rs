//! # Audio Normalization
//!
//! Peak-amplitude loudness normalization.
//!
//! A file's amplitude is the largest absolute sample value of its first
//! channel. Nominal volumes are divided by it before they reach the engine,
//! so quiet and loud assets play at the same perceived level; engine volumes
//! read back are multiplied by it again.

use crate::traits::AudioFileDecoder;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Volume scaling derived from a file's peak amplitude.
///
/// Without an amplitude (analysis failed, or the file is silent) both
/// conversions are the identity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Normalization {
    amplitude: Option<f32>,
}

impl Normalization {
    /// 1:1 volume mapping.
    pub fn pass_through() -> Self {
        Self { amplitude: None }
    }

    /// Normalization for a known peak amplitude.
    pub fn with_amplitude(amplitude: f32) -> Self {
        if amplitude.is_finite() && amplitude > 0.0 {
            Self {
                amplitude: Some(amplitude),
            }
        } else {
            Self::pass_through()
        }
    }

    /// Scan `samples` for their peak.
    pub fn from_samples(samples: &[f32]) -> Self {
        let peak = samples
            .iter()
            .filter(|s| s.is_finite())
            .fold(0.0_f32, |peak, s| peak.max(s.abs()));
        Self::with_amplitude(peak)
    }

    /// Decode `path` on the blocking pool and measure its peak.
    ///
    /// Never fails: decoding errors are logged and yield [`pass_through`].
    ///
    /// [`pass_through`]: Self::pass_through
    #[instrument(skip(decoder))]
    pub async fn calculate(decoder: Arc<dyn AudioFileDecoder>, path: PathBuf) -> Self {
        let analysis = tokio::task::spawn_blocking(move || {
            decoder
                .read_channel_samples(&path, 0)
                .map(|samples| Self::from_samples(&samples))
        })
        .await;

        match analysis {
            Ok(Ok(normalization)) => {
                debug!(amplitude = ?normalization.amplitude, "Normalization computed");
                normalization
            }
            Ok(Err(e)) => {
                warn!("Normalization analysis failed, using 1:1 volume: {}", e);
                Self::pass_through()
            }
            Err(e) => {
                warn!("Normalization task did not finish, using 1:1 volume: {}", e);
                Self::pass_through()
            }
        }
    }

    pub fn amplitude(&self) -> Option<f32> {
        self.amplitude
    }

    /// Engine volume for a nominal `requested` volume.
    pub fn adjusted_volume(&self, requested: f32) -> f32 {
        match self.amplitude {
            Some(amplitude) => requested / amplitude,
            None => requested,
        }
    }

    /// Nominal volume for an engine-level `adjusted` volume.
    pub fn player_volume(&self, adjusted: f32) -> f32 {
        match self.amplitude {
            Some(amplitude) => adjusted * amplitude,
            None => adjusted,
        }
    }
}
