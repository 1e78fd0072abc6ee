//! Probe hints and codec mapping for cached files.

use crate::error::{PlaybackError, Result};
use bridge_traits::AudioCodec;
use std::path::Path;
use symphonia::core::codecs::*;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Every PCM layout a WAV/AIFF container can carry.
const PCM_CODECS: &[CodecType] = &[
    CODEC_TYPE_PCM_U8,
    CODEC_TYPE_PCM_S16LE,
    CODEC_TYPE_PCM_S16BE,
    CODEC_TYPE_PCM_S24LE,
    CODEC_TYPE_PCM_S24BE,
    CODEC_TYPE_PCM_S32LE,
    CODEC_TYPE_PCM_S32BE,
    CODEC_TYPE_PCM_F32LE,
    CODEC_TYPE_PCM_F32BE,
    CODEC_TYPE_PCM_F64LE,
    CODEC_TYPE_PCM_F64BE,
];

pub struct FormatDetector;

impl FormatDetector {
    /// Probe hint from the cached file's extension.
    ///
    /// Cache entries are named after the URL's last segment, so the
    /// extension is whatever the CDN served.
    pub fn hint_from_path(path: &Path) -> Hint {
        let mut hint = Hint::new();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(extension) => {
                hint.with_extension(extension);
            }
            None => debug!(file = ?path.file_name(), "No extension, probing blind"),
        }
        hint
    }

    pub fn detect_codec(codec_type: CodecType) -> AudioCodec {
        match codec_type {
            CODEC_TYPE_MP3 => AudioCodec::Mp3,
            CODEC_TYPE_AAC => AudioCodec::Aac,
            CODEC_TYPE_FLAC => AudioCodec::Flac,
            CODEC_TYPE_VORBIS => AudioCodec::Vorbis,
            CODEC_TYPE_OPUS => AudioCodec::Opus,
            CODEC_TYPE_ALAC => AudioCodec::Alac,
            pcm if PCM_CODECS.contains(&pcm) => AudioCodec::Wav,
            other => {
                warn!("Unrecognized codec {:?}", other);
                AudioCodec::Unknown
            }
        }
    }

    /// Fail early on codecs the decoder cannot handle.
    pub fn validate_codec_support(codec: &AudioCodec) -> Result<()> {
        match codec {
            AudioCodec::Unknown => Err(PlaybackError::UnsupportedCodec("unknown".to_string())),
            AudioCodec::Other(name) => Err(PlaybackError::UnsupportedCodec(name.clone())),
            _ => Ok(()),
        }
    }
}
