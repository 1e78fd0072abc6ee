//! # Symphonia Decoder Implementation
//!
//! File decoder for cached audio using the Symphonia library.

use crate::decoder::format_detector::FormatDetector;
use crate::decoder::sample_converter::SampleConverter;
use crate::error::{PlaybackError, Result};
use crate::traits::AudioFileDecoder;
use bridge_traits::{AudioFile, AudioFormat};
use std::path::Path;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use tracing::{debug, error, instrument, warn};

/// Packets that may fail in a row before a file is declared corrupt.
const MAX_CONSECUTIVE_ERRORS: usize = 10;

/// Symphonia-backed [`AudioFileDecoder`].
///
/// Stateless: every call opens the file afresh, so one instance can be shared
/// by all players and used from several blocking threads at once.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaFileDecoder;

impl SymphoniaFileDecoder {
    pub fn new() -> Self {
        Self
    }
}

/// One open file: demuxer, codec decoder and the selected track.
struct DecodeSession {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    format: AudioFormat,
    n_frames: Option<u64>,
}

impl DecodeSession {
    fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            error!("Failed to open file {:?}: {}", path, e);
            if e.kind() == std::io::ErrorKind::NotFound {
                PlaybackError::FileNotFound(path.to_path_buf())
            } else {
                PlaybackError::DecodingError(format!("Failed to open file: {}", e))
            }
        })?;

        let hint = FormatDetector::hint_from_path(path);
        let media_source = Box::new(file) as Box<dyn MediaSource>;
        let mss = MediaSourceStream::new(media_source, Default::default());

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| {
                error!("Format probe failed: {}", e);
                PlaybackError::InvalidFormat(format!("Failed to probe format: {}", e))
            })?;

        let format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                PlaybackError::InvalidFormat("No supported audio tracks".to_string())
            })?;

        let codec = FormatDetector::detect_codec(track.codec_params.codec);
        FormatDetector::validate_codec_support(&codec)?;

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| PlaybackError::InvalidFormat("Missing sample rate".to_string()))?;

        // AAC in MP4 may only reveal its channel layout after the first packet
        let channels = track
            .codec_params
            .channels
            .map(|ch| ch.count() as u16)
            .unwrap_or(2);

        let track_id = track.id;
        let n_frames = track.codec_params.n_frames;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| {
                PlaybackError::UnsupportedCodec(format!("Failed to create codec decoder: {}", e))
            })?;

        debug!(
            ?codec,
            sample_rate, channels, ?n_frames, "Opened audio file for decoding"
        );

        Ok(Self {
            format_reader,
            decoder,
            track_id,
            format: AudioFormat::new(codec, sample_rate, channels),
            n_frames,
        })
    }

    /// Decode the whole file, handing each decoded buffer to `visit`.
    ///
    /// Corrupt packets are skipped until [`MAX_CONSECUTIVE_ERRORS`] fail in a
    /// row. Returns the number of frames decoded.
    fn decode_all<F>(&mut self, mut visit: F) -> Result<u64>
    where
        F: FnMut(&symphonia::core::audio::AudioBufferRef<'_>) -> Result<()>,
    {
        let mut frames = 0u64;
        let mut consecutive_errors = 0;

        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(frames);
                }
                Err(SymphoniaError::ResetRequired) => {
                    return Err(PlaybackError::DecodingError(
                        "Track list changed, reset required".to_string(),
                    ));
                }
                Err(e) => {
                    return Err(PlaybackError::DecodingError(format!(
                        "Failed to read packet: {}",
                        e
                    )));
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    consecutive_errors = 0;
                    frames += decoded.frames() as u64;
                    self.format.channels = decoded.spec().channels.count() as u16;
                    visit(&decoded)?;
                }
                Err(e @ SymphoniaError::DecodeError(_)) | Err(e @ SymphoniaError::IoError(_)) => {
                    consecutive_errors += 1;
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        error!("Too many consecutive decode errors, giving up");
                        return Err(PlaybackError::DecodingError(format!(
                            "Too many consecutive decode errors: {}",
                            e
                        )));
                    }
                    warn!(
                        "Skipping corrupt packet ({}/{}): {}",
                        consecutive_errors, MAX_CONSECUTIVE_ERRORS, e
                    );
                }
                Err(e) => {
                    return Err(PlaybackError::DecodingError(format!(
                        "Failed to decode packet: {}",
                        e
                    )));
                }
            }
        }
    }
}

impl AudioFileDecoder for SymphoniaFileDecoder {
    #[instrument(skip(self), fields(path = ?path))]
    fn open(&self, path: &Path) -> Result<AudioFile> {
        let mut session = DecodeSession::open(path)?;

        let frame_count = match session.n_frames {
            Some(frames) => frames,
            None => {
                // Containers without a frame count: count by decoding
                debug!("Frame count missing from container, decoding to count");
                session.decode_all(|_| Ok(()))?
            }
        };

        Ok(AudioFile::new(path, session.format.clone(), frame_count))
    }

    #[instrument(skip(self), fields(path = ?path, channel))]
    fn read_channel_samples(&self, path: &Path, channel: usize) -> Result<Vec<f32>> {
        let mut session = DecodeSession::open(path)?;
        let mut samples = Vec::with_capacity(session.n_frames.unwrap_or(0) as usize);

        session.decode_all(|buffer| SampleConverter::append_channel(buffer, channel, &mut samples))?;
        SampleConverter::clamp_samples(&mut samples);

        debug!(samples = samples.len(), "Read channel samples");
        Ok(samples)
    }
}
