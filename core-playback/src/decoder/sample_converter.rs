//! # Sample Format Converter
//!
//! Pulls one channel out of a decoded Symphonia buffer as f32 samples.

use crate::error::{PlaybackError, Result};
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::conv::FromSample;
use symphonia::core::sample::Sample;

/// Sample converter that normalizes audio to f32.
///
/// Symphonia outputs audio in various formats (u8 through f64), always
/// planar. Normalization only ever looks at one channel, so the converter
/// copies that plane out and converts it to f32 in `[-1.0, 1.0]`.
pub struct SampleConverter;

impl SampleConverter {
    /// Append the samples of `channel` in `buffer` to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::DecodingError`] when the buffer has fewer
    /// channels than `channel + 1`.
    pub fn append_channel(
        buffer: &AudioBufferRef<'_>,
        channel: usize,
        out: &mut Vec<f32>,
    ) -> Result<()> {
        let available = buffer.spec().channels.count();
        if channel >= available {
            return Err(PlaybackError::DecodingError(format!(
                "Channel {} requested but stream has {} channels",
                channel, available
            )));
        }

        match buffer {
            AudioBufferRef::F32(buf) => out.extend_from_slice(buf.chan(channel)),
            AudioBufferRef::F64(buf) => Self::convert_plane(&**buf, channel, out),
            AudioBufferRef::S32(buf) => Self::convert_plane(&**buf, channel, out),
            AudioBufferRef::S24(buf) => Self::convert_plane(&**buf, channel, out),
            AudioBufferRef::S16(buf) => Self::convert_plane(&**buf, channel, out),
            AudioBufferRef::S8(buf) => Self::convert_plane(&**buf, channel, out),
            AudioBufferRef::U32(buf) => Self::convert_plane(&**buf, channel, out),
            AudioBufferRef::U24(buf) => Self::convert_plane(&**buf, channel, out),
            AudioBufferRef::U16(buf) => Self::convert_plane(&**buf, channel, out),
            AudioBufferRef::U8(buf) => Self::convert_plane(&**buf, channel, out),
        }

        Ok(())
    }

    fn convert_plane<T>(buf: &AudioBuffer<T>, channel: usize, out: &mut Vec<f32>)
    where
        T: Sample,
        f32: FromSample<T>,
    {
        out.extend(buf.chan(channel).iter().map(|&sample| f32::from_sample(sample)));
    }

    /// Clamp samples to the valid range [-1.0, 1.0].
    pub fn clamp_samples(samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }
}
