//! # Audio Decoder Module
//!
//! File-level decoding using the Symphonia library.
//!
//! ## Overview
//!
//! `SymphoniaFileDecoder` implements [`AudioFileDecoder`](crate::AudioFileDecoder)
//! over every format the `symphonia/all` bundle enables (MP3, AAC, FLAC, Vorbis,
//! Opus, WAV, ALAC). Players use it to open a cached file into an engine-ready
//! [`AudioFile`](bridge_traits::AudioFile) and to extract one channel for
//! normalization.
//!
//! ```text
//! File → MediaSourceStream → FormatReader → Decoder → one channel of f32
//! ```
//!
//! Builds without the `decoder` feature must supply their own decoder through
//! the player configuration.

#[cfg(feature = "decoder")]
mod format_detector;

#[cfg(feature = "decoder")]
mod sample_converter;

#[cfg(feature = "decoder")]
mod symphonia;

#[cfg(feature = "decoder")]
pub use self::symphonia::SymphoniaFileDecoder;

#[cfg(feature = "decoder")]
pub use format_detector::FormatDetector;

#[cfg(feature = "decoder")]
pub use sample_converter::SampleConverter;
