//! # Schedule Model
//!
//! Spins, their audio blocks and a station's ordered schedule.
//!
//! All types are plain immutable values deserialized from the station API.
//! A schedule is replaced wholesale on refresh, never edited in place.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A scheduled volume ramp, anchored to an offset from the spin's airtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fade {
    /// Milliseconds after airtime at which the ramp begins.
    #[serde(rename = "atMS")]
    pub at_ms: i64,
    /// Nominal volume the ramp ends at.
    pub to_volume: f32,
}

impl Fade {
    pub fn new(at_ms: i64, to_volume: f32) -> Self {
        Self { at_ms, to_volume }
    }
}

/// Static metadata describing a playable asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioBlock {
    pub id: i64,
    pub title: Option<String>,
    pub download_url: String,
    /// Full length of the asset.
    #[serde(rename = "durationMS")]
    pub duration_ms: i64,
    /// Offset from airtime at which the next spin takes over.
    #[serde(rename = "endOfMessageMS")]
    pub end_of_message_ms: i64,
    #[serde(default)]
    pub fades: Vec<Fade>,
}

impl AudioBlock {
    pub fn new(id: i64, download_url: impl Into<String>, duration_ms: i64) -> Self {
        Self {
            id,
            title: None,
            download_url: download_url.into(),
            duration_ms,
            end_of_message_ms: duration_ms,
            fades: Vec::new(),
        }
    }

    pub fn with_end_of_message(mut self, end_of_message_ms: i64) -> Self {
        self.end_of_message_ms = end_of_message_ms;
        self
    }

    pub fn with_fade(mut self, fade: Fade) -> Self {
        self.fades.push(fade);
        self
    }
}

/// One scheduled play event at a station.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spin {
    pub id: i64,
    pub station_id: i64,
    pub airtime: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub audio_block: Option<AudioBlock>,
}

impl Spin {
    pub fn new(id: i64, station_id: i64, airtime: DateTime<Utc>, audio_block: AudioBlock) -> Self {
        Self {
            id,
            station_id,
            airtime,
            created_at: airtime,
            updated_at: airtime,
            audio_block: Some(audio_block),
        }
    }

    /// Airtime plus the audio block's end-of-message offset.
    ///
    /// A spin without an audio block ends at its airtime.
    pub fn endtime(&self) -> DateTime<Utc> {
        let offset = self
            .audio_block
            .as_ref()
            .map(|block| block.end_of_message_ms)
            .unwrap_or(0);
        self.airtime + Duration::milliseconds(offset)
    }

    /// Whether `now` falls within `[airtime, endtime]`.
    pub fn is_playing(&self, now: DateTime<Utc>) -> bool {
        self.airtime <= now && now <= self.endtime()
    }

    /// Wall-clock instant of a fade's start.
    pub fn fade_time(&self, fade: &Fade) -> DateTime<Utc> {
        self.airtime + Duration::milliseconds(fade.at_ms)
    }

    pub fn download_url(&self) -> Option<&str> {
        self.audio_block.as_ref().map(|b| b.download_url.as_str())
    }
}

impl PartialEq for Spin {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.audio_block.as_ref().map(|b| b.id) == other.audio_block.as_ref().map(|b| b.id)
            && self.airtime == other.airtime
    }
}

/// A station's spins ordered by airtime.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub station_id: i64,
    spins: Vec<Spin>,
}

impl Schedule {
    /// Build a schedule, ordering `spins` by airtime. Equal airtimes keep
    /// their given order.
    pub fn new(station_id: i64, mut spins: Vec<Spin>) -> Self {
        spins.sort_by_key(|spin| spin.airtime);
        Self { station_id, spins }
    }

    pub fn spins(&self) -> &[Spin] {
        &self.spins
    }

    pub fn is_empty(&self) -> bool {
        self.spins.is_empty()
    }

    pub fn len(&self) -> usize {
        self.spins.len()
    }

    /// Spins that have not ended by `now`, in schedule order.
    pub fn current(&self, now: DateTime<Utc>) -> Vec<&Spin> {
        self.spins
            .iter()
            .filter(|spin| spin.endtime() >= now)
            .collect()
    }
}
