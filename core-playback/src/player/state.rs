//! Spin player session states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Session state of a [`SpinPlayer`](super::SpinPlayer).
///
/// ```text
/// Available ──load──► Loading ──armed──► Loaded ──airtime──► Playing
///     ▲                  │                  │                   │
///     └──────────────────┴──── clear / stop / cleanup ──────────┘
/// ```
///
/// A spin joined mid-play goes from `Loading` straight to `Playing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    /// No spin; ready for `load`.
    Available,
    /// Downloading and analysing the spin's audio.
    Loading,
    /// Start, fades and cleanup are armed; waiting for airtime.
    Loaded,
    Playing,
}

impl PlayerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerState::Available => "available",
            PlayerState::Loading => "loading",
            PlayerState::Loaded => "loaded",
            PlayerState::Playing => "playing",
        }
    }

    /// Whether the player holds a spin.
    pub fn is_busy(&self) -> bool {
        !matches!(self, PlayerState::Available)
    }
}

impl Default for PlayerState {
    fn default() -> Self {
        PlayerState::Available
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
