//! # Player Configuration
//!
//! Timing and volume settings shared by every spin player of a station.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Spin player configuration.
///
/// Controls the fade ramp, the cleanup grace period after a spin ends and how
/// far ahead the station player loads upcoming spins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Length of every volume fade.
    ///
    /// Default: 1.5 seconds.
    #[serde(default = "default_fade_duration")]
    pub fade_duration: Duration,

    /// Discrete volume steps applied per second of fade.
    ///
    /// Default: 100, so a default fade is 150 steps 10ms apart.
    #[serde(default = "default_fade_steps_per_second")]
    pub fade_steps_per_second: u32,

    /// Grace period after a spin's end before the player is reset.
    ///
    /// Default: 1 second.
    #[serde(default = "default_cleanup_delay")]
    pub cleanup_delay: Duration,

    /// Volume a player starts at and returns to after `stop()`.
    ///
    /// Default: 1.0.
    #[serde(default = "default_nominal_volume")]
    pub nominal_volume: f32,

    /// How long before its airtime a spin is handed to a player.
    ///
    /// Default: 5 minutes.
    #[serde(default = "default_look_ahead")]
    pub look_ahead: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            fade_duration: default_fade_duration(),
            fade_steps_per_second: default_fade_steps_per_second(),
            cleanup_delay: default_cleanup_delay(),
            nominal_volume: default_nominal_volume(),
            look_ahead: default_look_ahead(),
        }
    }
}

impl PlayerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fade_duration(mut self, duration: Duration) -> Self {
        self.fade_duration = duration;
        self
    }

    pub fn with_fade_steps_per_second(mut self, steps: u32) -> Self {
        self.fade_steps_per_second = steps;
        self
    }

    pub fn with_cleanup_delay(mut self, delay: Duration) -> Self {
        self.cleanup_delay = delay;
        self
    }

    pub fn with_nominal_volume(mut self, volume: f32) -> Self {
        self.nominal_volume = volume;
        self
    }

    pub fn with_look_ahead(mut self, look_ahead: Duration) -> Self {
        self.look_ahead = look_ahead;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.fade_steps_per_second == 0 {
            return Err("fade_steps_per_second must be > 0".to_string());
        }

        if self.fade_duration.is_zero() {
            return Err("fade_duration must be > 0".to_string());
        }

        if !(0.0..=1.0).contains(&self.nominal_volume) {
            return Err("nominal_volume must be between 0.0 and 1.0".to_string());
        }

        Ok(())
    }

    /// Number of discrete steps in one fade. Never zero.
    pub fn fade_steps(&self) -> u32 {
        let steps = (self.fade_duration.as_secs_f64() * self.fade_steps_per_second as f64).round();
        (steps as u32).max(1)
    }

    /// Delay between two consecutive fade steps.
    pub fn fade_step_interval(&self) -> Duration {
        self.fade_duration / self.fade_steps()
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_fade_duration() -> Duration {
    Duration::from_millis(1500)
}

fn default_fade_steps_per_second() -> u32 {
    100
}

fn default_cleanup_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_nominal_volume() -> f32 {
    1.0
}

fn default_look_ahead() -> Duration {
    Duration::from_secs(300)
}
