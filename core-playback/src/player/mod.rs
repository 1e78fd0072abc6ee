//! # Spin Players
//!
//! Scheduling of individual spins against the shared audio engine.
//!
//! - [`SpinPlayer`]: one spin at a time, from download to cleanup
//! - [`PlayerState`]: the session state machine
//! - [`FadeRamp`]: the stepped linear volume ramp used by fades

pub mod fade;
pub mod spin_player;
pub mod state;

pub use fade::FadeRamp;
pub use spin_player::{PlayerContext, SpinPlayer};
pub use state::PlayerState;
