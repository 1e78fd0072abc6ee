//! # Spin Player
//!
//! Plays one spin at its airtime on a node of the shared audio engine.
//!
//! ## Two-track start
//!
//! The engine has no "started" callback, so a scheduled start runs on two
//! independent tracks:
//!
//! - **Engine track**: the file is scheduled on the node's sample clock at
//!   `render_time + (airtime - now)`, which is sample-accurate
//! - **Timer track**: a wall-clock timer at `airtime` moves the session to
//!   `Playing` and notifies observers
//!
//! Fades and the end-of-spin cleanup are wall-clock timers too. Every timer
//! captures a weak reference to the player and the session generation it was
//! armed for; `clear` bumps the generation and cancels the handles, so a
//! stale callback can never touch a newer session.

use crate::cache::{DownloadId, DownloadManager};
use crate::config::PlayerConfig;
use crate::error::{PlaybackError, Result};
use crate::normalization::Normalization;
use crate::player::fade::FadeRamp;
use crate::player::state::PlayerState;
use crate::schedule::Spin;
use crate::traits::AudioFileDecoder;
use bridge_traits::error::BridgeError;
use bridge_traits::playback::{AudioEngine, AudioFile, PlayerNode};
use bridge_traits::time::{Clock, TimerHandle, TimerProvider};
use chrono::{DateTime, Utc};
use core_runtime::events::{CoreEvent, EventBus, PlayerEvent};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

/// Collaborators shared by every player of a station.
#[derive(Clone)]
pub struct PlayerContext {
    pub engine: Arc<dyn AudioEngine>,
    pub downloads: Arc<DownloadManager>,
    pub decoder: Arc<dyn AudioFileDecoder>,
    pub clock: Arc<dyn Clock>,
    pub timers: Arc<dyn TimerProvider>,
    pub config: PlayerConfig,
    pub event_bus: Option<Arc<EventBus>>,
}

impl PlayerContext {
    pub fn new(
        engine: Arc<dyn AudioEngine>,
        downloads: Arc<DownloadManager>,
        decoder: Arc<dyn AudioFileDecoder>,
        clock: Arc<dyn Clock>,
        timers: Arc<dyn TimerProvider>,
    ) -> Self {
        Self {
            engine,
            downloads,
            decoder,
            clock,
            timers,
            config: PlayerConfig::default(),
            event_bus: None,
        }
    }

    pub fn with_config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }
}

impl fmt::Debug for PlayerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerContext")
            .field("config", &self.config)
            .field("event_bus", &self.event_bus.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct Session {
    state: PlayerState,
    generation: u64,
    spin: Option<Spin>,
    file: Option<AudioFile>,
    normalization: Normalization,
    timers: Vec<TimerHandle>,
    fade_step: Option<TimerHandle>,
    download_id: Option<DownloadId>,
}

impl Session {
    fn cancel_timers(&mut self) {
        for mut timer in self.timers.drain(..) {
            timer.cancel();
        }
        if let Some(mut step) = self.fade_step.take() {
            step.cancel();
        }
    }
}

struct Shared {
    id: String,
    ctx: PlayerContext,
    node: Arc<dyn PlayerNode>,
    session: Mutex<Session>,
}

/// Scheduler for one spin at a time.
///
/// Cloning yields another handle to the same player.
#[derive(Clone)]
pub struct SpinPlayer {
    shared: Arc<Shared>,
}

impl SpinPlayer {
    /// Create a player and attach its node to the shared engine.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::Config`] for an invalid player configuration
    /// and [`PlaybackError::EngineError`] when the engine refuses a new node.
    pub fn new(id: impl Into<String>, ctx: PlayerContext) -> Result<Self> {
        ctx.config.validate().map_err(PlaybackError::Config)?;
        let node = ctx.engine.attach_player().map_err(engine_error)?;
        node.set_volume(ctx.config.nominal_volume);

        Ok(Self {
            shared: Arc::new(Shared {
                id: id.into(),
                ctx,
                node,
                session: Mutex::new(Session::default()),
            }),
        })
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    pub fn state(&self) -> PlayerState {
        self.shared.session.lock().state
    }

    /// The spin held by the current session.
    pub fn spin(&self) -> Option<Spin> {
        self.shared.session.lock().spin.clone()
    }

    pub fn normalization(&self) -> Normalization {
        self.shared.session.lock().normalization
    }

    /// Load `spin` and arm its start, fades and cleanup.
    ///
    /// Any previous session is cleared first. A spin already on air starts
    /// immediately from its elapsed offset. If the session is cleared while
    /// the load is in progress, the load returns `Ok(())` without touching
    /// the player again. A spin whose endtime passes before its file is
    /// ready is never scheduled; the player goes back to
    /// [`PlayerState::Available`] and the load returns `Ok(())`.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::NoAudioBlock`] for a spin without audio
    /// - Download errors from the [`DownloadManager`]
    /// - Decoder errors when the cached file cannot be opened
    /// - [`PlaybackError::EngineError`] when the node rejects the schedule
    ///
    /// On error the player is back in [`PlayerState::Available`].
    pub async fn load(&self, spin: Spin) -> Result<()> {
        self.shared.load(spin).await
    }

    /// Stop audio, drop the session and reset the volume to nominal.
    /// Idempotent.
    pub fn stop(&self) {
        self.shared.clear(None);
        self.shared
            .node
            .set_volume(self.shared.ctx.config.nominal_volume);
    }

    /// Stop audio and drop the session, leaving the volume where it is.
    ///
    /// Cancels every armed timer, including a fade ramp in progress, and any
    /// download still in flight. Idempotent.
    pub fn clear(&self) {
        self.shared.clear(None);
    }

    /// Pause the shared engine. Failures are logged.
    pub fn pause(&self) {
        if let Err(e) = self.shared.ctx.engine.pause() {
            warn!(player = %self.shared.id, "Failed to pause audio engine: {}", e);
        }
    }

    /// Restart the shared engine. Failures are logged.
    pub fn resume(&self) {
        if let Err(e) = self.shared.ctx.engine.start() {
            warn!(player = %self.shared.id, "Failed to start audio engine: {}", e);
        }
    }

    /// Nominal volume of the player.
    pub fn volume(&self) -> f32 {
        let normalization = self.shared.session.lock().normalization;
        normalization.player_volume(self.shared.node.volume())
    }

    /// Set the nominal volume; the engine receives the normalized value.
    pub fn set_volume(&self, volume: f32) {
        let normalization = self.shared.session.lock().normalization;
        self.shared
            .node
            .set_volume(normalization.adjusted_volume(volume));
    }
}

impl fmt::Debug for SpinPlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let session = self.shared.session.lock();
        f.debug_struct("SpinPlayer")
            .field("id", &self.shared.id)
            .field("state", &session.state)
            .field("spin", &session.spin.as_ref().map(|s| s.id))
            .finish()
    }
}

impl Shared {
    #[instrument(skip(self, spin), fields(player = %self.id, spin_id = spin.id))]
    async fn load(self: &Arc<Self>, spin: Spin) -> Result<()> {
        let url = spin
            .download_url()
            .ok_or(PlaybackError::NoAudioBlock(spin.id))?
            .to_string();

        self.clear(None);

        let mut events = Vec::new();
        let generation = {
            let mut session = self.session.lock();
            session.spin = Some(spin.clone());
            self.transition(&mut session, PlayerState::Loading, &mut events);
            session.generation
        };
        self.publish(events);

        let (tx, rx) = oneshot::channel();
        let started = self
            .ctx
            .downloads
            .download_file(
                &url,
                None,
                Box::new(move |result| {
                    tx.send(result).ok();
                }),
            )
            .await;
        let download_id = match started {
            Ok(id) => id,
            Err(e) => return self.fail(generation, e),
        };

        {
            let mut session = self.session.lock();
            if session.generation != generation {
                drop(session);
                self.ctx.downloads.cancel(download_id);
                return Ok(());
            }
            session.download_id = Some(download_id);
        }

        let downloaded = rx.await.unwrap_or_else(|_| {
            Err(PlaybackError::Unknown(
                "Download ended without a result".to_string(),
            ))
        });
        {
            let mut session = self.session.lock();
            if session.generation != generation {
                debug!("Session superseded while downloading");
                return Ok(());
            }
            session.download_id = None;
        }
        let path = match downloaded {
            Ok(path) => path,
            Err(e) => return self.fail(generation, e),
        };

        let decoder = Arc::clone(&self.ctx.decoder);
        let open_path = path.clone();
        let opened = tokio::task::spawn_blocking(move || decoder.open(&open_path))
            .await
            .unwrap_or_else(|e| Err(PlaybackError::Unknown(format!("Decoder task failed: {}", e))));
        let file = match opened {
            Ok(file) => file,
            Err(e) => return self.fail(generation, e),
        };

        let normalization = Normalization::calculate(Arc::clone(&self.ctx.decoder), path).await;

        self.arm(generation, &spin, file, normalization)
    }

    /// Bind the opened file and arm every timer of the session.
    fn arm(
        self: &Arc<Self>,
        generation: u64,
        spin: &Spin,
        file: AudioFile,
        normalization: Normalization,
    ) -> Result<()> {
        let mut events = Vec::new();
        let armed = {
            let mut session = self.session.lock();
            if session.generation != generation {
                debug!("Session superseded while decoding");
                return Ok(());
            }
            if self.ctx.clock.now() > spin.endtime() {
                drop(session);
                info!(
                    player = %self.id,
                    spin_id = spin.id,
                    endtime = %spin.endtime(),
                    "Spin ended before it was ready, releasing player"
                );
                self.clear(Some(generation));
                return Ok(());
            }
            session.normalization = normalization;
            session.file = Some(file.clone());
            self.arm_locked(&mut session, generation, spin, &file, &mut events)
        };
        self.publish(events);

        match armed {
            Ok(()) => Ok(()),
            Err(e) => self.fail(generation, e),
        }
    }

    fn arm_locked(
        self: &Arc<Self>,
        session: &mut Session,
        generation: u64,
        spin: &Spin,
        file: &AudioFile,
        events: &mut Vec<PlayerEvent>,
    ) -> Result<()> {
        let config = &self.ctx.config;
        let block = spin
            .audio_block
            .as_ref()
            .ok_or(PlaybackError::NoAudioBlock(spin.id))?;
        let now = self.ctx.clock.now();

        if let Err(e) = self.ctx.engine.start() {
            warn!("Failed to start audio engine: {}", e);
        }
        self.node
            .set_volume(session.normalization.adjusted_volume(config.nominal_volume));

        let on_air = spin.is_playing(now);
        if on_air {
            let elapsed = (now - spin.airtime).to_std().unwrap_or_default();
            let start_frame = file.frame_at(elapsed);
            self.node
                .schedule_segment(file, start_frame, file.frame_count - start_frame, None)
                .map_err(engine_error)?;
            self.node.play().map_err(engine_error)?;
            info!(start_frame, "Joined spin mid-play");
        } else {
            let lead = seconds_between(now, spin.airtime);
            let start_at = self
                .node
                .current_render_time()
                .map(|render_time| render_time.offset_by_seconds(lead));

            match start_at {
                Some(at) => {
                    self.node
                        .schedule_file(file, Some(at))
                        .map_err(engine_error)?;
                    self.node.play().map_err(engine_error)?;
                    debug!(sample_time = at.sample_time, lead, "Scheduled start on engine clock");
                }
                None => {
                    warn!("Engine not rendering, spin will start from the airtime timer");
                }
            }

            let deferred = start_at.is_none();
            session.timers.push(self.schedule(spin.airtime, move |shared| {
                shared.on_airtime(generation, deferred)
            }));
        }

        for fade in &block.fades {
            let fade_at = spin.fade_time(fade);
            if fade_at < now {
                debug!(at_ms = fade.at_ms, "Skipping fade already in the past");
                continue;
            }
            let to_volume = fade.to_volume;
            session.timers.push(self.schedule(fade_at, move |shared| {
                shared.on_fade(generation, to_volume)
            }));
        }

        let cleanup_at = spin.endtime() + to_chrono(config.cleanup_delay);
        session.timers.push(
            self.schedule(cleanup_at, move |shared| shared.clear(Some(generation))),
        );

        if on_air {
            self.transition(session, PlayerState::Playing, events);
            events.push(PlayerEvent::SpinStarted {
                player_id: self.id.clone(),
                spin_id: spin.id,
            });
        } else {
            self.transition(session, PlayerState::Loaded, events);
        }
        info!(
            airtime = %spin.airtime,
            fades = block.fades.len(),
            cleanup_at = %cleanup_at,
            "Spin armed"
        );
        Ok(())
    }

    // ========================================================================
    // Timer callbacks
    // ========================================================================

    fn on_airtime(&self, generation: u64, deferred: bool) {
        let mut events = Vec::new();
        {
            let mut session = self.session.lock();
            if session.generation != generation {
                return;
            }

            if deferred {
                if let Some(file) = &session.file {
                    let started = self
                        .node
                        .schedule_file(file, None)
                        .and_then(|_| self.node.play());
                    if let Err(e) = started {
                        warn!(player = %self.id, "Failed to start spin at airtime: {}", e);
                    }
                }
            }

            self.transition(&mut session, PlayerState::Playing, &mut events);
            if let Some(spin) = &session.spin {
                info!(player = %self.id, spin_id = spin.id, "Spin on air");
                events.push(PlayerEvent::SpinStarted {
                    player_id: self.id.clone(),
                    spin_id: spin.id,
                });
            }
        }
        self.publish(events);
    }

    fn on_fade(self: &Arc<Self>, generation: u64, to_volume: f32) {
        let mut events = Vec::new();
        {
            let mut session = self.session.lock();
            if session.generation != generation {
                return;
            }
            if let Some(mut previous) = session.fade_step.take() {
                previous.cancel();
            }

            let from = session.normalization.player_volume(self.node.volume());
            let ramp = FadeRamp::new(from, to_volume, self.ctx.config.fade_steps());
            let started_at = self.ctx.clock.now();
            debug!(player = %self.id, from, to_volume, steps = ramp.steps, "Fade started");

            session.fade_step = Some(self.schedule_fade_step(generation, ramp, started_at, 1));
            if let Some(spin) = &session.spin {
                events.push(PlayerEvent::FadeStarted {
                    player_id: self.id.clone(),
                    spin_id: spin.id,
                    to_volume_milli: (to_volume * 1000.0).round() as i32,
                });
            }
        }
        self.publish(events);
    }

    fn on_fade_step(
        self: &Arc<Self>,
        generation: u64,
        ramp: FadeRamp,
        started_at: DateTime<Utc>,
        step: u32,
    ) {
        let mut session = self.session.lock();
        if session.generation != generation {
            return;
        }

        let volume = ramp.volume_at(step);
        self.node
            .set_volume(session.normalization.adjusted_volume(volume));

        session.fade_step = if ramp.is_last(step) {
            None
        } else {
            Some(self.schedule_fade_step(generation, ramp, started_at, step + 1))
        };
    }

    fn schedule_fade_step(
        self: &Arc<Self>,
        generation: u64,
        ramp: FadeRamp,
        started_at: DateTime<Utc>,
        step: u32,
    ) -> TimerHandle {
        let deadline = started_at + to_chrono(self.ctx.config.fade_step_interval() * step);
        self.schedule(deadline, move |shared| {
            shared.on_fade_step(generation, ramp, started_at, step)
        })
    }

    /// Register `action` at `deadline`, bound weakly to this player.
    fn schedule<F>(self: &Arc<Self>, deadline: DateTime<Utc>, action: F) -> TimerHandle
    where
        F: FnOnce(&Arc<Shared>) + Send + 'static,
    {
        let player: Weak<Shared> = Arc::downgrade(self);
        self.ctx.timers.schedule_at(
            deadline,
            Box::new(move || {
                if let Some(shared) = player.upgrade() {
                    action(&shared);
                }
            }),
        )
    }

    // ========================================================================
    // Session bookkeeping
    // ========================================================================

    /// End the session. With `only`, a session of another generation is left
    /// untouched.
    fn clear(&self, only: Option<u64>) {
        let mut events = Vec::new();
        let download = {
            let mut session = self.session.lock();
            if only.is_some_and(|generation| generation != session.generation) {
                return;
            }

            session.generation += 1;
            session.cancel_timers();
            session.file = None;
            session.normalization = Normalization::pass_through();
            if let Some(spin) = session.spin.take() {
                debug!(player = %self.id, spin_id = spin.id, "Clearing spin");
                events.push(PlayerEvent::SpinCleared {
                    player_id: self.id.clone(),
                    spin_id: spin.id,
                });
            }
            self.transition(&mut session, PlayerState::Available, &mut events);
            session.download_id.take()
        };

        self.node.stop();
        if let Some(id) = download {
            self.ctx.downloads.cancel(id);
        }
        self.publish(events);
    }

    /// Report a load failure and reset, unless the session already moved on.
    fn fail(&self, generation: u64, error: PlaybackError) -> Result<()> {
        if self.session.lock().generation != generation {
            debug!("Ignoring failure of superseded session: {}", error);
            return Ok(());
        }

        warn!(player = %self.id, "Failed to load spin: {}", error);
        self.publish(vec![PlayerEvent::Error {
            player_id: self.id.clone(),
            message: error.to_string(),
        }]);
        self.clear(Some(generation));
        Err(error)
    }

    fn transition(&self, session: &mut Session, state: PlayerState, events: &mut Vec<PlayerEvent>) {
        if session.state == state {
            return;
        }
        debug!(player = %self.id, from = %session.state, to = %state, "Player state changed");
        session.state = state;
        events.push(PlayerEvent::StateChanged {
            player_id: self.id.clone(),
            state: state.to_string(),
        });
    }

    fn publish(&self, events: Vec<PlayerEvent>) {
        if let Some(bus) = &self.ctx.event_bus {
            for event in events {
                bus.emit(CoreEvent::Player(event)).ok();
            }
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.session.get_mut().cancel_timers();
    }
}

fn engine_error(error: BridgeError) -> PlaybackError {
    PlaybackError::EngineError(error.to_string())
}

fn to_chrono(duration: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero())
}

/// Signed seconds from `from` to `to`.
fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from)
        .num_microseconds()
        .map(|us| us as f64 / 1_000_000.0)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    #[test]
    fn test_seconds_between() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(seconds_between(start, start + chrono::Duration::milliseconds(10_500)), 10.5);
        assert_eq!(seconds_between(start + chrono::Duration::seconds(2), start), -2.0);
    }

    #[test]
    fn test_to_chrono() {
        assert_eq!(to_chrono(Duration::from_millis(1500)), chrono::Duration::milliseconds(1500));
    }
}
