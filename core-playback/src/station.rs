//! # Station Player
//!
//! Drives a fixed pool of [`SpinPlayer`]s from a station [`Schedule`].
//!
//! Each refresh hands every current spin whose airtime falls within the
//! look-ahead window to a free player, in schedule order. A spin that a
//! player already holds, or is loading, is never handed out twice. After each
//! refresh the station arms one wake-up timer for the next moment something
//! can change: a held or loading spin reaching its cleanup, or the next spin
//! entering the look-ahead window.

use crate::error::{PlaybackError, Result};
use crate::player::{PlayerContext, PlayerState, SpinPlayer};
use crate::schedule::{Schedule, Spin};
use bridge_traits::time::TimerHandle;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tracing::{debug, info, instrument, warn};

/// Shortest delay between two station wake-ups.
const MIN_WAKE_INTERVAL_MS: i64 = 250;

#[derive(Default)]
struct StationState {
    schedule: Option<Schedule>,
    /// Player index → spin whose load task is still running.
    loading: HashMap<usize, Spin>,
    wake: Option<TimerHandle>,
}

struct StationShared {
    ctx: PlayerContext,
    players: Vec<SpinPlayer>,
    state: Mutex<StationState>,
    runtime: Option<Handle>,
}

/// A station's pool of spin players.
#[derive(Clone)]
pub struct StationPlayer {
    shared: Arc<StationShared>,
}

impl StationPlayer {
    /// Create `pool_size` players named `player-0`, `player-1`, ...
    ///
    /// Must be created inside a tokio runtime for loads to run.
    pub fn new(ctx: PlayerContext, pool_size: usize) -> Result<Self> {
        if pool_size == 0 {
            return Err(PlaybackError::Config(
                "player pool needs at least one player".to_string(),
            ));
        }

        let players = (0..pool_size)
            .map(|index| SpinPlayer::new(format!("player-{}", index), ctx.clone()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            shared: Arc::new(StationShared {
                ctx,
                players,
                state: Mutex::new(StationState::default()),
                runtime: Handle::try_current().ok(),
            }),
        })
    }

    pub fn players(&self) -> &[SpinPlayer] {
        &self.shared.players
    }

    pub fn schedule(&self) -> Option<Schedule> {
        self.shared.state.lock().schedule.clone()
    }

    /// Replace the schedule and refresh.
    ///
    /// Players holding a spin that is not on air and no longer scheduled are
    /// cleared. Returns the number of loads started.
    #[instrument(skip(self, schedule), fields(station_id = schedule.station_id, spins = schedule.len()))]
    pub fn set_schedule(&self, schedule: Schedule) -> usize {
        for player in &self.shared.players {
            let Some(spin) = player.spin() else {
                continue;
            };
            let dropped = !schedule.spins().contains(&spin);
            if dropped && player.state() != PlayerState::Playing {
                info!(player = player.id(), spin_id = spin.id, "Spin dropped from schedule");
                player.clear();
            }
        }

        self.shared.state.lock().schedule = Some(schedule);
        self.shared.refresh()
    }

    /// Hand pending spins to free players. Returns the number of loads started.
    pub fn refresh(&self) -> usize {
        self.shared.refresh()
    }

    /// Stop every player and forget the schedule.
    pub fn stop(&self) {
        {
            let mut state = self.shared.state.lock();
            state.schedule = None;
            if let Some(mut wake) = state.wake.take() {
                wake.cancel();
            }
        }
        for player in &self.shared.players {
            player.stop();
        }
        info!("Station stopped");
    }
}

impl StationShared {
    fn refresh(self: &Arc<Self>) -> usize {
        let now = self.ctx.clock.now();
        let horizon = now + to_chrono(self.ctx.config.look_ahead);
        let mut state = self.state.lock();

        let Some(schedule) = state.schedule.as_ref() else {
            return 0;
        };

        let held: Vec<Option<Spin>> = self.players.iter().map(|p| p.spin()).collect();
        let handled = |spin: &Spin, loading: &HashMap<usize, Spin>| {
            held.iter().flatten().any(|s| s == spin) || loading.values().any(|s| s == spin)
        };

        let pending: Vec<Spin> = schedule
            .current(now)
            .into_iter()
            .filter(|spin| spin.audio_block.is_some())
            .filter(|spin| !handled(spin, &state.loading))
            .cloned()
            .collect();

        let free: Vec<usize> = (0..self.players.len())
            .filter(|index| {
                !state.loading.contains_key(index)
                    && self.players[*index].state() == PlayerState::Available
            })
            .collect();

        let Some(runtime) = self.runtime.clone().or_else(|| Handle::try_current().ok()) else {
            warn!("No async runtime, cannot load spins");
            return 0;
        };

        let mut started = 0;
        let mut free_players = free.into_iter();
        let mut waiting = None;
        for spin in pending {
            if spin.airtime > horizon {
                waiting = Some(spin.airtime - to_chrono(self.ctx.config.look_ahead));
                break;
            }
            let Some(index) = free_players.next() else {
                break;
            };

            state.loading.insert(index, spin.clone());
            self.spawn_load(&runtime, index, spin);
            started += 1;
        }

        let cleanup_delay = to_chrono(self.ctx.config.cleanup_delay);
        let next_cleanup = held
            .iter()
            .flatten()
            .chain(state.loading.values())
            .map(|spin| spin.endtime() + cleanup_delay)
            .min();
        let wake_at = [next_cleanup, waiting].into_iter().flatten().min();
        self.arm_wake(&mut state, now, wake_at);

        if started > 0 {
            debug!(started, "Spins handed to players");
        }
        started
    }

    fn spawn_load(self: &Arc<Self>, runtime: &Handle, index: usize, spin: Spin) {
        let station: Weak<StationShared> = Arc::downgrade(self);
        let player = self.players[index].clone();

        runtime.spawn(async move {
            let spin_id = spin.id;
            if let Err(e) = player.load(spin).await {
                warn!(player = player.id(), spin_id, "Spin load failed: {}", e);
            }
            if let Some(station) = station.upgrade() {
                station.state.lock().loading.remove(&index);
            }
        });
    }

    fn arm_wake(
        self: &Arc<Self>,
        state: &mut StationState,
        now: DateTime<Utc>,
        wake_at: Option<DateTime<Utc>>,
    ) {
        if let Some(mut previous) = state.wake.take() {
            previous.cancel();
        }
        let Some(wake_at) = wake_at else {
            return;
        };

        let deadline = wake_at.max(now + Duration::milliseconds(MIN_WAKE_INTERVAL_MS));
        let station = Arc::downgrade(self);
        state.wake = Some(self.ctx.timers.schedule_at(
            deadline,
            Box::new(move || {
                if let Some(station) = station.upgrade() {
                    station.refresh();
                }
            }),
        ));
    }
}

impl std::fmt::Debug for StationPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StationPlayer")
            .field("players", &self.shared.players)
            .finish()
    }
}

fn to_chrono(duration: std::time::Duration) -> Duration {
    Duration::from_std(duration).unwrap_or_else(|_| Duration::zero())
}
