//! Observer notifications for downloads and spin players.
//!
//! Everything goes through one [`EventBus`], a `tokio::sync::broadcast`
//! channel. Publishers never wait on subscribers. A slow subscriber sees
//! `RecvError::Lagged(n)` and keeps going; `RecvError::Closed` means the
//! core was dropped.
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlayerEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut events = bus.subscribe();
//!
//! bus.emit(PlayerEvent::SpinStarted {
//!     player_id: "player-0".to_string(),
//!     spin_id: 42,
//! })
//! .ok();
//!
//! let event = events.recv().await.unwrap();
//! assert_eq!(event.to_string(), "player-0 started spin 42");
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tokio::sync::broadcast::{self, error::TryRecvError};

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Events buffered per subscriber before it starts lagging.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Download(DownloadEvent),
    Player(PlayerEvent),
}

impl CoreEvent {
    /// Failures the host should surface to its error reporting.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            CoreEvent::Download(DownloadEvent::Failed { .. })
                | CoreEvent::Player(PlayerEvent::Error { .. })
        )
    }

    /// The player an event concerns, if any.
    pub fn player_id(&self) -> Option<&str> {
        match self {
            CoreEvent::Player(event) => Some(event.player_id()),
            CoreEvent::Download(_) => None,
        }
    }
}

impl From<DownloadEvent> for CoreEvent {
    fn from(event: DownloadEvent) -> Self {
        CoreEvent::Download(event)
    }
}

impl From<PlayerEvent> for CoreEvent {
    fn from(event: PlayerEvent) -> Self {
        CoreEvent::Player(event)
    }
}

impl fmt::Display for CoreEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreEvent::Download(event) => event.fmt(f),
            CoreEvent::Player(event) => event.fmt(f),
        }
    }
}

/// Download lifecycle, keyed by download id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum DownloadEvent {
    Started { download_id: String, url: String },
    /// Fraction written so far, in `[0, 1]`.
    Progress { download_id: String, progress: f64 },
    Completed {
        download_id: String,
        url: String,
        local_path: PathBuf,
    },
    Failed {
        download_id: String,
        url: String,
        message: String,
    },
    /// Cancelled by the caller. Never retried.
    Cancelled { download_id: String, url: String },
}

impl DownloadEvent {
    pub fn download_id(&self) -> &str {
        match self {
            DownloadEvent::Started { download_id, .. }
            | DownloadEvent::Progress { download_id, .. }
            | DownloadEvent::Completed { download_id, .. }
            | DownloadEvent::Failed { download_id, .. }
            | DownloadEvent::Cancelled { download_id, .. } => download_id,
        }
    }
}

impl fmt::Display for DownloadEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadEvent::Started { download_id, .. } => {
                write!(f, "download {download_id} started")
            }
            DownloadEvent::Progress {
                download_id,
                progress,
            } => write!(f, "download {download_id} at {:.0}%", progress * 100.0),
            DownloadEvent::Completed { download_id, .. } => {
                write!(f, "download {download_id} completed")
            }
            DownloadEvent::Failed {
                download_id,
                message,
                ..
            } => write!(f, "download {download_id} failed: {message}"),
            DownloadEvent::Cancelled { download_id, .. } => {
                write!(f, "download {download_id} cancelled")
            }
        }
    }
}

/// Spin player lifecycle, keyed by player id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlayerEvent {
    /// `available`, `loading`, `loaded` or `playing`.
    StateChanged { player_id: String, state: String },
    /// The spin reached its airtime or was joined mid-play.
    SpinStarted { player_id: String, spin_id: i64 },
    FadeStarted {
        player_id: String,
        spin_id: i64,
        /// Target volume in thousandths.
        to_volume_milli: i32,
    },
    SpinCleared { player_id: String, spin_id: i64 },
    Error { player_id: String, message: String },
}

impl PlayerEvent {
    pub fn player_id(&self) -> &str {
        match self {
            PlayerEvent::StateChanged { player_id, .. }
            | PlayerEvent::SpinStarted { player_id, .. }
            | PlayerEvent::FadeStarted { player_id, .. }
            | PlayerEvent::SpinCleared { player_id, .. }
            | PlayerEvent::Error { player_id, .. } => player_id,
        }
    }
}

impl fmt::Display for PlayerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerEvent::StateChanged { player_id, state } => write!(f, "{player_id} is {state}"),
            PlayerEvent::SpinStarted { player_id, spin_id } => {
                write!(f, "{player_id} started spin {spin_id}")
            }
            PlayerEvent::FadeStarted {
                player_id,
                spin_id,
                to_volume_milli,
            } => write!(
                f,
                "{player_id} fading spin {spin_id} to {:.3}",
                *to_volume_milli as f32 / 1000.0
            ),
            PlayerEvent::SpinCleared { player_id, spin_id } => {
                write!(f, "{player_id} cleared spin {spin_id}")
            }
            PlayerEvent::Error { player_id, message } => write!(f, "{player_id} error: {message}"),
        }
    }
}

/// Broadcast hub shared by the download manager and the players.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// `capacity` is how far a subscriber may fall behind before lagging.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to every current subscriber.
    ///
    /// Fails only when nobody is subscribed; publishers ignore that.
    pub fn emit(&self, event: impl Into<CoreEvent>) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event.into())
    }

    /// Events from now on. Nothing is replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Subscription that only yields events matching `predicate`.
    pub fn subscribe_where<F>(&self, predicate: F) -> Subscription
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        Subscription {
            receiver: self.subscribe(),
            predicate: Box::new(predicate),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

type Predicate = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Filtered view of the bus, see [`EventBus::subscribe_where`].
pub struct Subscription {
    receiver: Receiver<CoreEvent>,
    predicate: Predicate,
}

impl Subscription {
    /// Next matching event. Non-matching events are dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if (self.predicate)(&event) {
                return Ok(event);
            }
        }
    }

    /// Next matching event already buffered, without waiting.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if (self.predicate)(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(missed)) => return Some(Err(RecvError::Lagged(missed))),
                Err(TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
