//! Core service façade and bootstrap helpers.
//!
//! This crate is the composition root of the playback core. It takes the
//! host-provided bridges collected in a [`CoreConfig`] (filesystem, HTTP,
//! clock, timers, audio engine) and builds the process-wide objects from
//! them: one cache directory, one [`DownloadManager`], one event bus and a
//! [`StationPlayer`] whose spin players share the engine. Desktop apps
//! typically enable the `desktop-shims` feature so the filesystem, HTTP and
//! timer bridges default to the `bridge-desktop` implementations.
//!
//! Logging is not installed here; hosts call
//! [`core_runtime::logging::init_logging`] once before bootstrapping.

pub mod error;

pub use error::{CoreError, Result};

use std::path::PathBuf;
use std::sync::Arc;

use core_playback::cache::{CacheConfig, CacheDirectory, DownloadManager};
use core_playback::schedule::Schedule;
use core_playback::{AudioFileDecoder, PlayerConfig, PlayerContext, StationPlayer};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus};
use tokio::sync::broadcast::Receiver;
use tracing::{error, info, instrument};

/// Aggregated handle to everything the core is built from.
pub struct CoreDependencies {
    pub config: CoreConfig,
    pub cache_config: CacheConfig,
    pub player_config: PlayerConfig,
    pub decoder: Arc<dyn AudioFileDecoder>,
}

impl CoreDependencies {
    /// Bundle `config` with default cache and player settings and the
    /// symphonia file decoder.
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config,
            cache_config: CacheConfig::default(),
            player_config: PlayerConfig::default(),
            decoder: Arc::new(core_playback::SymphoniaFileDecoder::new()),
        }
    }

    pub fn with_cache_config(mut self, cache_config: CacheConfig) -> Self {
        self.cache_config = cache_config;
        self
    }

    pub fn with_player_config(mut self, player_config: PlayerConfig) -> Self {
        self.player_config = player_config;
        self
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn AudioFileDecoder>) -> Self {
        self.decoder = decoder;
        self
    }
}

struct ServiceInner {
    deps: CoreDependencies,
    documents_dir: PathBuf,
    event_bus: Arc<EventBus>,
    downloads: Arc<DownloadManager>,
    station: StationPlayer,
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    inner: Arc<ServiceInner>,
}

impl CoreService {
    /// Build the core from `deps`.
    ///
    /// Must run inside a tokio runtime; downloads and spin loads are spawned
    /// on it. A cache folder that cannot be created is logged and left to
    /// fail the first download that needs it.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InitializationFailed`] for an invalid cache or player
    ///   configuration, or when no documents root can be resolved
    /// - [`CoreError::Playback`] when the engine refuses a player node
    #[instrument(skip(deps))]
    pub async fn new(deps: CoreDependencies) -> Result<Self> {
        deps.config.validate()?;
        deps.cache_config
            .validate()
            .map_err(CoreError::InitializationFailed)?;
        deps.player_config
            .validate()
            .map_err(CoreError::InitializationFailed)?;

        let config = &deps.config;
        let documents_dir = match &config.documents_dir {
            Some(dir) => dir.clone(),
            None => config
                .file_system
                .get_documents_directory()
                .await
                .map_err(|e| {
                    CoreError::InitializationFailed(format!(
                        "No documents directory available: {}",
                        e
                    ))
                })?,
        };

        let directory = Arc::new(CacheDirectory::new(
            Arc::clone(&config.file_system),
            documents_dir.clone(),
            deps.cache_config.clone(),
        ));
        if let Err(e) = directory.initialize().await {
            error!("Failed to create audio cache folder: {}", e);
        }

        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        let downloads = Arc::new(
            DownloadManager::new(directory, Arc::clone(&config.http_client))
                .with_event_bus(Arc::clone(&event_bus)),
        );

        let context = PlayerContext::new(
            Arc::clone(&config.audio_engine),
            Arc::clone(&downloads),
            Arc::clone(&deps.decoder),
            Arc::clone(&config.clock),
            Arc::clone(&config.timer_provider),
        )
        .with_config(deps.player_config.clone())
        .with_event_bus(Arc::clone(&event_bus));
        let station = StationPlayer::new(context, config.player_pool_size)?;

        info!(
            documents_dir = %documents_dir.display(),
            players = config.player_pool_size,
            "Playback core ready"
        );

        Ok(Self {
            inner: Arc::new(ServiceInner {
                deps,
                documents_dir,
                event_bus,
                downloads,
                station,
            }),
        })
    }

    /// Access the dependencies the service was built from.
    pub fn dependencies(&self) -> &CoreDependencies {
        &self.inner.deps
    }

    pub fn documents_dir(&self) -> &PathBuf {
        &self.inner.documents_dir
    }

    /// The process-wide download manager.
    pub fn downloads(&self) -> Arc<DownloadManager> {
        Arc::clone(&self.inner.downloads)
    }

    pub fn station(&self) -> &StationPlayer {
        &self.inner.station
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.inner.event_bus)
    }

    /// Receive download and player events from now on.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.inner.event_bus.subscribe()
    }

    /// Replace the station schedule. Returns the number of loads started.
    pub fn set_schedule(&self, schedule: Schedule) -> usize {
        self.inner.station.set_schedule(schedule)
    }

    /// Stop every player and cancel every download in flight.
    pub fn shutdown(&self) {
        self.inner.station.stop();
        let cancelled = self.inner.downloads.cancel_all();
        info!(cancelled, "Playback core stopped");
    }
}
