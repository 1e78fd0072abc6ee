//! Host capabilities injected into the playback core.
//!
//! [`CoreConfig`] is assembled with [`CoreConfigBuilder`] and checked once,
//! at build time, so the composition root never sees a half-wired core. The
//! audio engine has no default and must always be injected. With the
//! `desktop-shims` feature the filesystem, HTTP and timer bridges fall back
//! to the `bridge-desktop` implementations; without it they are required
//! too. The clock defaults to [`SystemClock`] and the documents root to
//! whatever the filesystem bridge reports.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .documents_dir("/home/jane/Documents")
//!     .audio_engine(Arc::new(MyEngine::new()))
//!     .player_pool_size(3)
//!     .build()?;
//! ```
//!
//! A missing bridge is reported as [`Error::CapabilityMissing`] naming the
//! capability and how to provide it.

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{
    AudioEngine, Clock, FileSystemAccess, HttpClient, LoggerSink, SystemClock, TimerProvider,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Default number of spin players in a station pool.
pub const DEFAULT_PLAYER_POOL_SIZE: usize = 2;

/// Core configuration for the playback core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Per-user documents root; the cache folder lives beneath it.
    /// `None` asks the filesystem bridge at startup.
    pub documents_dir: Option<PathBuf>,

    pub file_system: Arc<dyn FileSystemAccess>,

    pub http_client: Arc<dyn HttpClient>,

    pub clock: Arc<dyn Clock>,

    pub timer_provider: Arc<dyn TimerProvider>,

    /// Shared engine, attached to once per player.
    pub audio_engine: Arc<dyn AudioEngine>,

    pub logger_sink: Option<Arc<dyn LoggerSink>>,

    /// Number of players in the station pool.
    pub player_pool_size: usize,

    /// Capacity of the event bus channel.
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("documents_dir", &self.documents_dir)
            .field("file_system", &"<FileSystemAccess>")
            .field("http_client", &"<HttpClient>")
            .field("clock", &"<Clock>")
            .field("timer_provider", &"<TimerProvider>")
            .field("audio_engine", &"<AudioEngine>")
            .field("logger_sink", &self.logger_sink.as_ref().map(|_| "<LoggerSink>"))
            .field("player_pool_size", &self.player_pool_size)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// This checks:
    /// - The documents root, when given, is not empty
    /// - The player pool holds at least one player
    /// - The event buffer can hold at least one event
    pub fn validate(&self) -> Result<()> {
        if let Some(dir) = &self.documents_dir {
            if dir.as_os_str().is_empty() {
                return Err(Error::Config(
                    "Documents directory cannot be empty".to_string(),
                ));
            }
        }

        if self.player_pool_size == 0 {
            return Err(Error::Config(
                "Player pool size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn capability_missing(capability: &str, desktop_default: Option<&str>) -> Error {
    let message = match desktop_default {
        Some(default) => format!(
            "{} implementation is required. \
             Desktop: enable the 'desktop-shims' feature to use the default {}. \
             Mobile/embedded: inject a platform-native implementation.",
            capability, default
        ),
        None => format!(
            "{} implementation is required and has no default. \
             Inject the host's implementation through the builder.",
            capability
        ),
    };
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message,
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Ok(Arc::new(bridge_desktop::TokioFileSystem::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Err(capability_missing("FileSystemAccess", Some("TokioFileSystem")))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Ok(Arc::new(bridge_desktop::ReqwestHttpClient::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(capability_missing("HttpClient", Some("ReqwestHttpClient")))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_timer_provider() -> Result<Arc<dyn TimerProvider>> {
    Ok(Arc::new(bridge_desktop::TokioTimerProvider::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_timer_provider() -> Result<Arc<dyn TimerProvider>> {
    Err(capability_missing("TimerProvider", Some("TokioTimerProvider")))
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Set the bridges and options, then call
/// [`build()`](CoreConfigBuilder::build).
#[derive(Default)]
pub struct CoreConfigBuilder {
    documents_dir: Option<PathBuf>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    http_client: Option<Arc<dyn HttpClient>>,
    clock: Option<Arc<dyn Clock>>,
    timer_provider: Option<Arc<dyn TimerProvider>>,
    audio_engine: Option<Arc<dyn AudioEngine>>,
    logger_sink: Option<Arc<dyn LoggerSink>>,
    player_pool_size: Option<usize>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the per-user documents root.
    pub fn documents_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.documents_dir = Some(path.into());
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn timer_provider(mut self, timers: Arc<dyn TimerProvider>) -> Self {
        self.timer_provider = Some(timers);
        self
    }

    pub fn audio_engine(mut self, engine: Arc<dyn AudioEngine>) -> Self {
        self.audio_engine = Some(engine);
        self
    }

    pub fn logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn player_pool_size(mut self, size: usize) -> Self {
        self.player_pool_size = Some(size);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when the audio engine is absent, or a
    ///   filesystem/HTTP/timer bridge is absent without `desktop-shims`
    /// - [`Error::Config`] when a value fails validation
    pub fn build(self) -> Result<CoreConfig> {
        let audio_engine = self
            .audio_engine
            .ok_or_else(|| capability_missing("AudioEngine", None))?;

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system()?,
        };

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let timer_provider = match self.timer_provider {
            Some(timers) => timers,
            None => provide_default_timer_provider()?,
        };

        let config = CoreConfig {
            documents_dir: self.documents_dir,
            file_system,
            http_client,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            timer_provider,
            audio_engine,
            logger_sink: self.logger_sink,
            player_pool_size: self.player_pool_size.unwrap_or(DEFAULT_PLAYER_POOL_SIZE),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{
        DownloadOutcome, DownloadRequest, FileMetadata, ManualClock, ManualTimerProvider,
        PlayerNode, ProgressCallback,
    };
    use std::path::Path;

    struct StubEngine;

    impl AudioEngine for StubEngine {
        fn attach_player(&self) -> BridgeResult<Arc<dyn PlayerNode>> {
            Err(bridge_traits::BridgeError::NotAvailable("stub".to_string()))
        }

        fn start(&self) -> BridgeResult<()> {
            Ok(())
        }

        fn pause(&self) -> BridgeResult<()> {
            Ok(())
        }

        fn is_running(&self) -> bool {
            false
        }
    }

    struct StubFileSystem;

    #[async_trait]
    impl FileSystemAccess for StubFileSystem {
        async fn get_documents_directory(&self) -> BridgeResult<PathBuf> {
            Ok(PathBuf::from("/docs"))
        }
        async fn exists(&self, _path: &Path) -> BridgeResult<bool> {
            Ok(false)
        }
        async fn metadata(&self, path: &Path) -> BridgeResult<FileMetadata> {
            Err(bridge_traits::BridgeError::NotFound(path.to_path_buf()))
        }
        async fn create_dir_all(&self, _path: &Path) -> BridgeResult<()> {
            Ok(())
        }
        async fn move_file(&self, _from: &Path, _to: &Path) -> BridgeResult<()> {
            Ok(())
        }
        async fn delete_file(&self, _path: &Path) -> BridgeResult<()> {
            Ok(())
        }
        async fn list_directory(&self, _path: &Path) -> BridgeResult<Vec<PathBuf>> {
            Ok(Vec::new())
        }
        async fn available_space(&self, _path: &Path) -> BridgeResult<u64> {
            Ok(u64::MAX)
        }
    }

    struct StubHttpClient;

    #[async_trait]
    impl HttpClient for StubHttpClient {
        async fn download_to_file(
            &self,
            _request: DownloadRequest,
            _progress: &ProgressCallback,
        ) -> BridgeResult<DownloadOutcome> {
            Err(bridge_traits::BridgeError::NotAvailable("offline".to_string()))
        }
    }

    fn manual_timers() -> Arc<ManualTimerProvider> {
        Arc::new(ManualTimerProvider::new(Arc::new(ManualClock::new(
            chrono::Utc::now(),
        ))))
    }

    fn full_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .audio_engine(Arc::new(StubEngine))
            .file_system(Arc::new(StubFileSystem))
            .http_client(Arc::new(StubHttpClient))
            .timer_provider(manual_timers())
    }

    #[test]
    fn test_builder_requires_audio_engine() {
        let result = CoreConfig::builder()
            .file_system(Arc::new(StubFileSystem))
            .http_client(Arc::new(StubHttpClient))
            .timer_provider(manual_timers())
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "AudioEngine")
            }
            other => panic!("expected missing engine, got {:?}", other.map(|_| ())),
        }
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_bridges_without_shims() {
        let result = CoreConfig::builder()
            .audio_engine(Arc::new(StubEngine))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, message }) => {
                assert_eq!(capability, "FileSystemAccess");
                assert!(message.contains("desktop-shims"));
            }
            other => panic!("expected missing filesystem, got {:?}", other.map(|_| ())),
        }
    }

    #[cfg(feature = "desktop-shims")]
    #[tokio::test]
    async fn test_build_with_desktop_defaults() {
        let config = CoreConfig::builder()
            .audio_engine(Arc::new(StubEngine))
            .build()
            .expect("desktop defaults should succeed");

        assert_eq!(config.player_pool_size, DEFAULT_PLAYER_POOL_SIZE);
    }

    #[test]
    fn test_builder_with_all_required_fields() {
        let config = full_builder()
            .documents_dir("/home/jane/Documents")
            .build()
            .unwrap();

        assert_eq!(
            config.documents_dir,
            Some(PathBuf::from("/home/jane/Documents"))
        );
        assert_eq!(config.player_pool_size, DEFAULT_PLAYER_POOL_SIZE);
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        assert!(config.logger_sink.is_none());
    }

    #[test]
    fn test_custom_clock_is_kept() {
        let start = chrono::Utc::now() - chrono::Duration::days(1);
        let config = full_builder()
            .clock(Arc::new(ManualClock::new(start)))
            .build()
            .unwrap();

        assert_eq!(config.clock.now(), start);
    }

    #[test]
    fn test_validate_rejects_empty_pool() {
        let result = full_builder().player_pool_size(0).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_empty_documents_dir() {
        let result = full_builder().documents_dir("").build();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Documents directory cannot be empty"));
    }

    #[test]
    fn test_validate_rejects_zero_event_buffer() {
        assert!(full_builder().event_buffer_size(0).build().is_err());
    }

    #[test]
    fn test_config_is_cloneable_and_debuggable() {
        let config = full_builder().player_pool_size(4).build().unwrap();
        let cloned = config.clone();
        assert_eq!(cloned.player_pool_size, 4);
        assert!(format!("{:?}", cloned).contains("player_pool_size: 4"));
    }
}
