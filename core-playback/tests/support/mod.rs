//! Shared test doubles for the playback integration tests.
//!
//! - `MemoryFileSystem`: in-memory `FileSystemAccess` with per-path failures
//! - `ScriptedHttpClient`: writes fake bodies into the memory filesystem
//! - `VirtualEngine`: records node calls; its render clock follows a `ManualClock`
//! - `StubDecoder`: fixed-length files with a configurable peak

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{DownloadOutcome, DownloadRequest, HttpClient, ProgressCallback};
use bridge_traits::playback::{
    AudioCodec, AudioEngine, AudioFile, AudioFormat, EngineTime, PlayerNode,
};
use bridge_traits::storage::{FileMetadata, FileSystemAccess};
use bridge_traits::time::{Clock, ManualClock, ManualTimerProvider};
use chrono::{DateTime, Duration, TimeZone, Utc};
use core_playback::cache::{CacheConfig, CacheDirectory, DownloadManager};
use core_playback::{AudioFileDecoder, PlaybackError, PlayerContext};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

pub const MIB: u64 = 1024 * 1024;
pub const SAMPLE_RATE: u32 = 44_100;

pub fn documents() -> PathBuf {
    PathBuf::from("/documents")
}

pub fn cache_root() -> PathBuf {
    documents().join("AudioFiles")
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
}

// ============================================================================
// Filesystem
// ============================================================================

#[derive(Debug, Clone)]
struct MemoryFile {
    size: u64,
    modified_at: DateTime<Utc>,
}

#[derive(Default)]
struct MemoryState {
    files: HashMap<PathBuf, MemoryFile>,
    directories: HashSet<PathBuf>,
    available: Option<u64>,
    failing_deletes: HashSet<PathBuf>,
    failing_metadata: HashSet<PathBuf>,
    fail_create_dir: bool,
    fail_listing: bool,
    fail_move: bool,
    deleted: Vec<PathBuf>,
}

/// In-memory filesystem. Free space defaults to 1GiB.
pub struct MemoryFileSystem {
    state: Mutex<MemoryState>,
    hold_moves: AtomicBool,
    moves_released: Notify,
    moves_started: AtomicUsize,
}

impl MemoryFileSystem {
    pub fn new() -> Arc<Self> {
        let fs = Self {
            state: Mutex::new(MemoryState {
                available: Some(1024 * MIB),
                ..MemoryState::default()
            }),
            hold_moves: AtomicBool::new(false),
            moves_released: Notify::new(),
            moves_started: AtomicUsize::new(0),
        };
        fs.state.lock().directories.insert(documents());
        Arc::new(fs)
    }

    pub fn put_file(&self, path: impl Into<PathBuf>, size: u64, modified_at: DateTime<Utc>) {
        let path = path.into();
        let mut state = self.state.lock();
        if let Some(parent) = path.parent() {
            state.directories.insert(parent.to_path_buf());
        }
        state.files.insert(path, MemoryFile { size, modified_at });
    }

    pub fn append(&self, path: &Path, bytes: u64) -> u64 {
        let mut state = self.state.lock();
        if let Some(parent) = path.parent() {
            state.directories.insert(parent.to_path_buf());
        }
        let file = state.files.entry(path.to_path_buf()).or_insert(MemoryFile {
            size: 0,
            modified_at: epoch(),
        });
        file.size += bytes;
        file.size
    }

    pub fn has_file(&self, path: &Path) -> bool {
        self.state.lock().files.contains_key(path)
    }

    pub fn file_size(&self, path: &Path) -> Option<u64> {
        self.state.lock().files.get(path).map(|f| f.size)
    }

    pub fn files_under(&self, dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self
            .state
            .lock()
            .files
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .cloned()
            .collect();
        files.sort();
        files
    }

    pub fn deleted(&self) -> Vec<PathBuf> {
        self.state.lock().deleted.clone()
    }

    pub fn set_available(&self, available: Option<u64>) {
        self.state.lock().available = available;
    }

    pub fn fail_delete(&self, path: impl Into<PathBuf>) {
        self.state.lock().failing_deletes.insert(path.into());
    }

    pub fn fail_metadata(&self, path: impl Into<PathBuf>) {
        self.state.lock().failing_metadata.insert(path.into());
    }

    pub fn fail_create_dir(&self) {
        self.state.lock().fail_create_dir = true;
    }

    pub fn fail_listing(&self) {
        self.state.lock().fail_listing = true;
    }

    pub fn fail_move(&self) {
        self.state.lock().fail_move = true;
    }

    /// Park every rename before it lands until [`release_moves`](Self::release_moves).
    pub fn hold_moves(&self) {
        self.hold_moves.store(true, Ordering::SeqCst);
    }

    pub fn release_moves(&self) {
        self.hold_moves.store(false, Ordering::SeqCst);
        self.moves_released.notify_waiters();
    }

    pub fn moves_started(&self) -> usize {
        self.moves_started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileSystemAccess for MemoryFileSystem {
    async fn get_documents_directory(&self) -> BridgeResult<PathBuf> {
        Ok(documents())
    }

    async fn exists(&self, path: &Path) -> BridgeResult<bool> {
        let state = self.state.lock();
        Ok(state.files.contains_key(path) || state.directories.contains(path))
    }

    async fn metadata(&self, path: &Path) -> BridgeResult<FileMetadata> {
        let state = self.state.lock();
        if state.failing_metadata.contains(path) {
            return Err(BridgeError::OperationFailed(format!("stat {:?}", path)));
        }
        if let Some(file) = state.files.get(path) {
            return Ok(FileMetadata::file(file.size, file.modified_at));
        }
        if state.directories.contains(path) {
            return Ok(FileMetadata {
                size: 0,
                modified_at: None,
                is_directory: true,
            });
        }
        Err(BridgeError::NotFound(path.to_path_buf()))
    }

    async fn create_dir_all(&self, path: &Path) -> BridgeResult<()> {
        let mut state = self.state.lock();
        if state.fail_create_dir {
            return Err(BridgeError::OperationFailed("read-only volume".to_string()));
        }
        for ancestor in path.ancestors() {
            state.directories.insert(ancestor.to_path_buf());
        }
        Ok(())
    }

    async fn move_file(&self, from: &Path, to: &Path) -> BridgeResult<()> {
        let released = self.moves_released.notified();
        self.moves_started.fetch_add(1, Ordering::SeqCst);
        if self.hold_moves.load(Ordering::SeqCst) {
            released.await;
        }

        let mut state = self.state.lock();
        if state.fail_move {
            return Err(BridgeError::OperationFailed(format!(
                "rename {:?}: cross-device link",
                from
            )));
        }
        let file = state
            .files
            .remove(from)
            .ok_or_else(|| BridgeError::NotFound(from.to_path_buf()))?;
        state.files.insert(to.to_path_buf(), file);
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> BridgeResult<()> {
        let mut state = self.state.lock();
        if state.failing_deletes.contains(path) {
            return Err(BridgeError::OperationFailed(format!("unlink {:?}", path)));
        }
        state
            .files
            .remove(path)
            .ok_or_else(|| BridgeError::NotFound(path.to_path_buf()))?;
        state.deleted.push(path.to_path_buf());
        Ok(())
    }

    async fn list_directory(&self, path: &Path) -> BridgeResult<Vec<PathBuf>> {
        let state = self.state.lock();
        if state.fail_listing || !state.directories.contains(path) {
            return Err(BridgeError::NotFound(path.to_path_buf()));
        }
        let files = state.files.keys().filter(|p| p.parent() == Some(path));
        let dirs = state.directories.iter().filter(|p| p.parent() == Some(path));
        let mut entries: Vec<PathBuf> = files.chain(dirs).cloned().collect();
        entries.sort();
        Ok(entries)
    }

    async fn available_space(&self, _path: &Path) -> BridgeResult<u64> {
        self.state
            .lock()
            .available
            .ok_or_else(|| BridgeError::NotAvailable("statvfs".to_string()))
    }
}

// ============================================================================
// HTTP
// ============================================================================

/// Fake transport writing `body_size` bytes in four chunks.
pub struct ScriptedHttpClient {
    fs: Arc<MemoryFileSystem>,
    body_size: u64,
    report_total: bool,
    failure: Mutex<Option<String>>,
    hold: AtomicBool,
    release: Notify,
    requests: Mutex<Vec<DownloadRequest>>,
    calls: AtomicUsize,
}

impl ScriptedHttpClient {
    pub fn new(fs: Arc<MemoryFileSystem>, body_size: u64) -> Arc<Self> {
        Arc::new(Self {
            fs,
            body_size,
            report_total: true,
            failure: Mutex::new(None),
            hold: AtomicBool::new(false),
            release: Notify::new(),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    /// Server without a content length.
    pub fn without_total(fs: Arc<MemoryFileSystem>, body_size: u64) -> Arc<Self> {
        let mut client = Self::new(fs, body_size);
        if let Some(client) = Arc::get_mut(&mut client) {
            client.report_total = false;
        }
        client
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock() = Some(message.to_string());
    }

    /// Park every transfer after its first chunk until [`release`](Self::release).
    pub fn hold(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.release.notify_waiters();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<DownloadRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpClient for ScriptedHttpClient {
    async fn download_to_file(
        &self,
        request: DownloadRequest,
        progress: &ProgressCallback,
    ) -> BridgeResult<DownloadOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        if let Some(message) = self.failure.lock().clone() {
            return Err(BridgeError::OperationFailed(message));
        }

        let total = self.report_total.then_some(self.body_size);
        let chunk = (self.body_size / 4).max(1);
        let mut written = 0;
        while written < self.body_size {
            let step = chunk.min(self.body_size - written);
            written = self.fs.append(&request.destination, step);
            progress(written, total);
            tokio::task::yield_now().await;

            if self.hold.load(Ordering::SeqCst) {
                let released = self.release.notified();
                if self.hold.load(Ordering::SeqCst) {
                    released.await;
                }
            }
        }

        Ok(DownloadOutcome {
            bytes_written: written,
            total_bytes: total,
            resumed: false,
        })
    }
}

// ============================================================================
// Audio engine
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum NodeCall {
    ScheduleFile { at: Option<EngineTime> },
    ScheduleSegment { start_frame: u64, frame_count: u64 },
    Play,
    Stop,
}

/// Node double recording every call.
pub struct VirtualNode {
    engine: Arc<EngineClock>,
    calls: Mutex<Vec<NodeCall>>,
    volumes: Mutex<Vec<f32>>,
    volume: Mutex<f32>,
    fail_schedule: AtomicBool,
}

impl VirtualNode {
    pub fn calls(&self) -> Vec<NodeCall> {
        self.calls.lock().clone()
    }

    /// Every value passed to `set_volume`, in order.
    pub fn volume_history(&self) -> Vec<f32> {
        self.volumes.lock().clone()
    }

    pub fn clear_history(&self) {
        self.calls.lock().clear();
        self.volumes.lock().clear();
    }

    pub fn fail_schedule(&self) {
        self.fail_schedule.store(true, Ordering::SeqCst);
    }
}

impl PlayerNode for VirtualNode {
    fn play(&self) -> BridgeResult<()> {
        self.calls.lock().push(NodeCall::Play);
        Ok(())
    }

    fn stop(&self) {
        self.calls.lock().push(NodeCall::Stop);
    }

    fn current_render_time(&self) -> Option<EngineTime> {
        self.engine.render_time()
    }

    fn schedule_file(&self, _file: &AudioFile, at: Option<EngineTime>) -> BridgeResult<()> {
        if self.fail_schedule.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("node detached".to_string()));
        }
        self.calls.lock().push(NodeCall::ScheduleFile { at });
        Ok(())
    }

    fn schedule_segment(
        &self,
        _file: &AudioFile,
        start_frame: u64,
        frame_count: u64,
        _at: Option<EngineTime>,
    ) -> BridgeResult<()> {
        if self.fail_schedule.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("node detached".to_string()));
        }
        self.calls.lock().push(NodeCall::ScheduleSegment {
            start_frame,
            frame_count,
        });
        Ok(())
    }

    fn volume(&self) -> f32 {
        *self.volume.lock()
    }

    fn set_volume(&self, volume: f32) {
        *self.volume.lock() = volume;
        self.volumes.lock().push(volume);
    }
}

/// Sample clock of the virtual engine: counts frames since the engine
/// started, following the manual wall clock.
struct EngineClock {
    clock: Arc<ManualClock>,
    started_at: Mutex<Option<DateTime<Utc>>>,
}

impl EngineClock {
    fn render_time(&self) -> Option<EngineTime> {
        let started_at = (*self.started_at.lock())?;
        let elapsed = self.clock.now() - started_at;
        let frames = elapsed.num_microseconds()? * SAMPLE_RATE as i64 / 1_000_000;
        Some(EngineTime::new(frames, SAMPLE_RATE as f64))
    }
}

/// Engine double sharing one sample clock across its nodes.
pub struct VirtualEngine {
    engine_clock: Arc<EngineClock>,
    nodes: Mutex<Vec<Arc<VirtualNode>>>,
    fail_start: AtomicBool,
    fail_pause: AtomicBool,
    pauses: AtomicUsize,
}

impl VirtualEngine {
    pub fn new(clock: Arc<ManualClock>) -> Arc<Self> {
        Arc::new(Self {
            engine_clock: Arc::new(EngineClock {
                clock,
                started_at: Mutex::new(None),
            }),
            nodes: Mutex::new(Vec::new()),
            fail_start: AtomicBool::new(false),
            fail_pause: AtomicBool::new(false),
            pauses: AtomicUsize::new(0),
        })
    }

    pub fn node(&self, index: usize) -> Arc<VirtualNode> {
        Arc::clone(&self.nodes.lock()[index])
    }

    pub fn node_count(&self) -> usize {
        self.nodes.lock().len()
    }

    pub fn fail_start(&self) {
        self.fail_start.store(true, Ordering::SeqCst);
    }

    pub fn fail_pause(&self) {
        self.fail_pause.store(true, Ordering::SeqCst);
    }

    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }
}

impl AudioEngine for VirtualEngine {
    fn attach_player(&self) -> BridgeResult<Arc<dyn PlayerNode>> {
        let node = Arc::new(VirtualNode {
            engine: Arc::clone(&self.engine_clock),
            calls: Mutex::new(Vec::new()),
            volumes: Mutex::new(Vec::new()),
            volume: Mutex::new(1.0),
            fail_schedule: AtomicBool::new(false),
        });
        self.nodes.lock().push(Arc::clone(&node));
        Ok(node)
    }

    fn start(&self) -> BridgeResult<()> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("audio session busy".to_string()));
        }
        let mut started_at = self.engine_clock.started_at.lock();
        if started_at.is_none() {
            *started_at = Some(self.engine_clock.clock.now());
        }
        Ok(())
    }

    fn pause(&self) -> BridgeResult<()> {
        if self.fail_pause.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("audio session busy".to_string()));
        }
        self.pauses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.engine_clock.started_at.lock().is_some()
    }
}

// ============================================================================
// Decoder
// ============================================================================

/// Decoder returning a fixed-length file and a constant peak.
pub struct StubDecoder {
    pub frame_count: u64,
    pub peak: Option<f32>,
    pub fail_open: bool,
}

impl StubDecoder {
    pub fn seconds(seconds: u64) -> Arc<Self> {
        Arc::new(Self {
            frame_count: seconds * SAMPLE_RATE as u64,
            peak: Some(1.0),
            fail_open: false,
        })
    }
}

impl AudioFileDecoder for StubDecoder {
    fn open(&self, path: &Path) -> core_playback::Result<AudioFile> {
        if self.fail_open {
            return Err(PlaybackError::InvalidFormat("not audio".to_string()));
        }
        Ok(AudioFile::new(
            path,
            AudioFormat::new(AudioCodec::Mp3, SAMPLE_RATE, 2),
            self.frame_count,
        ))
    }

    fn read_channel_samples(&self, _path: &Path, _channel: usize) -> core_playback::Result<Vec<f32>> {
        match self.peak {
            Some(peak) => Ok(vec![peak * 0.5, -peak, peak * 0.25]),
            None => Err(PlaybackError::DecodingError("truncated".to_string())),
        }
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Everything a player test needs, wired to virtual time.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub timers: Arc<ManualTimerProvider>,
    pub fs: Arc<MemoryFileSystem>,
    pub http: Arc<ScriptedHttpClient>,
    pub engine: Arc<VirtualEngine>,
    pub downloads: Arc<DownloadManager>,
}

impl Harness {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(epoch()));
        let timers = Arc::new(ManualTimerProvider::new(Arc::clone(&clock)));
        let fs = MemoryFileSystem::new();
        let http = ScriptedHttpClient::new(Arc::clone(&fs), 64 * 1024);
        let engine = VirtualEngine::new(Arc::clone(&clock));
        let directory = Arc::new(CacheDirectory::new(
            fs.clone(),
            documents(),
            CacheConfig::default(),
        ));
        let downloads = Arc::new(DownloadManager::new(directory, http.clone()));

        Self {
            clock,
            timers,
            fs,
            http,
            engine,
            downloads,
        }
    }

    pub fn context(&self, decoder: Arc<StubDecoder>) -> PlayerContext {
        PlayerContext::new(
            self.engine.clone(),
            Arc::clone(&self.downloads),
            decoder,
            self.clock.clone(),
            self.timers.clone(),
        )
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Advance virtual time by `millis`.
    pub fn advance_ms(&self, millis: i64) {
        self.timers.advance(Duration::milliseconds(millis));
    }
}

/// Poll `condition` until it holds, failing the test after five seconds.
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    let polled = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "condition not reached in time");
}
