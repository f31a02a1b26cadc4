//! # Image Compressor Service
//!
//! Oggetto di servizio costruito esplicitamente dall'host e passato per riferimento:
//! collega scanner, dispatcher, scheduler, session store e save coordinator.
//!
//! ## Responsabilità:
//! - `open_session`: scansiona le root, valida la credenziale remota, registra la
//!   session store ed emette `extension.init`
//! - `handle`: esegue un `Command` IPC nel contesto di una sessione
//! - `compress_selected` / `compress_current`: porta i nodi in `pending`, esegue il
//!   batch con lo scheduler e aggiorna lo stato ad ogni settlement
//! - `save_selected` / `save_current`: promuove gli artefatti e marca i nodi `saved`
//! - `close_session`: distrugge la session store
//!
//! ## Flusso di un batch:
//! ```text
//! selezione → Workspace::begin → CompressionDispatcher::dispatch
//!           → TaskScheduler::run → Workspace::fulfill | reject → extension.compressed
//!           → extension.allCompressed + extension.tinypngUsageUpdate
//! ```
//!
//! La configurazione viene riletta dal `ConfigProvider` ad ogni comando.

use crate::codec::{
    CodecOptions, EncodePool, GifReencoder, RemoteOptimizer, ShrinkService, SvgOptimizer, SvgaReencoder,
};
use crate::config::{Config, ConfigProvider};
use crate::dispatcher::{Backends, CompressionDispatcher, JobOutcome};
use crate::error::{CompressError, CompressFailure};
use crate::ipc::{Command, Envelope, Event, EventSink, Signal};
use crate::platform::PlatformCommands;
use crate::progress::CompressionStats;
use crate::save::{SaveCoordinator, SaveOutcome, SaveRequest};
use crate::scanner::Scanner;
use crate::scheduler::TaskScheduler;
use crate::session::{SessionId, SessionStore};
use crate::tool_resolver::ToolPathResolver;
use crate::workspace::{CompressedState, Workspace};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Result of one compression command
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub keys: Vec<String>,
    pub stats: CompressionStats,
    pub usage: u64,
}

#[derive(Clone, Copy, PartialEq)]
enum BatchMode {
    Selected,
    Current,
}

pub struct ImageCompressor {
    config: ConfigProvider,
    store: SessionStore,
    remote: Arc<RemoteOptimizer>,
    tools: ToolPathResolver,
    sink: Arc<dyn EventSink>,
    backends: Option<Backends>,
    workspaces: Mutex<HashMap<SessionId, Arc<StdMutex<Workspace>>>>,
}

impl ImageCompressor {
    pub fn new(config: ConfigProvider, service: Arc<dyn ShrinkService>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            config,
            store: SessionStore::new(),
            remote: Arc::new(RemoteOptimizer::new(service)),
            tools: ToolPathResolver::new(),
            sink,
            backends: None,
            workspaces: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve external optimizers through `tools`
    pub fn with_tools(mut self, tools: ToolPathResolver) -> Self {
        self.tools = tools;
        self
    }

    /// Use fixed backends instead of building them per command
    pub fn with_backends(mut self, backends: Backends) -> Self {
        self.backends = Some(backends);
        self
    }

    pub fn remote(&self) -> &RemoteOptimizer {
        &self.remote
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    async fn config(&self) -> Result<Config, CompressError> {
        self.config
            .snapshot()
            .await
            .map_err(|e| CompressError::configuration(format!("{:#}", e)))
    }

    fn backends(&self, config: &Config) -> Backends {
        if let Some(backends) = &self.backends {
            return backends.clone();
        }
        let pool = EncodePool::new(config.encode_workers);
        Backends {
            remote: self.remote.clone(),
            vector: Arc::new(SvgOptimizer::new(self.tools.clone())),
            raster: Arc::new(GifReencoder::new(self.tools.clone(), pool.clone())),
            container: Arc::new(SvgaReencoder::new(pool)),
        }
    }

    fn emit(&self, signal: Signal, payload: Envelope) {
        self.sink.emit(&Event::new(signal, payload));
    }

    fn emit_usage(&self) {
        self.emit(Signal::UsageUpdate, Envelope::fulfilled(&json!({ "usage": self.remote.usage() })));
    }

    async fn workspace(&self, session: SessionId) -> Result<Arc<StdMutex<Workspace>>, CompressError> {
        self.workspaces
            .lock()
            .await
            .get(&session)
            .cloned()
            .ok_or_else(|| CompressError::unknown(format!("session {} is not open", session)))
    }

    /// Directory holding every session store of a workspace opened on `roots`
    fn temp_root(roots: &[PathBuf], config: &Config) -> Result<PathBuf, CompressError> {
        let first = roots
            .first()
            .ok_or_else(|| CompressError::client("no workspace root given"))?;
        let base = if first.is_file() {
            first.parent().unwrap_or(first)
        } else {
            first.as_path()
        };
        Ok(base.join(&config.temp_root_name))
    }

    /// Scan `roots`, validate the credential and announce the tree
    pub async fn open_session(&self, roots: &[PathBuf], view_ref: Option<String>) -> Result<SessionId, CompressError> {
        let config = self.config().await?;

        if let Err(e) = self.remote.validate_credential(&config.tinypng_api_key).await {
            warn!("Remote optimizer unavailable for this session: {}", e);
        }

        let scanner = Scanner::new(&config.ignore_patterns())?;
        let workspace = scanner.scan(roots).await?;

        let temp_root = Self::temp_root(roots, &config)?;
        tokio::fs::create_dir_all(&temp_root)
            .await
            .map_err(|e| CompressError::io(format!("Failed to create {}: {}", temp_root.display(), e)))?;

        let session = SessionId::new();
        self.store.register(session, &temp_root, view_ref).await;
        info!("Opened session {} over {} root(s)", session, roots.len());

        self.emit(
            Signal::Init,
            Envelope::fulfilled(&json!({
                "sessionId": session,
                "tree": workspace.tree(),
                "settings": {
                    "compressedFilePostfix": config.compressed_file_postfix,
                    "forceOverwrite": config.force_overwrite,
                    "concurrency": config.concurrency,
                },
            })),
        );
        self.emit_usage();

        self.workspaces
            .lock()
            .await
            .insert(session, Arc::new(StdMutex::new(workspace)));
        Ok(session)
    }

    /// Copy of the session's current tree
    pub async fn snapshot(&self, session: SessionId) -> Result<Workspace, CompressError> {
        let workspace = self.workspace(session).await?;
        let ws = lock(&workspace);
        Ok(ws.clone())
    }

    /// Execute one presentation-layer command
    pub async fn handle(&self, session: SessionId, command: Command) -> Result<(), CompressError> {
        debug!("Session {} handling {:?}", session, command);
        match command {
            Command::CompressSelected { keys } => self.compress_selected(session, &keys).await.map(|_| ()),
            Command::CompressCurrent { key } => self.compress_current(session, &key).await.map(|_| ()),
            Command::SaveSelected { keys } => self.save_selected(session, &keys).await.map(|_| ()),
            Command::SaveCurrent { key } => self.save_current(session, &key).await.map(|_| ()),
            Command::OpenFile { path } => PlatformCommands::open_file(&path).await,
            Command::OpenFileInExplorer { path } => PlatformCommands::reveal_in_file_browser(&path).await,
        }
    }

    pub async fn compress_selected(&self, session: SessionId, keys: &[String]) -> Result<BatchReport, CompressError> {
        self.run_batch(session, keys, BatchMode::Selected).await
    }

    pub async fn compress_current(&self, session: SessionId, key: &str) -> Result<BatchReport, CompressError> {
        self.run_batch(session, &[key.to_string()], BatchMode::Current).await
    }

    async fn run_batch(&self, session: SessionId, keys: &[String], mode: BatchMode) -> Result<BatchReport, CompressError> {
        let config = self.config().await?;
        if let Err(e) = self.remote.refresh_credential(&config.tinypng_api_key).await {
            debug!("Remote optimizer unavailable for this batch: {}", e);
        }
        let workspace = self.workspace(session).await?;

        let target_dir = self.store.create(session).await?;
        let dispatcher = CompressionDispatcher::new(
            self.backends(&config),
            CodecOptions {
                postfix: config.compressed_file_postfix.clone(),
                gif_colors: config.gif_colors,
            },
            target_dir,
        );

        let mut batch_keys = Vec::with_capacity(keys.len());
        let mut jobs = Vec::with_capacity(keys.len());
        {
            let mut ws = lock(&workspace);
            for key in keys {
                if !ws.is_selectable(key) {
                    debug!("Skipping non-selectable node {}", key);
                    continue;
                }
                let Some(file) = ws.get(key).and_then(|n| n.file.clone()) else {
                    continue;
                };
                let job = dispatcher.dispatch(&file);
                if !job.is_noop() {
                    if let Err(e) = ws.begin(key) {
                        warn!("Cannot dispatch {}: {}", key, e);
                        continue;
                    }
                }
                batch_keys.push(key.clone());
                jobs.push(move || job.execute());
            }
        }
        info!(
            "Compressing {} file(s) with concurrency {}",
            jobs.len(),
            config.concurrency
        );

        let signal = match mode {
            BatchMode::Selected => Signal::Compressed,
            BatchMode::Current => Signal::CurrentCompressed,
        };
        let mut stats = CompressionStats::new();
        TaskScheduler::new(config.concurrency)
            .run(jobs, |index, result: &Result<JobOutcome, CompressFailure>| {
                let Some(key) = batch_keys.get(index) else {
                    return;
                };
                let payload = {
                    let mut ws = lock(&workspace);
                    let original = ws.get(key).and_then(|n| n.file.as_ref()).map_or(0, |f| f.size);
                    let transition = match result {
                        Ok(JobOutcome::Compressed(output)) => {
                            stats.add_compressed(original, output.output_size);
                            ws.fulfill(key, output)
                        }
                        Ok(JobOutcome::Skipped { .. }) => {
                            stats.add_skipped();
                            return;
                        }
                        Err(failure) => {
                            stats.add_failed();
                            ws.reject(key, failure.message())
                        }
                    };
                    if let Err(e) = transition {
                        warn!("State update for {} refused: {}", key, e);
                    }

                    match (ws.get(key), result) {
                        (Some(node), Ok(_)) => Envelope::fulfilled(node),
                        (Some(node), Err(failure)) => Envelope::rejected_with(node, failure.message()),
                        (None, _) => Envelope::rejected(format!("node {} vanished", key)),
                    }
                };
                self.sink.emit(&Event::new(signal, payload));
            })
            .await;

        let report = BatchReport {
            keys: batch_keys,
            stats,
            usage: self.remote.usage(),
        };
        info!("{}", report.stats.format_summary());
        if mode == BatchMode::Selected {
            self.emit(Signal::AllCompressed, Envelope::fulfilled(&report));
        }
        self.emit_usage();
        Ok(report)
    }

    fn save_request(ws: &Workspace, key: &str) -> Result<SaveRequest, CompressError> {
        let node = ws
            .get(key)
            .ok_or_else(|| CompressError::client(format!("unknown node {}", key)))?;
        match (&node.compressed_state, &node.optimized_path, &node.file) {
            (Some(CompressedState::Fulfilled), Some(temp_path), Some(file)) => Ok(SaveRequest {
                key: key.to_string(),
                source_path: file.source_path().to_path_buf(),
                temp_path: temp_path.clone(),
            }),
            _ => Err(CompressError::client(format!("{} has no compressed artifact to save", key))),
        }
    }

    fn rejected_outcome(key: &str, overwrite: bool, error: CompressError) -> SaveOutcome {
        SaveOutcome {
            key: key.to_string(),
            status: crate::ipc::Status::Rejected,
            overwrite,
            destination: None,
            error: Some(error),
        }
    }

    pub async fn save_selected(&self, session: SessionId, keys: &[String]) -> Result<Vec<SaveOutcome>, CompressError> {
        let config = self.config().await?;
        let overwrite = config.force_overwrite;
        let workspace = self.workspace(session).await?;

        let mut requests = Vec::new();
        let mut refused = Vec::new();
        {
            let ws = lock(&workspace);
            for key in keys {
                match Self::save_request(&ws, key) {
                    Ok(request) => requests.push(request),
                    Err(e) => refused.push(Self::rejected_outcome(key, overwrite, e)),
                }
            }
        }

        let mut outcomes = SaveCoordinator::save(&requests, overwrite).await;
        {
            let mut ws = lock(&workspace);
            for outcome in outcomes.iter().filter(|o| o.is_fulfilled()) {
                if let Err(e) = ws.mark_saved(&outcome.key) {
                    warn!("State update for {} refused: {}", outcome.key, e);
                }
            }
        }
        outcomes.extend(refused);

        info!(
            "Saved {}/{} file(s) (overwrite: {})",
            outcomes.iter().filter(|o| o.is_fulfilled()).count(),
            outcomes.len(),
            overwrite
        );
        self.emit(Signal::Saved, Envelope::fulfilled(&outcomes));
        Ok(outcomes)
    }

    pub async fn save_current(&self, session: SessionId, key: &str) -> Result<Envelope, CompressError> {
        let config = self.config().await?;
        let workspace = self.workspace(session).await?;

        let request = Self::save_request(&lock(&workspace), key);
        let envelope = match request {
            Ok(request) => SaveCoordinator::save_current(&request, config.force_overwrite).await,
            Err(e) => Envelope::rejected_with(
                &Self::rejected_outcome(key, config.force_overwrite, e.clone()),
                e.to_string(),
            ),
        };
        if envelope.is_fulfilled() {
            if let Err(e) = lock(&workspace).mark_saved(key) {
                warn!("State update for {} refused: {}", key, e);
            }
        }
        self.emit(Signal::CurrentSaved, envelope.clone());
        Ok(envelope)
    }

    /// Tear the session down; never fails
    pub async fn close_session(&self, session: SessionId) {
        self.workspaces.lock().await.remove(&session);
        self.store.destroy(session).await;
        info!("Closed session {}", session);
    }

    /// Close the session bound to an opaque view reference
    pub async fn close_view(&self, view_ref: &str) {
        match self.store.session_for_view(view_ref).await {
            Some(session) => self.close_session(session).await,
            None => debug!("No session bound to view {}", view_ref),
        }
    }
}

/// Workspace guards are short-lived and never held across an await
fn lock(workspace: &StdMutex<Workspace>) -> MutexGuard<'_, Workspace> {
    workspace.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Session roots as absolute paths
pub fn absolute_roots(paths: &[PathBuf]) -> Result<Vec<PathBuf>, CompressError> {
    paths
        .iter()
        .map(|p| {
            if p.is_absolute() {
                Ok(p.clone())
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(p))
                    .map_err(CompressError::from)
            }
        })
        .map(|p| p.map(|p| normalize(&p)))
        .collect()
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::remote::testing::MockShrinkService;
    use crate::codec::testing::SleepyBackend;
    use crate::dispatcher::fixtures::uniform;
    use crate::error::ErrorKind;
    use crate::ipc::{CollectingSink, Status};
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tempfile::TempDir;

    fn png(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        image::RgbaImage::from_pixel(8, 8, image::Rgba([200, 10, 10, 255]))
            .save(path)
            .unwrap();
    }

    fn config(key: &str, postfix: &str) -> ConfigProvider {
        ConfigProvider::fixed(Config {
            tinypng_api_key: key.to_string(),
            compressed_file_postfix: postfix.to_string(),
            concurrency: 2,
            ..Config::default()
        })
    }

    fn key(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    /// Three jpgs with no credential: all rejected, no network traffic
    #[tokio::test]
    async fn test_missing_credential_rejects_every_remote_job() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("w");
        let files: Vec<_> = (0..3).map(|i| root.join(format!("p{}.jpg", i))).collect();
        std::fs::create_dir_all(&root).unwrap();
        for f in &files {
            image::RgbImage::from_pixel(8, 8, image::Rgb([10, 120, 10])).save(f).unwrap();
        }

        let service = MockShrinkService::accepting("good");
        let sink = Arc::new(CollectingSink::new());
        let compressor = ImageCompressor::new(config("", ""), service.clone(), sink.clone());
        let session = compressor.open_session(&[root.clone()], None).await.unwrap();

        let keys: Vec<_> = files.iter().map(|f| key(f)).collect();
        let report = compressor.compress_selected(session, &keys).await.unwrap();
        assert_eq!(report.stats.files_rejected, 3);

        let ws = compressor.snapshot(session).await.unwrap();
        for k in &keys {
            let node = ws.get(k).unwrap();
            assert_eq!(node.compressed_state, Some(CompressedState::Rejected));
            assert!(node.error_message.as_deref().unwrap().starts_with("[ConfigurationError]"));
        }
        assert_eq!(service.validate_calls.load(Ordering::SeqCst), 0);
        assert_eq!(service.shrink_calls.load(Ordering::SeqCst), 0);

        let compressed: Vec<_> = sink
            .events()
            .into_iter()
            .filter(|e| e.signal == Signal::Compressed)
            .collect();
        assert_eq!(compressed.len(), 3);
        assert!(compressed.iter().all(|e| e.payload.status == Status::Rejected));
        assert_eq!(sink.signals().last(), Some(&Signal::UsageUpdate));
        assert!(sink.signals().contains(&Signal::AllCompressed));

        compressor.close_session(session).await;
    }

    #[tokio::test]
    async fn test_compress_then_save_siblings() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("w");
        let a = root.join("a.png");
        let b = root.join("sub").join("b.png");
        png(&a);
        png(&b);

        let service = MockShrinkService::accepting("good");
        let sink = Arc::new(CollectingSink::new());
        let compressor = ImageCompressor::new(config("good", ".min"), service.clone(), sink.clone());
        let session = compressor.open_session(&[root.clone()], Some("view-1".to_string())).await.unwrap();
        assert_eq!(sink.signals()[..2], [Signal::Init, Signal::UsageUpdate]);

        let keys = vec![key(&a), key(&b)];
        let report = compressor.compress_selected(session, &keys).await.unwrap();
        assert_eq!(report.stats.files_fulfilled, 2);
        assert_eq!(report.usage, 43);
        assert_eq!(service.shrink_calls.load(Ordering::SeqCst), 2);

        let ws = compressor.snapshot(session).await.unwrap();
        let store_dir = compressor.store().dir(session).await.unwrap();
        assert!(store_dir.starts_with(root.join(".mikas")));
        assert_eq!(ws.get(&key(&a)).unwrap().optimized_path, Some(store_dir.join("a.min.png")));

        let outcomes = compressor.save_selected(session, &keys).await.unwrap();
        assert!(outcomes.iter().all(SaveOutcome::is_fulfilled));
        assert!(root.join("a.min.png").exists());
        assert!(root.join("sub").join("b.min.png").exists());

        let ws = compressor.snapshot(session).await.unwrap();
        assert_eq!(ws.state(&key(&a)), Some(CompressedState::Saved));
        assert!(ws.selectable_keys().is_empty());

        // saved nodes are excluded from later batches
        let again = compressor.compress_selected(session, &keys).await.unwrap();
        assert!(again.keys.is_empty());

        compressor.close_view("view-1").await;
        assert!(!store_dir.exists());
    }

    #[tokio::test]
    async fn test_current_variants_and_unsaved_nodes() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("w");
        let a = root.join("a.png");
        let b = root.join("b.png");
        png(&a);
        png(&b);

        let sink = Arc::new(CollectingSink::new());
        let compressor = ImageCompressor::new(config("good", "-c"), MockShrinkService::accepting("good"), sink.clone());
        let session = compressor.open_session(&[root.clone()], None).await.unwrap();

        compressor
            .handle(session, Command::CompressCurrent { key: key(&a) })
            .await
            .unwrap();
        assert!(sink.last(Signal::CurrentCompressed).unwrap().payload.is_fulfilled());
        assert!(!sink.signals().contains(&Signal::AllCompressed));

        let refused = compressor.save_current(session, &key(&b)).await.unwrap();
        assert_eq!(refused.status, Status::Rejected);

        let saved = compressor.save_current(session, &key(&a)).await.unwrap();
        assert!(saved.is_fulfilled());
        assert!(root.join("a-c.png").exists());
        assert_eq!(sink.last(Signal::CurrentSaved).unwrap().payload, saved);
    }

    #[tokio::test]
    async fn test_batch_uses_injected_backends_and_ceiling() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("w");
        let files: Vec<_> = (0..6).map(|i| root.join(format!("f{}.png", i))).collect();
        for f in &files {
            png(f);
        }
        let backend = SleepyBackend::new(files.iter().map(|f| (f.clone(), Duration::from_millis(20))).collect());

        let compressor = ImageCompressor::new(
            config("", ""),
            MockShrinkService::accepting("good"),
            Arc::new(CollectingSink::new()),
        )
        .with_backends(uniform(backend.clone()));
        let session = compressor.open_session(&[root.clone()], None).await.unwrap();

        let keys: Vec<_> = files.iter().map(|f| key(f)).collect();
        let report = compressor.compress_selected(session, &keys).await.unwrap();
        assert_eq!(report.stats.files_fulfilled, 6);
        assert!(backend.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_failed_node_can_be_recompressed() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("w");
        let a = root.join("a.png");
        png(&a);
        let backend = SleepyBackend::failing(Vec::new(), vec![a.clone()]);

        let compressor = ImageCompressor::new(
            config("", ""),
            MockShrinkService::accepting("good"),
            Arc::new(CollectingSink::new()),
        )
        .with_backends(uniform(backend));
        let session = compressor.open_session(&[root.clone()], None).await.unwrap();

        compressor.compress_current(session, &key(&a)).await.unwrap();
        let ws = compressor.snapshot(session).await.unwrap();
        assert_eq!(ws.state(&key(&a)), Some(CompressedState::Rejected));

        let report = compressor.compress_current(session, &key(&a)).await.unwrap();
        assert_eq!(report.keys, vec![key(&a)]);
    }

    #[tokio::test]
    async fn test_cleared_key_stops_remote_calls() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("w");
        let photo = root.join("p.jpg");
        std::fs::create_dir_all(&root).unwrap();
        image::RgbImage::from_pixel(8, 8, image::Rgb([10, 120, 10])).save(&photo).unwrap();
        let config_path = temp.path().join("config.json");
        std::fs::write(&config_path, r#"{"tinypng_api_key": "good"}"#).unwrap();

        let service = MockShrinkService::accepting("good");
        let compressor = ImageCompressor::new(
            ConfigProvider::from_file(config_path.clone(), Default::default()),
            service.clone(),
            Arc::new(CollectingSink::new()),
        );
        let session = compressor.open_session(&[root.clone()], None).await.unwrap();
        assert_eq!(service.validate_calls.load(Ordering::SeqCst), 1);

        std::fs::write(&config_path, r#"{"tinypng_api_key": ""}"#).unwrap();
        let report = compressor.compress_current(session, &key(&photo)).await.unwrap();
        assert_eq!(report.stats.files_rejected, 1);
        assert_eq!(service.shrink_calls.load(Ordering::SeqCst), 0);
        assert_eq!(service.validate_calls.load(Ordering::SeqCst), 1);

        std::fs::write(&config_path, r#"{"tinypng_api_key": "good"}"#).unwrap();
        let report = compressor.compress_current(session, &key(&photo)).await.unwrap();
        assert_eq!(report.stats.files_fulfilled, 1);
        assert_eq!(service.shrink_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pending_state_is_visible_during_a_batch() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("w");
        let a = root.join("a.png");
        png(&a);
        let backend = SleepyBackend::new(vec![(a.clone(), Duration::from_millis(500))]);

        let compressor = ImageCompressor::new(
            config("", ""),
            MockShrinkService::accepting("good"),
            Arc::new(CollectingSink::new()),
        )
        .with_backends(uniform(backend));
        let session = compressor.open_session(&[root.clone()], None).await.unwrap();

        let keys = vec![key(&a)];
        let (report, during) = tokio::join!(compressor.compress_selected(session, &keys), async {
            tokio::time::sleep(Duration::from_millis(150)).await;
            compressor.snapshot(session).await.unwrap()
        });
        assert_eq!(during.state(&key(&a)), Some(CompressedState::Pending));
        assert_eq!(report.unwrap().stats.files_fulfilled, 1);
        let after = compressor.snapshot(session).await.unwrap();
        assert_eq!(after.state(&key(&a)), Some(CompressedState::Fulfilled));
    }

    #[tokio::test]
    async fn test_unknown_session_is_reported() {
        let compressor = ImageCompressor::new(
            config("", ""),
            MockShrinkService::accepting("good"),
            Arc::new(CollectingSink::new()),
        );
        let err = compressor.compress_selected(SessionId::new(), &[]).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unknown);
        compressor.close_session(SessionId::new()).await;
    }

    #[test]
    fn test_absolute_roots_normalizes() {
        let roots = absolute_roots(&[PathBuf::from("/a/./b/../c")]).unwrap();
        assert_eq!(roots, vec![PathBuf::from("/a/c")]);
    }
}
