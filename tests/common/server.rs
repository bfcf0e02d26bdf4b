//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated gateway with its own database, output
//! directory and mock model services.

use super::constants::*;
use super::mock_backend::MockModelService;
use async_trait::async_trait;
use music_gen_gateway::audio::{AudioTranscoder, ConversionError};
use music_gen_gateway::backend::{BackendSet, BackendTimeouts};
use music_gen_gateway::generation::GenerationOrchestrator;
use music_gen_gateway::lifecycle::LifecycleController;
use music_gen_gateway::registry::{BackendKind, ModelDescriptor, ModelRegistry};
use music_gen_gateway::server::{make_app, RequestsLoggingLevel, ServerConfig, ServerState};
use music_gen_gateway::track_store::{SqliteTrackStore, TrackStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Stands in for ffmpeg: the "mp3" is a copy of the WAV.
struct CopyTranscoder;

#[async_trait]
impl AudioTranscoder for CopyTranscoder {
    async fn to_mp3(&self, wav: &Path, mp3: &Path) -> Result<(), ConversionError> {
        tokio::fs::copy(wav, mp3).await?;
        Ok(())
    }

    async fn probe_duration(&self, _path: &Path) -> Result<f64, ConversionError> {
        Ok(MOCK_DURATION_SECS)
    }
}

/// Test server instance with isolated storage and model services
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Service behind `HTTP_MODEL_ID`
    pub gen_service: MockModelService,

    /// Service behind `REMIX_MODEL_ID`
    pub remix_service: MockModelService,

    /// Track store for direct database access in tests
    pub track_store: Arc<dyn TrackStore>,

    /// Where generated audio lands
    pub output_dir: PathBuf,

    /// Where remix uploads are saved
    pub uploads_dir: PathBuf,

    // Private fields - keep resources alive until drop
    _temp_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port
    ///
    /// This function:
    /// 1. Starts two mock model services
    /// 2. Creates a temporary data directory with a fresh tracks database
    /// 3. Builds a registry with both mock models and a stub model
    /// 4. Binds to a random port (127.0.0.1:0)
    /// 5. Spawns the server in a background task
    /// 6. Waits for the server to be ready
    pub async fn spawn() -> Self {
        let gen_service = MockModelService::spawn().await;
        let remix_service = MockModelService::spawn().await;

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let output_dir = temp_dir.path().join("output");
        let uploads_dir = temp_dir.path().join("uploads");
        std::fs::create_dir_all(&output_dir).expect("Failed to create output dir");

        let registry = Arc::new(
            ModelRegistry::new(vec![
                ModelDescriptor::new(HTTP_MODEL_ID, "Mock Generator", gen_service.url.clone()),
                ModelDescriptor::new(REMIX_MODEL_ID, "Mock Remixer", remix_service.url.clone())
                    .with_audio_conditioning(true),
                ModelDescriptor::new(STUB_MODEL_ID, "Tone", "").with_kind(BackendKind::Stub),
            ])
            .expect("Failed to build registry"),
        );
        let timeouts = BackendTimeouts {
            control: Duration::from_secs(5),
            generation: Duration::from_secs(10),
        };
        let backends =
            BackendSet::from_registry(&registry, timeouts).expect("Failed to build backends");
        let lifecycle = Arc::new(LifecycleController::new(registry, backends));

        let track_store: Arc<dyn TrackStore> = Arc::new(
            SqliteTrackStore::open(temp_dir.path().join("tracks.db"))
                .expect("Failed to open track store"),
        );
        let orchestrator = Arc::new(GenerationOrchestrator::new(
            lifecycle.clone(),
            track_store.clone(),
            Arc::new(CopyTranscoder),
            output_dir.clone(),
        ));

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            uploads_dir: uploads_dir.clone(),
            ..ServerConfig::default()
        };
        let state = ServerState::new(config, lifecycle, orchestrator, track_store.clone());
        let app = make_app(state);

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        // Wait for server to be ready
        let server = Self {
            base_url,
            port,
            gen_service,
            remix_service,
            track_store,
            output_dir,
            uploads_dir,
            _temp_dir: temp_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => {
                    // Server is ready
                    return;
                }
                _ => {
                    // Server not ready yet, wait and retry
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        // TempDir will be cleaned up automatically
    }
}
