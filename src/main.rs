use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::path::PathBuf;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Import modules from the library crate
use music_gen_gateway::audio::{AudioTranscoder, FfmpegTranscoder};
use music_gen_gateway::backend::BackendSet;
use music_gen_gateway::config;
use music_gen_gateway::generation::GenerationOrchestrator;
use music_gen_gateway::lifecycle::LifecycleController;
use music_gen_gateway::server::{
    metrics, run_server, RequestsLoggingLevel, ServerConfig, ServerState,
};
use music_gen_gateway::track_store::{SqliteTrackStore, TrackStore};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

fn parse_dir(s: &str) -> Result<PathBuf, String> {
    let path = parse_path(s)?;
    if !path.exists() {
        return Err(format!("Directory does not exist: {}", s));
    }
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", s));
    }
    Ok(path)
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding tracks.db and the uploads directory.
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_dir)]
    pub data_dir: Option<PathBuf>,

    /// Where generated audio is written. Defaults to <data-dir>/output.
    /// Must be visible to the model services at the same path.
    #[clap(long, value_parser = parse_path)]
    pub output_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Timeout in seconds for model load and unload calls.
    #[clap(long, default_value_t = config::DEFAULT_LOAD_TIMEOUT_SEC)]
    pub load_timeout_sec: u64,

    /// Timeout in seconds for generate, extend and remix calls.
    #[clap(long, default_value_t = config::DEFAULT_GENERATE_TIMEOUT_SEC)]
    pub generate_timeout_sec: u64,

    /// MP3 bitrate used when transcoding generated tracks.
    #[clap(long, default_value_t = config::DEFAULT_MP3_BITRATE_KBPS)]
    pub mp3_bitrate_kbps: u32,

    /// Maximum size of a remix upload, in megabytes.
    #[clap(long, default_value_t = config::DEFAULT_MAX_UPLOAD_MB)]
    pub max_upload_mb: usize,

    /// Serve every model from the built-in tone generator instead of its service.
    #[clap(long)]
    pub stub_backends: bool,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            data_dir: args.data_dir.clone(),
            output_dir: args.output_dir.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            frontend_dir_path: args.frontend_dir_path.clone(),
            load_timeout_sec: args.load_timeout_sec,
            generate_timeout_sec: args.generate_timeout_sec,
            mp3_bitrate_kbps: args.mp3_bitrate_kbps,
            max_upload_mb: args.max_upload_mb,
            stub_backends: args.stub_backends,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  data_dir: {:?}", app_config.data_dir);
    info!("  output_dir: {:?}", app_config.output_dir);
    info!("  port: {}", app_config.port);

    std::fs::create_dir_all(&app_config.output_dir)
        .with_context(|| format!("Failed to create output dir {:?}", app_config.output_dir))?;
    std::fs::create_dir_all(app_config.uploads_dir())
        .with_context(|| format!("Failed to create uploads dir {:?}", app_config.uploads_dir()))?;

    info!("Initializing metrics...");
    metrics::init_metrics();

    let registry = Arc::new(app_config.model_registry()?);
    for model in registry.list() {
        info!(
            "  model {} ({}) -> {} [{}]",
            model.id,
            model.display_name,
            model.base_url,
            model.kind.as_str()
        );
    }
    let backends = BackendSet::from_registry(&registry, app_config.backend_timeouts)?;
    let lifecycle = Arc::new(LifecycleController::new(registry, backends));

    if !app_config.tracks_db_path().exists() {
        info!(
            "Creating new tracks database at {:?}",
            app_config.tracks_db_path()
        );
    }
    let track_store: Arc<dyn TrackStore> =
        Arc::new(SqliteTrackStore::open(app_config.tracks_db_path())?);
    info!("{} tracks in store", track_store.count()?);

    let transcoder = FfmpegTranscoder::new(app_config.mp3_bitrate_kbps);
    if let Err(e) = transcoder.check_available().await {
        warn!("ffmpeg is not usable, tracks will be stored as WAV only: {}", e);
    }
    let transcoder: Arc<dyn AudioTranscoder> = Arc::new(transcoder);

    let orchestrator = Arc::new(GenerationOrchestrator::new(
        lifecycle.clone(),
        track_store.clone(),
        transcoder,
        app_config.output_dir.clone(),
    ));

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        port: app_config.port,
        metrics_port: app_config.metrics_port,
        frontend_dir_path: app_config.frontend_dir_path.clone(),
        uploads_dir: app_config.uploads_dir(),
        max_upload_bytes: app_config.max_upload_bytes,
    };
    let state = ServerState::new(server_config, lifecycle, orchestrator, track_store);

    tokio::select! {
        result = run_server(state) => {
            info!("HTTP server stopped: {:?}", result);
            result
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    }
}
