mod file_config;

pub use file_config::{FileConfig, ModelConfig};

use crate::backend::BackendTimeouts;
use crate::registry::{default_models, BackendKind, ModelDescriptor, ModelRegistry};
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LOAD_TIMEOUT_SEC: u64 = 120;
pub const DEFAULT_GENERATE_TIMEOUT_SEC: u64 = 900;
pub const DEFAULT_MP3_BITRATE_KBPS: u32 = 192;
pub const DEFAULT_MAX_UPLOAD_MB: usize = 100;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub data_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub load_timeout_sec: u64,
    pub generate_timeout_sec: u64,
    pub mp3_bitrate_kbps: u32,
    pub max_upload_mb: usize,
    pub stub_backends: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub backend_timeouts: BackendTimeouts,
    pub mp3_bitrate_kbps: u32,
    pub max_upload_bytes: usize,
    pub models: Vec<ModelDescriptor>,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .or_else(|| cli.data_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("data_dir must be specified via --data-dir or in config file")
            })?;

        if !data_dir.exists() {
            bail!("Data directory does not exist: {:?}", data_dir);
        }
        if !data_dir.is_dir() {
            bail!("data_dir is not a directory: {:?}", data_dir);
        }
        let data_dir = data_dir
            .canonicalize()
            .with_context(|| format!("Failed to resolve data_dir {:?}", data_dir))?;

        // Sent to the model services as-is, so it must not depend on their
        // working directory.
        let output_dir = match file
            .output_dir
            .map(PathBuf::from)
            .or_else(|| cli.output_dir.clone())
        {
            Some(dir) => absolute(dir)?,
            None => data_dir.join("output"),
        };

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);
        if port == metrics_port {
            bail!("port and metrics_port must differ (both {})", port);
        }

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        let load_timeout_sec = file.load_timeout_sec.unwrap_or(cli.load_timeout_sec);
        let generate_timeout_sec = file
            .generate_timeout_sec
            .unwrap_or(cli.generate_timeout_sec);
        if load_timeout_sec == 0 || generate_timeout_sec == 0 {
            bail!("Backend timeouts must be greater than zero");
        }

        let mp3_bitrate_kbps = file.mp3_bitrate_kbps.unwrap_or(cli.mp3_bitrate_kbps);
        let max_upload_mb = file.max_upload_mb.unwrap_or(cli.max_upload_mb);
        let stub_backends = file.stub_backends.unwrap_or(cli.stub_backends);

        let mut models = match file.models {
            Some(entries) => entries
                .into_iter()
                .map(model_descriptor)
                .collect::<Result<Vec<_>>>()?,
            None => default_models(),
        };
        if stub_backends {
            for model in models.iter_mut() {
                model.kind = BackendKind::Stub;
            }
        }

        Ok(Self {
            data_dir,
            output_dir,
            port,
            metrics_port,
            logging_level,
            frontend_dir_path,
            backend_timeouts: BackendTimeouts {
                control: Duration::from_secs(load_timeout_sec),
                generation: Duration::from_secs(generate_timeout_sec),
            },
            mp3_bitrate_kbps,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            models,
        })
    }

    pub fn tracks_db_path(&self) -> PathBuf {
        self.data_dir.join("tracks.db")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    pub fn model_registry(&self) -> Result<ModelRegistry> {
        ModelRegistry::new(self.models.clone()).context("Invalid model configuration")
    }
}

fn absolute(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path);
    }
    let cwd = std::env::current_dir().context("Failed to read the working directory")?;
    Ok(cwd.join(path))
}

fn model_descriptor(entry: ModelConfig) -> Result<ModelDescriptor> {
    let kind = match entry.kind.as_deref() {
        None => BackendKind::Http,
        Some(s) => BackendKind::parse(s)
            .with_context(|| format!("Unknown backend kind {:?} for model {}", s, entry.id))?,
    };
    let name = entry.name.unwrap_or_else(|| entry.id.clone());
    Ok(ModelDescriptor::new(entry.id, name, entry.url.unwrap_or_default())
        .with_kind(kind)
        .with_audio_conditioning(entry.supports_audio_conditioning))
}

fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
