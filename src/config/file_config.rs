use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub data_dir: Option<String>,
    pub output_dir: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub frontend_dir_path: Option<String>,

    // Backend calls
    pub load_timeout_sec: Option<u64>,
    pub generate_timeout_sec: Option<u64>,
    pub stub_backends: Option<bool>,

    // Artifacts
    pub mp3_bitrate_kbps: Option<u32>,
    pub max_upload_mb: Option<usize>,

    /// Replaces the built-in model list when present.
    pub models: Option<Vec<ModelConfig>>,
}

/// One `[[models]]` entry.
#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub id: String,
    pub name: Option<String>,
    pub url: Option<String>,
    /// "http" (default) or "stub".
    pub kind: Option<String>,
    #[serde(default)]
    pub supports_audio_conditioning: bool,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
