//! WAV to MP3 transcoding with ffmpeg/ffprobe.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("ffprobe failed: {0}")]
    ProbeFailed(String),

    #[error("ffmpeg failed: {0}")]
    ConversionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid output: {0}")]
    InvalidOutput(String),
}

#[async_trait]
pub trait AudioTranscoder: Send + Sync {
    /// Encode `wav` as MP3 at `mp3`, overwriting it.
    async fn to_mp3(&self, wav: &Path, mp3: &Path) -> Result<(), ConversionError>;

    /// Duration of an audio file in seconds.
    async fn probe_duration(&self, path: &Path) -> Result<f64, ConversionError>;
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    bitrate_kbps: u32,
    ffmpeg_bin: String,
    ffprobe_bin: String,
}

impl FfmpegTranscoder {
    pub fn new(bitrate_kbps: u32) -> Self {
        Self {
            bitrate_kbps,
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
        }
    }

    pub fn with_binaries(mut self, ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        self.ffmpeg_bin = ffmpeg.into();
        self.ffprobe_bin = ffprobe.into();
        self
    }

    /// Check that both binaries can be executed.
    pub async fn check_available(&self) -> Result<(), ConversionError> {
        if !runs(&self.ffprobe_bin).await {
            return Err(ConversionError::ProbeFailed(format!(
                "{} not found or not working",
                self.ffprobe_bin
            )));
        }
        if !runs(&self.ffmpeg_bin).await {
            return Err(ConversionError::ConversionFailed(format!(
                "{} not found or not working",
                self.ffmpeg_bin
            )));
        }
        Ok(())
    }
}

async fn runs(bin: &str) -> bool {
    Command::new(bin)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

#[async_trait]
impl AudioTranscoder for FfmpegTranscoder {
    async fn to_mp3(&self, wav: &Path, mp3: &Path) -> Result<(), ConversionError> {
        if let Some(parent) = mp3.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let output = Command::new(&self.ffmpeg_bin)
            .arg("-i")
            .arg(wav)
            .args([
                "-c:a",
                "libmp3lame",
                "-b:a",
                &format!("{}k", self.bitrate_kbps),
                "-vn",
                "-y",
            ])
            .arg(mp3)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConversionError::ConversionFailed(stderr.to_string()));
        }

        let size = tokio::fs::metadata(mp3).await?.len();
        if size == 0 {
            return Err(ConversionError::InvalidOutput(format!(
                "{} is empty",
                mp3.display()
            )));
        }
        Ok(())
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64, ConversionError> {
        let output = Command::new(&self.ffprobe_bin)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConversionError::ProbeFailed(stderr.to_string()));
        }

        let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| ConversionError::InvalidOutput(format!("JSON parse error: {}", e)))?;
        probe
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .ok_or_else(|| ConversionError::InvalidOutput("no duration reported".to_string()))
    }
}
