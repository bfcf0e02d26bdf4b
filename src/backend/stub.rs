//! In-process backend that writes a sine tone instead of running a model.
//!
//! Used for local development and tests where no model service is running.

use super::{AudioPayload, AudioResult, BackendError, GenerationParams, ModelBackend};
use async_trait::async_trait;
use std::f32::consts::PI;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

const SAMPLE_RATE: u32 = 32_000;
const DEFAULT_SECONDS: f64 = 2.0;
const MAX_SECONDS: f64 = 30.0;

pub struct StubModelBackend {
    model_id: String,
    loaded: AtomicBool,
}

impl StubModelBackend {
    pub fn new(model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            loaded: AtomicBool::new(false),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    fn failure(&self, e: impl std::fmt::Display) -> BackendError {
        BackendError::Rejected {
            model: self.model_id.clone(),
            message: e.to_string(),
        }
    }

    async fn synthesize(
        &self,
        prompt: &str,
        prefix: Option<PathBuf>,
        seconds: f64,
        output: PathBuf,
    ) -> Result<AudioResult, BackendError> {
        let frequency = tone_for(prompt);
        let seconds = seconds.clamp(0.1, MAX_SECONDS);
        debug!(model = %self.model_id, frequency, seconds, "Synthesizing stub tone");

        let written = output.clone();
        let total = tokio::task::spawn_blocking(move || {
            write_tone(prefix.as_deref(), &written, frequency, seconds)
        })
        .await
        .map_err(|e| self.failure(e))?
        .map_err(|e| self.failure(e))?;

        Ok(AudioResult {
            payload: AudioPayload::File(output.clone()),
            duration_secs: Some(total),
            response: serde_json::json!({
                "success": true,
                "duration": total,
                "outputPath": output.to_string_lossy(),
            }),
        })
    }
}

/// Map a prompt to a pitch between 220 and 660 Hz so different prompts sound different.
fn tone_for(prompt: &str) -> f32 {
    let sum: u32 = prompt.bytes().map(u32::from).sum();
    220.0 + (sum % 440) as f32
}

/// Write a mono 16-bit tone to `output`, preceded by the samples of `prefix`
/// when given. Returns the total duration in seconds.
fn write_tone(
    prefix: Option<&Path>,
    output: &Path,
    frequency: f32,
    seconds: f64,
) -> Result<f64, hound::Error> {
    let mut samples: Vec<i16> = Vec::new();
    let mut spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    if let Some(prefix) = prefix {
        let mut reader = hound::WavReader::open(prefix)?;
        spec = reader.spec();
        samples = reader.samples::<i16>().collect::<Result<Vec<_>, _>>()?;
    }

    let channels = spec.channels as usize;
    let frames = (seconds * spec.sample_rate as f64) as usize;
    for n in 0..frames {
        let t = n as f32 / spec.sample_rate as f32;
        let value = ((2.0 * PI * frequency * t).sin() * 0.3 * i16::MAX as f32) as i16;
        for _ in 0..channels {
            samples.push(value);
        }
    }

    let mut writer = hound::WavWriter::create(output, spec)?;
    for sample in &samples {
        writer.write_sample(*sample)?;
    }
    writer.finalize()?;

    Ok(samples.len() as f64 / channels as f64 / spec.sample_rate as f64)
}

#[async_trait]
impl ModelBackend for StubModelBackend {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn load(&self) -> Result<(), BackendError> {
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn unload(&self) -> Result<(), BackendError> {
        self.loaded.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn generate(&self, params: &GenerationParams) -> Result<AudioResult, BackendError> {
        self.synthesize(
            &params.prompt,
            None,
            params.duration_secs.unwrap_or(DEFAULT_SECONDS),
            params.output_path.clone(),
        )
        .await
    }

    async fn extend(
        &self,
        params: &GenerationParams,
        source: &Path,
        extend_duration_secs: f64,
    ) -> Result<AudioResult, BackendError> {
        self.synthesize(
            &params.prompt,
            Some(source.to_path_buf()),
            extend_duration_secs,
            params.output_path.clone(),
        )
        .await
    }

    async fn remix(
        &self,
        params: &GenerationParams,
        _source: &Path,
    ) -> Result<AudioResult, BackendError> {
        self.generate(params).await
    }
}
