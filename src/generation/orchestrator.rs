use super::prompt;
use super::GatewayError;
use crate::audio::AudioTranscoder;
use crate::backend::{AudioPayload, AudioResult, GenerationParams};
use crate::lifecycle::{LifecycleController, LifecycleError};
use crate::server::metrics;
use crate::track_store::{AudioFormat, Track, TrackKind, TrackStore};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_EXTEND_SECONDS: f64 = 30.0;

#[derive(Debug, Clone)]
pub struct GenerateCommand {
    pub model_id: String,
    pub prompt: String,
    pub style: Option<String>,
    pub has_vocals: bool,
    pub duration_secs: Option<f64>,
}

/// Unset fields are inherited from the source track.
#[derive(Debug, Clone)]
pub struct ExtendCommand {
    pub track_id: Uuid,
    pub model_id: String,
    pub extra_duration_secs: Option<f64>,
    pub prompt: Option<String>,
    pub style: Option<String>,
    pub has_vocals: Option<bool>,
}

#[derive(Debug, Clone)]
pub enum RemixSource {
    Track(Uuid),
    /// A file uploaded by the caller and saved by the gateway. It is removed
    /// once the remix finishes, whatever the outcome.
    Upload(PathBuf),
}

#[derive(Debug, Clone)]
pub struct RemixCommand {
    pub source: RemixSource,
    pub model_id: String,
    pub prompt: String,
    pub style: Option<String>,
    pub has_vocals: bool,
    pub duration_secs: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct RemixOutcome {
    pub track: Track,
    /// False when the model cannot condition on audio and the remix was
    /// produced from the prompt alone.
    pub audio_conditioned: bool,
    pub backend_response: serde_json::Value,
}

/// Provenance of a track being produced.
struct Draft {
    id: Uuid,
    model_id: String,
    prompt: String,
    style: Option<String>,
    has_vocals: bool,
    kind: TrackKind,
    source_track_id: Option<Uuid>,
}

pub struct GenerationOrchestrator {
    lifecycle: Arc<LifecycleController>,
    store: Arc<dyn TrackStore>,
    transcoder: Arc<dyn AudioTranscoder>,
    output_dir: PathBuf,
}

impl GenerationOrchestrator {
    pub fn new(
        lifecycle: Arc<LifecycleController>,
        store: Arc<dyn TrackStore>,
        transcoder: Arc<dyn AudioTranscoder>,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            lifecycle,
            store,
            transcoder,
            output_dir,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn wav_path(&self, id: &Uuid) -> PathBuf {
        self.output_dir.join(format!("{}.wav", id))
    }

    pub fn mp3_path(&self, id: &Uuid) -> PathBuf {
        self.output_dir.join(format!("{}.mp3", id))
    }

    pub async fn generate(&self, command: GenerateCommand) -> Result<Track, GatewayError> {
        let content = required_prompt(&command.prompt)?;
        check_duration(command.duration_secs)?;
        let lease = self.lifecycle.acquire(&command.model_id)?;
        let backend = self.lifecycle.backend(&command.model_id)?;

        let draft = Draft {
            id: Uuid::new_v4(),
            model_id: command.model_id,
            prompt: content.to_string(),
            style: non_empty(command.style),
            has_vocals: command.has_vocals,
            kind: TrackKind::Generate,
            source_track_id: None,
        };
        let params = self.params(
            &draft,
            prompt::compose(&draft.prompt, draft.style.as_deref(), draft.has_vocals),
            command.duration_secs,
        );

        info!(track_id = %draft.id, model = %draft.model_id, "Generating track");
        let result = backend.generate(&params).await;
        drop(lease);
        let result = self.settle(result, &params.output_path).await?;

        let reported = result.duration_secs;
        self.finish(draft, reported).await
    }

    pub async fn extend(&self, command: ExtendCommand) -> Result<Track, GatewayError> {
        let source = self
            .load_track(&command.track_id)?
            .ok_or_else(|| {
                GatewayError::NotFound(format!("Track {} not found", command.track_id))
            })?;
        if !self.lifecycle.registry().contains(&command.model_id) {
            return Err(GatewayError::NotFound(format!(
                "Unknown model: {}",
                command.model_id
            )));
        }
        let lease = self.lifecycle.acquire(&command.model_id)?;
        let backend = self.lifecycle.backend(&command.model_id)?;

        let source_wav = existing_audio(&source, AudioFormat::Wav).await.ok_or_else(|| {
            GatewayError::NotFound(format!("Audio for track {} is missing", source.id))
        })?;
        let extra = command.extra_duration_secs.unwrap_or(DEFAULT_EXTEND_SECONDS);
        check_duration(Some(extra))?;

        let draft = Draft {
            id: Uuid::new_v4(),
            model_id: command.model_id,
            prompt: non_empty(command.prompt).unwrap_or_else(|| source.prompt.clone()),
            style: non_empty(command.style).or_else(|| source.style.clone()),
            has_vocals: command.has_vocals.unwrap_or(source.has_vocals),
            kind: TrackKind::Extend,
            source_track_id: Some(source.id),
        };
        let params = self.params(
            &draft,
            prompt::compose_extension(&draft.prompt, draft.style.as_deref(), draft.has_vocals),
            None,
        );

        info!(
            track_id = %draft.id,
            source = %source.id,
            model = %draft.model_id,
            extra_secs = extra,
            "Extending track"
        );
        let result = backend.extend(&params, &source_wav, extra).await;
        drop(lease);
        let result = self.settle(result, &params.output_path).await?;

        let duration = source
            .duration_seconds
            .map(|d| d + extra)
            .or(result.duration_secs)
            .or(Some(extra));
        self.finish(draft, duration).await
    }

    /// Fails when `model_id` is unknown or is not the loaded model. Lets
    /// callers reject a request before doing work for it.
    pub fn ensure_ready(&self, model_id: &str) -> Result<(), GatewayError> {
        self.lifecycle
            .registry()
            .resolve(model_id)
            .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
        if !self.lifecycle.is_loaded(model_id) {
            return Err(LifecycleError::NotLoaded(model_id.to_string()).into());
        }
        Ok(())
    }

    pub async fn remix(&self, command: RemixCommand) -> Result<RemixOutcome, GatewayError> {
        let upload = match &command.source {
            RemixSource::Upload(path) => Some(path.clone()),
            RemixSource::Track(_) => None,
        };
        let outcome = self.run_remix(command).await;
        if let Some(path) = upload {
            remove_quietly(&path).await;
        }
        outcome
    }

    async fn run_remix(&self, command: RemixCommand) -> Result<RemixOutcome, GatewayError> {
        let content = required_prompt(&command.prompt)?;
        check_duration(command.duration_secs)?;
        let descriptor = self
            .lifecycle
            .registry()
            .resolve(&command.model_id)
            .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?
            .clone();

        let (source_path, source_track_id) = match &command.source {
            RemixSource::Track(id) => {
                let track = self
                    .load_track(id)?
                    .ok_or_else(|| GatewayError::NotFound(format!("Track {} not found", id)))?;
                let path = existing_audio(&track, AudioFormat::Wav).await.ok_or_else(|| {
                    GatewayError::NotFound(format!("Audio for track {} is missing", id))
                })?;
                (path, Some(track.id))
            }
            RemixSource::Upload(path) => {
                if !non_empty_file(path).await {
                    return Err(GatewayError::InvalidRequest(
                        "Uploaded source audio is empty".to_string(),
                    ));
                }
                (path.clone(), None)
            }
        };

        let lease = self.lifecycle.acquire(&descriptor.id)?;
        let backend = self.lifecycle.backend(&descriptor.id)?;

        let draft = Draft {
            id: Uuid::new_v4(),
            model_id: descriptor.id.clone(),
            prompt: content.to_string(),
            style: non_empty(command.style),
            has_vocals: command.has_vocals,
            kind: TrackKind::Remix,
            source_track_id,
        };
        let params = self.params(
            &draft,
            prompt::compose_remix(&draft.prompt, draft.style.as_deref(), draft.has_vocals),
            command.duration_secs,
        );

        let audio_conditioned = descriptor.supports_audio_conditioning;
        let result = if audio_conditioned {
            info!(track_id = %draft.id, model = %draft.model_id, "Remixing audio");
            backend.remix(&params, &source_path).await
        } else {
            info!(
                track_id = %draft.id,
                model = %draft.model_id,
                "Model cannot condition on audio, remixing from prompt only"
            );
            backend.generate(&params).await
        };
        drop(lease);
        let result = self.settle(result, &params.output_path).await?;

        let reported = result.duration_secs;
        let track = self.finish(draft, reported).await?;
        Ok(RemixOutcome {
            track,
            audio_conditioned,
            backend_response: result.response,
        })
    }

    fn params(&self, draft: &Draft, composed: String, duration: Option<f64>) -> GenerationParams {
        GenerationParams {
            prompt: composed,
            content_prompt: draft.prompt.clone(),
            style_prompt: draft.style.clone(),
            has_vocals: draft.has_vocals,
            output_path: self.wav_path(&draft.id),
            duration_secs: duration,
        }
    }

    fn load_track(&self, id: &Uuid) -> Result<Option<Track>, GatewayError> {
        self.store
            .get(id)
            .map_err(|e| GatewayError::Persistence(e.to_string()))
    }

    /// Turn a backend result into a verified WAV file at `wav`. On any
    /// failure the partial output is removed.
    async fn settle(
        &self,
        result: Result<AudioResult, crate::backend::BackendError>,
        wav: &Path,
    ) -> Result<AudioResult, GatewayError> {
        let result = match result {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Backend call failed");
                remove_quietly(wav).await;
                return Err(e.into());
            }
        };

        if let Err(e) = materialize(&result.payload, wav, &self.output_dir).await {
            remove_quietly(wav).await;
            return Err(e);
        }
        Ok(result)
    }

    async fn finish(&self, draft: Draft, duration: Option<f64>) -> Result<Track, GatewayError> {
        let wav = self.wav_path(&draft.id);
        let mp3 = self.mp3_path(&draft.id);

        let mut audio_locations = BTreeMap::new();
        audio_locations.insert(AudioFormat::Wav, wav.clone());
        let transcode_failed = match self.transcoder.to_mp3(&wav, &mp3).await {
            Ok(()) => {
                audio_locations.insert(AudioFormat::Mp3, mp3.clone());
                false
            }
            Err(e) => {
                warn!(track_id = %draft.id, error = %e, "MP3 transcoding failed, keeping WAV only");
                remove_quietly(&mp3).await;
                true
            }
        };

        let duration_seconds = match duration {
            Some(d) => Some(d),
            None => match self.transcoder.probe_duration(&wav).await {
                Ok(d) => Some(d),
                Err(e) => {
                    debug!(track_id = %draft.id, error = %e, "Could not probe duration");
                    None
                }
            },
        };

        let track = Track {
            id: draft.id,
            model_id: draft.model_id,
            prompt: draft.prompt,
            style: draft.style,
            has_vocals: draft.has_vocals,
            kind: draft.kind,
            created_at: chrono::Utc::now().timestamp_millis(),
            audio_locations,
            transcode_failed,
            source_track_id: draft.source_track_id,
            duration_seconds,
        };

        if let Err(e) = self.store.insert(&track) {
            warn!(track_id = %track.id, error = %e, "Failed to store track, discarding audio");
            remove_quietly(&wav).await;
            remove_quietly(&mp3).await;
            return Err(GatewayError::Persistence(e.to_string()));
        }

        metrics::record_track_generated(&track.model_id, track.kind.as_str());
        info!(track_id = %track.id, model = %track.model_id, kind = track.kind.as_str(), "Track stored");
        Ok(track)
    }
}

fn required_prompt(prompt: &str) -> Result<&str, GatewayError> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(GatewayError::InvalidRequest("Missing prompt".to_string()));
    }
    Ok(prompt)
}

fn check_duration(duration: Option<f64>) -> Result<(), GatewayError> {
    match duration {
        Some(d) if !d.is_finite() || d <= 0.0 => Err(GatewayError::InvalidRequest(format!(
            "Invalid duration: {}",
            d
        ))),
        _ => Ok(()),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn non_empty_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

async fn existing_audio(track: &Track, format: AudioFormat) -> Option<PathBuf> {
    let path = track.audio_path(format)?;
    if non_empty_file(path).await {
        Some(path.to_path_buf())
    } else {
        None
    }
}

/// Both paths must exist. Symlinks are resolved before comparing.
async fn is_within(path: &Path, dir: &Path) -> bool {
    match (
        tokio::fs::canonicalize(path).await,
        tokio::fs::canonicalize(dir).await,
    ) {
        (Ok(path), Ok(dir)) => path.starts_with(dir),
        _ => false,
    }
}

/// Declared files are only accepted from inside `output_dir`.
async fn materialize(
    payload: &AudioPayload,
    wav: &Path,
    output_dir: &Path,
) -> Result<(), GatewayError> {
    match payload {
        AudioPayload::Inline(bytes) => {
            if bytes.is_empty() {
                return Err(GatewayError::Verification(
                    "backend returned no audio".to_string(),
                ));
            }
            tokio::fs::write(wav, bytes).await?;
        }
        AudioPayload::File(declared) => {
            if !non_empty_file(declared).await {
                return Err(GatewayError::Verification(format!(
                    "{} is missing or empty",
                    declared.display()
                )));
            }
            if !is_within(declared, output_dir).await {
                return Err(GatewayError::Verification(format!(
                    "{} is outside the output directory",
                    declared.display()
                )));
            }
            if declared != wav {
                tokio::fs::copy(declared, wav).await?;
            }
        }
    }
    Ok(())
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove file");
        }
    }
}
