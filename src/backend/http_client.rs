//! HTTP client for a model-inference microservice.

use super::models::{BackendResponse, ExtendBody, GenerateBody, RemixBody};
use super::{AudioPayload, AudioResult, BackendError, BackendTimeouts, GenerationParams};
use super::ModelBackend;
use crate::registry::ModelDescriptor;
use crate::server::metrics;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Talks to one model service at `base_url`.
pub struct HttpModelBackend {
    client: Client,
    model_id: String,
    base_url: String,
    timeouts: BackendTimeouts,
}

impl HttpModelBackend {
    pub fn new(descriptor: &ModelDescriptor, timeouts: BackendTimeouts) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            model_id: descriptor.id.clone(),
            base_url: descriptor.base_url.trim_end_matches('/').to_string(),
            timeouts,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn map_send_error(&self, e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::Timeout {
                model: self.model_id.clone(),
            }
        } else {
            BackendError::Connection {
                model: self.model_id.clone(),
                message: e.to_string(),
            }
        }
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
        timeout: Duration,
    ) -> Result<reqwest::Response, BackendError> {
        let url = self.url(path);
        debug!(model = %self.model_id, url = %url, "Calling model backend");

        let mut request = self.client.post(&url).timeout(timeout);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<BackendResponse>(&text)
                .ok()
                .and_then(|parsed| parsed.cause().map(str::to_string))
                .unwrap_or(text);
            warn!(
                model = %self.model_id,
                status = status.as_u16(),
                message = %message,
                "Model backend returned error status"
            );
            return Err(BackendError::Status {
                model: self.model_id.clone(),
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    /// Load and unload only need a success status; a JSON body with
    /// `success: false` is still treated as a refusal.
    async fn control(&self, path: &str) -> Result<(), BackendError> {
        let response = self
            .post::<()>(path, None, self.timeouts.control)
            .await?;
        let text = response.text().await.map_err(|e| self.map_send_error(e))?;
        if let Ok(parsed) = serde_json::from_str::<BackendResponse>(&text) {
            if parsed.success == Some(false) {
                return Err(BackendError::Rejected {
                    model: self.model_id.clone(),
                    message: parsed.cause().unwrap_or("no reason given").to_string(),
                });
            }
        }
        Ok(())
    }

    async fn generation<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        requested_output: &Path,
    ) -> Result<AudioResult, BackendError> {
        let response = self
            .post(path, Some(body), self.timeouts.generation)
            .await?;

        let is_audio = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("audio/") || v.starts_with("application/octet-stream"))
            .unwrap_or(false);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if is_audio {
            if bytes.is_empty() {
                return Err(self.invalid("empty audio body"));
            }
            return Ok(AudioResult {
                payload: AudioPayload::Inline(bytes.to_vec()),
                duration_secs: None,
                response: serde_json::Value::Null,
            });
        }

        let value: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| self.invalid(&format!("body is not JSON: {}", e)))?;
        let parsed: BackendResponse = serde_json::from_value(value.clone())
            .map_err(|e| self.invalid(&format!("unexpected JSON shape: {}", e)))?;

        match parsed.success {
            Some(true) => {}
            Some(false) => {
                return Err(BackendError::Rejected {
                    model: self.model_id.clone(),
                    message: parsed.cause().unwrap_or("no reason given").to_string(),
                })
            }
            None => return Err(self.invalid("missing success field")),
        }

        let output = parsed
            .output_path
            .map(PathBuf::from)
            .unwrap_or_else(|| requested_output.to_path_buf());

        Ok(AudioResult {
            payload: AudioPayload::File(output),
            duration_secs: parsed.duration,
            response: value,
        })
    }

    fn invalid(&self, message: &str) -> BackendError {
        BackendError::InvalidResponse {
            model: self.model_id.clone(),
            message: message.to_string(),
        }
    }

    fn record<T>(&self, operation: &str, started: Instant, result: &Result<T, BackendError>) {
        let outcome = match result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        metrics::record_backend_call(&self.model_id, operation, outcome, started.elapsed());
    }
}

#[async_trait]
impl ModelBackend for HttpModelBackend {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn load(&self) -> Result<(), BackendError> {
        let started = Instant::now();
        let result = self.control("/load").await;
        self.record("load", started, &result);
        result
    }

    async fn unload(&self) -> Result<(), BackendError> {
        let started = Instant::now();
        let result = self.control("/unload").await;
        self.record("unload", started, &result);
        result
    }

    async fn generate(&self, params: &GenerationParams) -> Result<AudioResult, BackendError> {
        let started = Instant::now();
        let body = GenerateBody::from(params);
        let result = self
            .generation("/generate", &body, &params.output_path)
            .await;
        self.record("generate", started, &result);
        result
    }

    async fn extend(
        &self,
        params: &GenerationParams,
        source: &Path,
        extend_duration_secs: f64,
    ) -> Result<AudioResult, BackendError> {
        let started = Instant::now();
        let source = source.to_string_lossy().to_string();
        let body = ExtendBody {
            base: GenerateBody::from(params),
            source_path: source.clone(),
            source_track_path: source,
            extend_duration: extend_duration_secs,
        };
        let result = self
            .generation("/generate/extend", &body, &params.output_path)
            .await;
        self.record("extend", started, &result);
        result
    }

    async fn remix(
        &self,
        params: &GenerationParams,
        source: &Path,
    ) -> Result<AudioResult, BackendError> {
        let started = Instant::now();
        let source = source.to_string_lossy().to_string();
        let body = RemixBody {
            base: GenerateBody::from(params),
            source_path: source.clone(),
            source_track_path: source,
            is_remix: true,
        };
        let result = self
            .generation("/generate/remix", &body, &params.output_path)
            .await;
        self.record("remix", started, &result);
        result
    }
}
