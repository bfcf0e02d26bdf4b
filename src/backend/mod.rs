//! Clients for the model-inference microservices.
//!
//! Every backend exposes the same verbs (load, unload, generate, extend,
//! remix). [`ModelBackend`] is the seam the lifecycle controller and the
//! orchestrator talk to; [`HttpModelBackend`] speaks to a real service and
//! [`StubModelBackend`] synthesizes a tone locally.

mod http_client;
pub mod models;
mod stub;

pub use http_client::HttpModelBackend;
pub use stub::StubModelBackend;

use crate::registry::{BackendKind, ModelRegistry};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Errors reported by a backend call. None of them are retried.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Connection to {model} failed: {message}")]
    Connection { model: String, message: String },

    #[error("Request to {model} timed out")]
    Timeout { model: String },

    #[error("{model} responded with status {status}: {message}")]
    Status {
        model: String,
        status: u16,
        message: String,
    },

    #[error("{model} reported failure: {message}")]
    Rejected { model: String, message: String },

    #[error("Invalid response from {model}: {message}")]
    InvalidResponse { model: String, message: String },
}

impl BackendError {
    pub fn model(&self) -> &str {
        match self {
            BackendError::Connection { model, .. }
            | BackendError::Timeout { model }
            | BackendError::Status { model, .. }
            | BackendError::Rejected { model, .. }
            | BackendError::InvalidResponse { model, .. } => model,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::Connection { .. } => "connection",
            BackendError::Timeout { .. } => "timeout",
            BackendError::Status { .. } => "status",
            BackendError::Rejected { .. } => "rejected",
            BackendError::InvalidResponse { .. } => "invalid_response",
        }
    }
}

/// Parameters shared by generate, extend and remix.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    /// Prompt composed by the gateway from content, style and vocals.
    pub prompt: String,
    /// Raw content prompt as given by the caller.
    pub content_prompt: String,
    pub style_prompt: Option<String>,
    pub has_vocals: bool,
    /// Where the backend is asked to write the WAV file.
    pub output_path: PathBuf,
    /// Requested length, for backends that accept one.
    pub duration_secs: Option<f64>,
}

/// Audio produced by a backend.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioPayload {
    /// Raw audio bytes returned in the response body.
    Inline(Vec<u8>),
    /// A file the backend claims to have written. Must be verified by the caller.
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioResult {
    pub payload: AudioPayload,
    /// Duration reported by the backend, advisory only.
    pub duration_secs: Option<f64>,
    /// The backend's JSON response, `Null` for inline audio.
    pub response: serde_json::Value,
}

#[async_trait]
pub trait ModelBackend: Send + Sync {
    fn model_id(&self) -> &str;

    async fn load(&self) -> Result<(), BackendError>;

    async fn unload(&self) -> Result<(), BackendError>;

    async fn generate(&self, params: &GenerationParams) -> Result<AudioResult, BackendError>;

    async fn extend(
        &self,
        params: &GenerationParams,
        source: &Path,
        extend_duration_secs: f64,
    ) -> Result<AudioResult, BackendError>;

    async fn remix(
        &self,
        params: &GenerationParams,
        source: &Path,
    ) -> Result<AudioResult, BackendError>;
}

#[derive(Debug, Clone, Copy)]
pub struct BackendTimeouts {
    /// Used for load and unload.
    pub control: Duration,
    /// Used for generate, extend and remix.
    pub generation: Duration,
}

impl Default for BackendTimeouts {
    fn default() -> Self {
        Self {
            control: Duration::from_secs(120),
            generation: Duration::from_secs(900),
        }
    }
}

/// One client per registered model, keyed by model id.
#[derive(Clone, Default)]
pub struct BackendSet {
    backends: HashMap<String, Arc<dyn ModelBackend>>,
}

impl BackendSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a client for every model in the registry according to its kind.
    pub fn from_registry(registry: &ModelRegistry, timeouts: BackendTimeouts) -> Result<Self> {
        let mut set = Self::new();
        for descriptor in registry.list() {
            let backend: Arc<dyn ModelBackend> = match descriptor.kind {
                BackendKind::Http => Arc::new(HttpModelBackend::new(descriptor, timeouts)?),
                BackendKind::Stub => Arc::new(StubModelBackend::new(&descriptor.id)),
            };
            info!(
                model = %descriptor.id,
                kind = descriptor.kind.as_str(),
                url = %descriptor.base_url,
                "Registered model backend"
            );
            set.insert(backend);
        }
        Ok(set)
    }

    pub fn insert(&mut self, backend: Arc<dyn ModelBackend>) {
        self.backends
            .insert(backend.model_id().to_string(), backend);
    }

    pub fn get(&self, model_id: &str) -> Option<Arc<dyn ModelBackend>> {
        self.backends.get(model_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
