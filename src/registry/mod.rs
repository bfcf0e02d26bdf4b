//! Registry of the model backends known to the gateway.
//!
//! The set of models is fixed configuration: it is built once at startup
//! (from the built-in defaults or from the `[[models]]` table of the TOML
//! config) and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// How the gateway talks to a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// A model microservice reachable over HTTP.
    #[default]
    Http,
    /// In-process stand-in that synthesizes a tone instead of calling a model.
    Stub,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Http => "http",
            BackendKind::Stub => "stub",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "http" => Some(BackendKind::Http),
            "stub" => Some(BackendKind::Stub),
            _ => None,
        }
    }
}

/// Connection info for one model backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub id: String,
    pub display_name: String,
    pub base_url: String,
    pub kind: BackendKind,
    /// Whether the backend's remix endpoint actually conditions on the
    /// source audio. Backends without it only regenerate from the prompt.
    pub supports_audio_conditioning: bool,
}

impl ModelDescriptor {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            base_url: base_url.into(),
            kind: BackendKind::Http,
            supports_audio_conditioning: false,
        }
    }

    pub fn with_kind(mut self, kind: BackendKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_audio_conditioning(mut self, supported: bool) -> Self {
        self.supports_audio_conditioning = supported;
        self
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown model id: {0}")]
    NotFound(String),

    #[error("Duplicate model id: {0}")]
    Duplicate(String),

    #[error("Invalid model descriptor: {0}")]
    Invalid(String),
}

/// Read-only mapping from model id to [`ModelDescriptor`].
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: Vec<ModelDescriptor>,
    index: HashMap<String, usize>,
}

impl ModelRegistry {
    /// Build a registry, preserving the given order.
    ///
    /// Fails on duplicate ids and on descriptors with an empty id or base URL.
    pub fn new(models: Vec<ModelDescriptor>) -> Result<Self, RegistryError> {
        let mut index = HashMap::with_capacity(models.len());
        for (position, model) in models.iter().enumerate() {
            if model.id.trim().is_empty() {
                return Err(RegistryError::Invalid("empty model id".to_string()));
            }
            if model.kind == BackendKind::Http && model.base_url.trim().is_empty() {
                return Err(RegistryError::Invalid(format!(
                    "model {} has no base url",
                    model.id
                )));
            }
            if index.insert(model.id.clone(), position).is_some() {
                return Err(RegistryError::Duplicate(model.id.clone()));
            }
        }
        Ok(Self { models, index })
    }

    /// Registry of the built-in model services.
    pub fn with_defaults() -> Self {
        let models = default_models();
        let index = models
            .iter()
            .enumerate()
            .map(|(position, model)| (model.id.clone(), position))
            .collect();
        Self { models, index }
    }

    pub fn list(&self) -> &[ModelDescriptor] {
        &self.models
    }

    pub fn resolve(&self, id: &str) -> Result<&ModelDescriptor, RegistryError> {
        self.index
            .get(id)
            .map(|position| &self.models[*position])
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Built-in model services, one container each on port 5000.
pub fn default_models() -> Vec<ModelDescriptor> {
    [
        ("musicgen", "MusicGen (Meta AI)", "http://musicgen:5000", false),
        ("musicgpt", "MusicGPT", "http://musicgpt:5000", true),
        ("jukebox", "OpenAI Jukebox", "http://jukebox:5000", false),
        ("audioldm", "AudioLDM", "http://audioldm:5000", false),
        ("riffusion", "Riffusion", "http://riffusion:5000", true),
        ("bark", "Bark Audio", "http://bark:5000", false),
        ("musiclm", "MusicLM", "http://musiclm:5000", false),
        ("mousai", "Môûsai", "http://mousai:5000", false),
        ("stable", "Stable Audio", "http://stable_audio:5000", true),
        ("dance", "Dance Diffusion", "http://dance_diffusion:5000", true),
    ]
    .into_iter()
    .map(|(id, name, url, conditioning)| {
        ModelDescriptor::new(id, name, url).with_audio_conditioning(conditioning)
    })
    .collect()
}
