//! Tracks which single model backend is loaded.
//!
//! Loading a model allocates GPU memory on its backend, so at most one model
//! may be active at a time. Transitions are serialized by an async mutex held
//! across the backend call, while the state itself lives behind a std mutex
//! so readers never wait on a transition.

use crate::backend::{BackendError, BackendSet, ModelBackend};
use crate::registry::ModelRegistry;
use crate::server::metrics;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "model", rename_all = "snake_case")]
pub enum LifecycleState {
    Unloaded,
    Loading(String),
    Loaded(String),
    Unloading(String),
}

impl LifecycleState {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleState::Unloaded => "unloaded",
            LifecycleState::Loading(_) => "loading",
            LifecycleState::Loaded(_) => "loaded",
            LifecycleState::Unloading(_) => "unloading",
        }
    }

    pub fn model(&self) -> Option<&str> {
        match self {
            LifecycleState::Unloaded => None,
            LifecycleState::Loading(id)
            | LifecycleState::Loaded(id)
            | LifecycleState::Unloading(id) => Some(id),
        }
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Model {0} is not loaded")]
    NotLoaded(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Debug)]
struct Inner {
    state: LifecycleState,
    in_flight: usize,
}

pub struct LifecycleController {
    registry: Arc<ModelRegistry>,
    backends: BackendSet,
    transition: tokio::sync::Mutex<()>,
    inner: Arc<Mutex<Inner>>,
}

impl LifecycleController {
    pub fn new(registry: Arc<ModelRegistry>, backends: BackendSet) -> Self {
        Self {
            registry,
            backends,
            transition: tokio::sync::Mutex::new(()),
            inner: Arc::new(Mutex::new(Inner {
                state: LifecycleState::Unloaded,
                in_flight: 0,
            })),
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Full state, including transitional ones.
    pub fn state(&self) -> LifecycleState {
        self.inner.lock().unwrap().state.clone()
    }

    /// Id of the loaded model, if any. Transitional states count as not loaded.
    pub fn current(&self) -> Option<String> {
        match &self.inner.lock().unwrap().state {
            LifecycleState::Loaded(id) => Some(id.clone()),
            _ => None,
        }
    }

    pub fn is_loaded(&self, model_id: &str) -> bool {
        self.current().as_deref() == Some(model_id)
    }

    pub fn in_flight(&self) -> usize {
        self.inner.lock().unwrap().in_flight
    }

    /// The client for a registered model.
    pub fn backend(&self, model_id: &str) -> Result<Arc<dyn ModelBackend>, LifecycleError> {
        self.registry
            .resolve(model_id)
            .map_err(|_| LifecycleError::UnknownModel(model_id.to_string()))?;
        self.backends
            .get(model_id)
            .ok_or_else(|| LifecycleError::UnknownModel(model_id.to_string()))
    }

    /// Load `model_id`. Loading the already-loaded model is a no-op; loading
    /// while another model is loaded is a conflict.
    pub async fn load(&self, model_id: &str) -> Result<(), LifecycleError> {
        let backend = self.backend(model_id)?;
        let _transition = self.transition.lock().await;

        let pending = {
            let mut inner = self.inner.lock().unwrap();
            match &inner.state {
                LifecycleState::Loaded(current) if current == model_id => return Ok(()),
                LifecycleState::Unloaded => {}
                other => {
                    return Err(LifecycleError::Conflict(format!(
                        "Model {} is {}; unload it first",
                        other.model().unwrap_or_default(),
                        other.name()
                    )))
                }
            }
            inner.state = LifecycleState::Loading(model_id.to_string());
            PendingTransition::new(&self.inner, LifecycleState::Unloaded)
        };

        info!(model = %model_id, "Loading model");
        match backend.load().await {
            Ok(()) => {
                pending.finish(LifecycleState::Loaded(model_id.to_string()));
                metrics::set_active_model(Some(model_id));
                info!(model = %model_id, "Model loaded");
                Ok(())
            }
            Err(e) => {
                drop(pending);
                warn!(model = %model_id, error = %e, "Model load failed");
                Err(e.into())
            }
        }
    }

    /// Unload `model_id`, which must be the loaded model with no generation in flight.
    pub async fn unload(&self, model_id: &str) -> Result<(), LifecycleError> {
        let backend = self.backend(model_id)?;
        let _transition = self.transition.lock().await;

        let pending = {
            let mut inner = self.inner.lock().unwrap();
            match &inner.state {
                LifecycleState::Loaded(current) if current == model_id => {}
                _ => {
                    return Err(LifecycleError::Conflict(format!(
                        "Model {} is not loaded",
                        model_id
                    )))
                }
            }
            if inner.in_flight > 0 {
                return Err(LifecycleError::Conflict(format!(
                    "Model {} has {} generation(s) in flight",
                    model_id, inner.in_flight
                )));
            }
            inner.state = LifecycleState::Unloading(model_id.to_string());
            PendingTransition::new(&self.inner, LifecycleState::Loaded(model_id.to_string()))
        };

        info!(model = %model_id, "Unloading model");
        match backend.unload().await {
            Ok(()) => {
                pending.finish(LifecycleState::Unloaded);
                metrics::set_active_model(None);
                info!(model = %model_id, "Model unloaded");
                Ok(())
            }
            Err(e) => {
                drop(pending);
                warn!(model = %model_id, error = %e, "Model unload failed");
                Err(e.into())
            }
        }
    }

    /// Reserve the loaded model for one generation. Unload is refused until
    /// the returned lease is dropped.
    pub fn acquire(&self, model_id: &str) -> Result<GenerationLease, LifecycleError> {
        self.registry
            .resolve(model_id)
            .map_err(|_| LifecycleError::UnknownModel(model_id.to_string()))?;

        let mut inner = self.inner.lock().unwrap();
        match &inner.state {
            LifecycleState::Loaded(current) if current == model_id => {
                inner.in_flight += 1;
                Ok(GenerationLease {
                    inner: self.inner.clone(),
                    model_id: model_id.to_string(),
                })
            }
            _ => Err(LifecycleError::NotLoaded(model_id.to_string())),
        }
    }
}

/// Held for the full backend round trip of a generation.
#[derive(Debug)]
pub struct GenerationLease {
    inner: Arc<Mutex<Inner>>,
    model_id: String,
}

impl GenerationLease {
    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

impl Drop for GenerationLease {
    fn drop(&mut self) {
        let mut inner = self.inner.lock().unwrap();
        inner.in_flight = inner.in_flight.saturating_sub(1);
    }
}

/// Restores `rollback` on drop unless finished, so a cancelled or failed
/// backend call never leaves a transitional state behind.
struct PendingTransition<'a> {
    inner: &'a Mutex<Inner>,
    rollback: Option<LifecycleState>,
}

impl<'a> PendingTransition<'a> {
    fn new(inner: &'a Mutex<Inner>, rollback: LifecycleState) -> Self {
        Self {
            inner,
            rollback: Some(rollback),
        }
    }

    fn finish(mut self, state: LifecycleState) {
        self.rollback = None;
        self.inner.lock().unwrap().state = state;
    }
}

impl Drop for PendingTransition<'_> {
    fn drop(&mut self) {
        if let Some(state) = self.rollback.take() {
            self.inner.lock().unwrap().state = state;
        }
    }
}
