//! Generate, extend and remix requests against the loaded model.

mod orchestrator;
pub mod prompt;

pub use orchestrator::{
    ExtendCommand, GenerateCommand, GenerationOrchestrator, RemixCommand, RemixOutcome,
    RemixSource, DEFAULT_EXTEND_SECONDS,
};

use crate::backend::BackendError;
use crate::lifecycle::LifecycleError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Audio verification failed: {0}")]
    Verification(String),

    #[error("Failed to persist track: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LifecycleError> for GatewayError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::UnknownModel(id) => {
                GatewayError::InvalidRequest(format!("Unknown model: {}", id))
            }
            LifecycleError::NotLoaded(id) => {
                GatewayError::InvalidRequest(format!("Model {} is not loaded", id))
            }
            LifecycleError::Conflict(message) => GatewayError::Conflict(message),
            LifecycleError::Backend(e) => GatewayError::Backend(e),
        }
    }
}
