use axum::extract::FromRef;

use crate::generation::GenerationOrchestrator;
use crate::lifecycle::LifecycleController;
use crate::track_store::TrackStore;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedLifecycle = Arc<LifecycleController>;
pub type GuardedOrchestrator = Arc<GenerationOrchestrator>;
pub type GuardedTrackStore = Arc<dyn TrackStore>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub lifecycle: GuardedLifecycle,
    pub orchestrator: GuardedOrchestrator,
    pub track_store: GuardedTrackStore,
    pub hash: String,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        lifecycle: GuardedLifecycle,
        orchestrator: GuardedOrchestrator,
        track_store: GuardedTrackStore,
    ) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            lifecycle,
            orchestrator,
            track_store,
            hash: env!("GIT_HASH").to_string(),
        }
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedLifecycle {
    fn from_ref(input: &ServerState) -> Self {
        input.lifecycle.clone()
    }
}

impl FromRef<ServerState> for GuardedOrchestrator {
    fn from_ref(input: &ServerState) -> Self {
        input.orchestrator.clone()
    }
}

impl FromRef<ServerState> for GuardedTrackStore {
    fn from_ref(input: &ServerState) -> Self {
        input.track_store.clone()
    }
}
