//! Music Generation Gateway Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod audio;
pub mod backend;
pub mod config;
pub mod generation;
pub mod lifecycle;
pub mod registry;
pub mod server;
pub mod track_store;

// Re-export commonly used types for convenience
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig, ServerState};
pub use track_store::{SqliteTrackStore, TrackStore};
