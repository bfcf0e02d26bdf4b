//! Persistence of generated track metadata.

mod models;
mod schema;
mod store;

pub use models::{AudioFormat, Track, TrackKind};
pub use store::SqliteTrackStore;

use anyhow::Result;
use uuid::Uuid;

pub trait TrackStore: Send + Sync {
    /// Fails on a duplicate id or an unknown source track.
    fn insert(&self, track: &Track) -> Result<()>;
    fn get(&self, id: &Uuid) -> Result<Option<Track>>;
    /// Newest first.
    fn list(&self, limit: usize) -> Result<Vec<Track>>;
    fn count(&self) -> Result<usize>;
}
