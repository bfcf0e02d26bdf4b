//! SQLite schema of the track database.

use anyhow::{bail, Result};
use rusqlite::Connection;

/// Offset added to the schema version stored in `PRAGMA user_version`, so a
/// database created by another tool is never mistaken for ours.
pub const BASE_DB_VERSION: usize = 99999;

pub const TRACKS_SCHEMA_VERSION: usize = 1;

const CREATE_TRACKS_V1: &str = "
CREATE TABLE tracks (
    id TEXT PRIMARY KEY,
    model_id TEXT NOT NULL,
    prompt TEXT NOT NULL,
    style TEXT,
    has_vocals INTEGER NOT NULL,
    kind TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    wav_path TEXT NOT NULL,
    mp3_path TEXT,
    transcode_failed INTEGER NOT NULL DEFAULT 0,
    source_track_id TEXT REFERENCES tracks(id) ON DELETE SET NULL,
    duration_seconds REAL
);
CREATE INDEX idx_tracks_created_at ON tracks(created_at DESC);
";

const TRACK_COLUMNS: &[&str] = &[
    "id",
    "model_id",
    "prompt",
    "style",
    "has_vocals",
    "kind",
    "created_at",
    "wav_path",
    "mp3_path",
    "transcode_failed",
    "source_track_id",
    "duration_seconds",
];

pub fn create(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TRACKS_V1)?;
    conn.pragma_update(None, "user_version", (BASE_DB_VERSION + TRACKS_SCHEMA_VERSION) as i64)?;
    Ok(())
}

pub fn validate(conn: &Connection) -> Result<()> {
    let raw_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let version = raw_version - BASE_DB_VERSION as i64;
    if version != TRACKS_SCHEMA_VERSION as i64 {
        bail!(
            "Track database version {} is not supported (expected {})",
            version,
            TRACKS_SCHEMA_VERSION
        );
    }

    let mut stmt = conn.prepare("PRAGMA table_info(tracks);")?;
    let columns: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<_, _>>()?;
    if columns != TRACK_COLUMNS {
        bail!(
            "Table tracks has columns [{}], expected [{}]",
            columns.join(", "),
            TRACK_COLUMNS.join(", ")
        );
    }
    Ok(())
}
