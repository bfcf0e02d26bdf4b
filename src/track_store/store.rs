use super::models::{AudioFormat, Track, TrackKind};
use super::schema;
use super::TrackStore;
use anyhow::{Context, Result};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;
use uuid::Uuid;

const SELECT_TRACK: &str = "SELECT id, model_id, prompt, style, has_vocals, kind, created_at, \
     wav_path, mp3_path, transcode_failed, source_track_id, duration_seconds FROM tracks";

pub struct SqliteTrackStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTrackStore {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let is_new_db = !path.exists();

        let conn = Connection::open(path).context("Failed to open track database")?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;

        if is_new_db {
            info!("Creating new track database at {:?}", path);
            schema::create(&conn)?;
        } else {
            schema::validate(&conn)
                .with_context(|| format!("Track database at {:?} is not usable", path))?;
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        schema::create(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_track(row: &rusqlite::Row) -> rusqlite::Result<Track> {
        let id: String = row.get("id")?;
        let kind: String = row.get("kind")?;
        let wav_path: String = row.get("wav_path")?;
        let mp3_path: Option<String> = row.get("mp3_path")?;
        let source_track_id: Option<String> = row.get("source_track_id")?;

        let mut audio_locations = BTreeMap::new();
        audio_locations.insert(AudioFormat::Wav, PathBuf::from(wav_path));
        if let Some(mp3_path) = mp3_path {
            audio_locations.insert(AudioFormat::Mp3, PathBuf::from(mp3_path));
        }

        Ok(Track {
            id: parse_uuid(0, &id)?,
            model_id: row.get("model_id")?,
            prompt: row.get("prompt")?,
            style: row.get("style")?,
            has_vocals: row.get("has_vocals")?,
            kind: TrackKind::parse(&kind).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    5,
                    Type::Text,
                    format!("unknown track kind {}", kind).into(),
                )
            })?,
            created_at: row.get("created_at")?,
            audio_locations,
            transcode_failed: row.get("transcode_failed")?,
            source_track_id: source_track_id
                .as_deref()
                .map(|s| parse_uuid(10, s))
                .transpose()?,
            duration_seconds: row.get("duration_seconds")?,
        })
    }
}

fn parse_uuid(column: usize, value: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

impl TrackStore for SqliteTrackStore {
    fn insert(&self, track: &Track) -> Result<()> {
        let wav_path = track
            .audio_path(AudioFormat::Wav)
            .context("Track has no wav location")?
            .to_string_lossy()
            .to_string();
        let mp3_path = track
            .audio_path(AudioFormat::Mp3)
            .map(|p| p.to_string_lossy().to_string());

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO tracks (id, model_id, prompt, style, has_vocals, kind, created_at, \
             wav_path, mp3_path, transcode_failed, source_track_id, duration_seconds) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                track.id.to_string(),
                track.model_id,
                track.prompt,
                track.style,
                track.has_vocals,
                track.kind.as_str(),
                track.created_at,
                wav_path,
                mp3_path,
                track.transcode_failed,
                track.source_track_id.map(|id| id.to_string()),
                track.duration_seconds,
            ],
        )
        .with_context(|| format!("Failed to insert track {}", track.id))?;
        Ok(())
    }

    fn get(&self, id: &Uuid) -> Result<Option<Track>> {
        let conn = self.conn.lock().unwrap();
        let track = conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_TRACK),
                params![id.to_string()],
                Self::row_to_track,
            )
            .optional()?;
        Ok(track)
    }

    fn list(&self, limit: usize) -> Result<Vec<Track>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "{} ORDER BY created_at DESC, rowid DESC LIMIT ?1",
            SELECT_TRACK
        ))?;
        let tracks = stmt
            .query_map(params![limit as i64], Self::row_to_track)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tracks)
    }

    fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
