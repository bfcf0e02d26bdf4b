//! Track metadata records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Container format of a stored audio artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Mp3,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "wav" => Some(AudioFormat::Wav),
            "mp3" => Some(AudioFormat::Mp3),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Mp3 => "audio/mpeg",
        }
    }
}

/// Operation that produced a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Generate,
    Extend,
    Remix,
}

impl TrackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackKind::Generate => "generate",
            TrackKind::Extend => "extend",
            TrackKind::Remix => "remix",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "generate" => Some(TrackKind::Generate),
            "extend" => Some(TrackKind::Extend),
            "remix" => Some(TrackKind::Remix),
            _ => None,
        }
    }
}

/// A generated piece of audio and its provenance. Never modified after insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: Uuid,
    pub model_id: String,
    /// Content prompt as given by the caller, before composition.
    pub prompt: String,
    pub style: Option<String>,
    pub has_vocals: bool,
    pub kind: TrackKind,
    /// Unix milliseconds.
    pub created_at: i64,
    pub audio_locations: BTreeMap<AudioFormat, PathBuf>,
    pub transcode_failed: bool,
    pub source_track_id: Option<Uuid>,
    pub duration_seconds: Option<f64>,
}

impl Track {
    pub fn audio_path(&self, format: AudioFormat) -> Option<&Path> {
        self.audio_locations.get(&format).map(PathBuf::as_path)
    }

    pub fn formats(&self) -> Vec<AudioFormat> {
        self.audio_locations.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parsing_and_mime() {
        assert_eq!(AudioFormat::parse("MP3"), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::parse("wav"), Some(AudioFormat::Wav));
        assert_eq!(AudioFormat::parse("flac"), None);
        assert_eq!(AudioFormat::Mp3.mime_type(), "audio/mpeg");
        assert_eq!(AudioFormat::Wav.mime_type(), "audio/wav");
    }

    #[test]
    fn track_serializes_locations_by_format_name() {
        let mut audio_locations = BTreeMap::new();
        audio_locations.insert(AudioFormat::Wav, PathBuf::from("/out/a.wav"));
        audio_locations.insert(AudioFormat::Mp3, PathBuf::from("/out/a.mp3"));
        let track = Track {
            id: Uuid::nil(),
            model_id: "musicgen".to_string(),
            prompt: "drums".to_string(),
            style: None,
            has_vocals: false,
            kind: TrackKind::Generate,
            created_at: 1,
            audio_locations,
            transcode_failed: false,
            source_track_id: None,
            duration_seconds: Some(30.0),
        };

        let value = serde_json::to_value(&track).unwrap();
        assert_eq!(value["audioLocations"]["wav"], "/out/a.wav");
        assert_eq!(value["audioLocations"]["mp3"], "/out/a.mp3");
        assert_eq!(value["kind"], "generate");
        assert_eq!(value["modelId"], "musicgen");
        assert_eq!(track.formats(), vec![AudioFormat::Wav, AudioFormat::Mp3]);
    }
}
