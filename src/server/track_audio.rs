//! Audio download with byte range support.

use super::error::ApiError;
use super::state::GuardedTrackStore;
use crate::track_store::AudioFormat;
use axum::{
    body::Body,
    extract::{OptionalFromRequestParts, Path, Query, State},
    http::{header, request::Parts, StatusCode},
    response::Response,
};
use serde::Deserialize;
use std::convert::Infallible;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, BufReader, SeekFrom},
};
use tokio_util::io::ReaderStream;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    start_inclusive: Option<u64>,
    end_inclusive: Option<u64>,
}

impl ByteRange {
    pub fn new(start_inclusive: Option<u64>, end_inclusive: Option<u64>) -> ByteRange {
        ByteRange {
            start_inclusive,
            end_inclusive,
        }
    }

    fn parse<S: AsRef<str>>(s: S) -> Option<ByteRange> {
        let v = s.as_ref().strip_prefix("bytes=")?;
        let (start, end) = v.split_once('-')?;
        if end.contains('-') || end.contains(',') {
            return None;
        }

        Some(ByteRange {
            start_inclusive: start.trim().parse::<u64>().ok(),
            end_inclusive: end.trim().parse::<u64>().ok(),
        })
    }

    /// Inclusive bounds within a file of `len` bytes. `Ok(None)` serves the whole file.
    fn resolve(&self, len: u64) -> Result<Option<(u64, u64)>, ()> {
        let (start, end) = match (self.start_inclusive, self.end_inclusive) {
            (None, None) => return Ok(None),
            (Some(start), None) => (start, len.saturating_sub(1)),
            (Some(start), Some(end)) => (start, end.min(len.saturating_sub(1))),
            (None, Some(0)) => return Err(()),
            (None, Some(suffix)) => (len.saturating_sub(suffix), len.saturating_sub(1)),
        };
        if len == 0 || start >= len || end < start {
            return Err(());
        }
        Ok(Some((start, end)))
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for ByteRange {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts
            .headers
            .get(header::RANGE)
            .and_then(|x| x.to_str().ok())
            .and_then(ByteRange::parse))
    }
}

#[derive(Debug, Deserialize)]
pub struct AudioQuery {
    format: Option<String>,
}

pub async fn track_audio(
    byte_range: Option<ByteRange>,
    State(track_store): State<GuardedTrackStore>,
    Path(id): Path<String>,
    Query(query): Query<AudioQuery>,
) -> Result<Response, ApiError> {
    let format = match query.format.as_deref() {
        None => AudioFormat::Wav,
        Some(s) => AudioFormat::parse(s)
            .ok_or_else(|| ApiError::bad_request(format!("Unsupported format: {}", s)))?,
    };

    let not_found = || ApiError::not_found(format!("Track not found: {}", id));
    let track_id = uuid::Uuid::parse_str(&id).map_err(|_| not_found())?;
    let track = track_store.get(&track_id)?.ok_or_else(not_found)?;

    let path = track.audio_path(format).ok_or_else(|| {
        ApiError::not_found(format!(
            "Track {} has no {} audio",
            track_id,
            format.as_str()
        ))
    })?;
    debug!("Serving track {} from {}", track_id, path.display());

    let mut file = File::open(path).await.map_err(|_| {
        ApiError::not_found(format!(
            "Audio file for track {} is missing",
            track_id
        ))
    })?;
    let file_length = file
        .metadata()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .len();

    let range = match byte_range.map(|r| r.resolve(file_length)) {
        None => None,
        Some(Ok(range)) => range,
        Some(Err(())) => {
            return Response::builder()
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(header::CONTENT_RANGE, format!("bytes */{}", file_length))
                .body(Body::empty())
                .map_err(|e| ApiError::internal(e.to_string()));
        }
    };

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, format.mime_type())
        .header(header::ACCEPT_RANGES, "bytes")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}.{}\"", track_id, format.as_str()),
        );

    let (start, chunk_size) = match range {
        None => (0, file_length),
        Some((start, end)) => {
            builder = builder.status(StatusCode::PARTIAL_CONTENT).header(
                header::CONTENT_RANGE,
                format!("bytes {}-{}/{}", start, end, file_length),
            );
            (start, end - start + 1)
        }
    };
    if start > 0 {
        file.seek(SeekFrom::Start(start))
            .await
            .map_err(|e| ApiError::internal(e.to_string()))?;
    }

    let file_reader = BufReader::with_capacity(4096 * 16, file).take(chunk_size);
    let stream = ReaderStream::with_capacity(file_reader, 4096 * 16);

    builder
        .header(header::CONTENT_LENGTH, chunk_size)
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::internal(e.to_string()))
}
