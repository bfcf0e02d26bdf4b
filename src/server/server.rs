use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info};
use tower_http::services::ServeDir;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, Query, State},
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::error::ApiError;
use super::track_audio::track_audio;
use super::{log_requests, metrics, state::*};
use crate::audio::sniff_audio_extension;
use crate::generation::{ExtendCommand, GenerateCommand, RemixCommand, RemixSource};
use crate::track_store::Track;

const DEFAULT_TRACKS_PAGE: usize = 50;
const MAX_TRACKS_PAGE: usize = 500;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
    pub active_model: Option<String>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModelView {
    id: String,
    name: String,
    loaded: bool,
    supports_audio_conditioning: bool,
}

#[derive(Deserialize, Debug)]
struct ModelIdBody {
    id: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateBody {
    model: Option<String>,
    prompt: Option<String>,
    style: Option<String>,
    has_vocals: Option<bool>,
    duration: Option<f64>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ExtendBody {
    track_id: Option<String>,
    model_id: Option<String>,
    duration: Option<f64>,
    prompt: Option<String>,
    style: Option<String>,
    has_vocals: Option<bool>,
}

#[derive(Deserialize, Debug)]
struct TracksQuery {
    limit: Option<usize>,
}

/// Text fields of a remix form; the source is either an upload or a stored track.
#[derive(Default)]
struct RemixForm {
    model: Option<String>,
    prompt: Option<String>,
    style: Option<String>,
    has_vocals: Option<String>,
    duration: Option<String>,
    track_id: Option<String>,
    file: Option<Vec<u8>>,
}

fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("Missing '{}'", name)))
}

fn parse_track_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id.trim()).map_err(|_| ApiError::not_found(format!("Track {} not found", id)))
}

fn parse_flag(value: &str) -> Result<bool, ApiError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ApiError::bad_request(format!(
            "Invalid 'hasVocals' value: {}",
            other
        ))),
    }
}

async fn home(State(state): State<ServerState>) -> Json<ServerStats> {
    Json(ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        active_model: state.lifecycle.current(),
    })
}

async fn list_models(State(lifecycle): State<GuardedLifecycle>) -> Json<Vec<ModelView>> {
    let models = lifecycle
        .registry()
        .list()
        .iter()
        .map(|m| ModelView {
            id: m.id.clone(),
            name: m.display_name.clone(),
            loaded: lifecycle.is_loaded(&m.id),
            supports_audio_conditioning: m.supports_audio_conditioning,
        })
        .collect();
    Json(models)
}

async fn current_model(State(lifecycle): State<GuardedLifecycle>) -> Json<Value> {
    let state = lifecycle.state();
    Json(json!({
        "state": state.name(),
        "model": state.model(),
        "inFlight": lifecycle.in_flight(),
    }))
}

async fn load_model(
    State(lifecycle): State<GuardedLifecycle>,
    payload: Result<Json<ModelIdBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    let id = required(body.id, "id")?;
    lifecycle.load(&id).await?;
    Ok(Json(json!({ "loaded": id })))
}

async fn unload_model(
    State(lifecycle): State<GuardedLifecycle>,
    payload: Result<Json<ModelIdBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    let id = required(body.id, "id")?;
    lifecycle.unload(&id).await?;
    Ok(Json(json!({ "unloaded": id })))
}

async fn generate(
    State(orchestrator): State<GuardedOrchestrator>,
    payload: Result<Json<GenerateBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    let command = GenerateCommand {
        model_id: required(body.model, "model")?,
        prompt: required(body.prompt, "prompt")?,
        style: body.style,
        has_vocals: body.has_vocals.unwrap_or(true),
        duration_secs: body.duration,
    };
    let track = orchestrator.generate(command).await?;
    Ok(Json(json!({ "id": track.id, "track": track })))
}

async fn extend(
    State(orchestrator): State<GuardedOrchestrator>,
    payload: Result<Json<ExtendBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    let track_id = required(body.track_id, "trackId")?;
    let command = ExtendCommand {
        track_id: parse_track_id(&track_id)?,
        model_id: required(body.model_id, "modelId")?,
        extra_duration_secs: body.duration,
        prompt: body.prompt,
        style: body.style,
        has_vocals: body.has_vocals,
    };
    let track = orchestrator.extend(command).await?;
    Ok(Json(json!({ "track": track })))
}

async fn read_remix_form(mut multipart: Multipart) -> Result<RemixForm, ApiError> {
    let mut form = RemixForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let bytes = field.bytes().await?;
                if !bytes.is_empty() {
                    form.file = Some(bytes.to_vec());
                }
            }
            "model" => form.model = Some(field.text().await?),
            "prompt" => form.prompt = Some(field.text().await?),
            "style" => form.style = Some(field.text().await?),
            "hasVocals" => form.has_vocals = Some(field.text().await?),
            "duration" => form.duration = Some(field.text().await?),
            "trackId" => form.track_id = Some(field.text().await?),
            _ => debug!("Ignoring remix form field {:?}", name),
        }
    }
    Ok(form)
}

async fn save_upload(uploads_dir: &std::path::Path, bytes: &[u8]) -> Result<PathBuf, ApiError> {
    let extension = sniff_audio_extension(bytes)
        .ok_or_else(|| ApiError::bad_request("Uploaded file is not a recognized audio format"))?;
    tokio::fs::create_dir_all(uploads_dir)
        .await
        .with_context(|| format!("Failed to create uploads directory {:?}", uploads_dir))?;
    let path = uploads_dir.join(format!("{}.{}", Uuid::new_v4(), extension));
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("Failed to save upload to {:?}", path))?;
    debug!("Saved remix upload to {}", path.display());
    Ok(path)
}

async fn remix(
    State(state): State<ServerState>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let form = read_remix_form(multipart).await?;

    let model_id = required(form.model, "model")?;
    let prompt = required(form.prompt, "prompt")?;
    let has_vocals = match form.has_vocals.as_deref() {
        Some(v) if !v.trim().is_empty() => parse_flag(v)?,
        _ => true,
    };
    let duration_secs = match form.duration.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Some(v.parse::<f64>().map_err(|_| {
            ApiError::bad_request(format!("Invalid 'duration' value: {}", v))
        })?),
        _ => None,
    };
    let track_id = form.track_id.filter(|v| !v.trim().is_empty());

    let source = match (form.file, track_id) {
        (Some(_), Some(_)) => {
            return Err(ApiError::bad_request(
                "Provide either 'file' or 'trackId', not both",
            ))
        }
        (None, None) => return Err(ApiError::bad_request("Missing 'file' or 'trackId'")),
        (None, Some(id)) => RemixSource::Track(parse_track_id(&id)?),
        (Some(bytes), None) => {
            state.orchestrator.ensure_ready(&model_id)?;
            RemixSource::Upload(save_upload(&state.config.uploads_dir, &bytes).await?)
        }
    };

    let outcome = state
        .orchestrator
        .remix(RemixCommand {
            source,
            model_id,
            prompt,
            style: form.style,
            has_vocals,
            duration_secs,
        })
        .await?;

    Ok(Json(json!({
        "track": outcome.track,
        "audioConditioned": outcome.audio_conditioned,
        "backend": outcome.backend_response,
    })))
}

async fn list_tracks(
    State(track_store): State<GuardedTrackStore>,
    Query(query): Query<TracksQuery>,
) -> Result<Json<Vec<Track>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_TRACKS_PAGE)
        .min(MAX_TRACKS_PAGE);
    Ok(Json(track_store.list(limit)?))
}

async fn get_track(
    State(track_store): State<GuardedTrackStore>,
    Path(id): Path<String>,
) -> Result<Json<Track>, ApiError> {
    let track_id = parse_track_id(&id)?;
    track_store
        .get(&track_id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Track {} not found", id)))
}

pub fn make_app(state: ServerState) -> Router {
    let model_routes: Router = Router::new()
        .route("/", get(list_models))
        .route("/current", get(current_model))
        .route("/load", post(load_model))
        .route("/unload", post(unload_model))
        .with_state(state.clone());

    let generation_routes: Router = Router::new()
        .route("/generate", post(generate))
        .route("/extend", post(extend))
        .route(
            "/remix",
            post(remix).layer(DefaultBodyLimit::max(state.config.max_upload_bytes)),
        )
        .with_state(state.clone());

    let track_routes: Router = Router::new()
        .route("/", get(list_tracks))
        .route("/{id}", get(get_track))
        .route("/{id}/audio", get(track_audio))
        .with_state(state.clone());

    let home_router: Router = match state.config.frontend_dir_path.clone() {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    home_router
        .nest("/api/models", model_routes)
        .nest("/api/tracks", track_routes)
        .nest("/api", generation_routes)
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
}

fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics::metrics_handler))
}

pub async fn run_server(state: ServerState) -> Result<()> {
    let port = state.config.port;
    let metrics_port = state.config.metrics_port;
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    let metrics_listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;

    info!("Ready to serve at port {}!", port);
    info!("Metrics available at port {}!", metrics_port);

    tokio::select! {
        result = axum::serve(listener, app) => result.context("Server error"),
        result = axum::serve(metrics_listener, make_metrics_app()) => {
            result.context("Metrics server error")
        }
    }
}
