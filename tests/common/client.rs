//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all gateway endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    async fn get(&self, path: &str) -> Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("GET request failed")
    }

    async fn post_json(&self, path: &str, body: Value) -> Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .expect("POST request failed")
    }

    // ========================================================================
    // Home
    // ========================================================================

    /// GET /
    pub async fn home(&self) -> Response {
        self.get("/").await
    }

    // ========================================================================
    // Model Endpoints
    // ========================================================================

    /// GET /api/models
    pub async fn list_models(&self) -> Response {
        self.get("/api/models").await
    }

    /// GET /api/models/current
    pub async fn current_model(&self) -> Response {
        self.get("/api/models/current").await
    }

    /// POST /api/models/load
    pub async fn load_model(&self, id: &str) -> Response {
        self.post_json("/api/models/load", json!({ "id": id })).await
    }

    /// POST /api/models/unload
    pub async fn unload_model(&self, id: &str) -> Response {
        self.post_json("/api/models/unload", json!({ "id": id }))
            .await
    }

    /// Loads a model and asserts success.
    pub async fn load_model_ok(&self, id: &str) {
        let response = self.load_model(id).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::OK,
            "Loading {} failed: {:?}",
            id,
            response.text().await
        );
    }

    // ========================================================================
    // Generation Endpoints
    // ========================================================================

    /// POST /api/generate with a raw body
    pub async fn generate_with(&self, body: Value) -> Response {
        self.post_json("/api/generate", body).await
    }

    /// POST /api/generate
    pub async fn generate(&self, model: &str, prompt: &str) -> Response {
        self.generate_with(json!({
            "model": model,
            "prompt": prompt,
            "style": TEST_STYLE,
        }))
        .await
    }

    /// Generates a track and returns its id, asserting success.
    pub async fn generate_ok(&self, model: &str, prompt: &str) -> String {
        let response = self.generate(model, prompt).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::OK,
            "Generation failed: {:?}",
            response.text().await
        );
        let body: Value = response.json().await.expect("Invalid generate response");
        body["id"]
            .as_str()
            .expect("Missing id in generate response")
            .to_string()
    }

    /// POST /api/extend
    pub async fn extend(&self, body: Value) -> Response {
        self.post_json("/api/extend", body).await
    }

    /// POST /api/remix with a stored track as source
    pub async fn remix_track(&self, model: &str, prompt: &str, track_id: &str) -> Response {
        let form = Form::new()
            .text("model", model.to_string())
            .text("prompt", prompt.to_string())
            .text("hasVocals", "false")
            .text("trackId", track_id.to_string());
        self.remix(form).await
    }

    /// POST /api/remix with an uploaded file as source
    pub async fn remix_upload(&self, model: &str, prompt: &str, bytes: Vec<u8>) -> Response {
        let part = Part::bytes(bytes)
            .file_name("source.wav")
            .mime_str("audio/wav")
            .expect("Invalid mime type");
        let form = Form::new()
            .text("model", model.to_string())
            .text("prompt", prompt.to_string())
            .text("style", TEST_STYLE)
            .part("file", part);
        self.remix(form).await
    }

    /// POST /api/remix with a custom form
    pub async fn remix(&self, form: Form) -> Response {
        self.client
            .post(format!("{}/api/remix", self.base_url))
            .multipart(form)
            .send()
            .await
            .expect("Remix request failed")
    }

    // ========================================================================
    // Track Endpoints
    // ========================================================================

    /// GET /api/tracks
    pub async fn list_tracks(&self, limit: Option<usize>) -> Response {
        match limit {
            Some(limit) => self.get(&format!("/api/tracks?limit={}", limit)).await,
            None => self.get("/api/tracks").await,
        }
    }

    /// GET /api/tracks/{id}
    pub async fn get_track(&self, id: &str) -> Response {
        self.get(&format!("/api/tracks/{}", id)).await
    }

    /// GET /api/tracks/{id}/audio
    pub async fn get_track_audio(&self, id: &str, format: Option<&str>) -> Response {
        match format {
            Some(format) => {
                self.get(&format!("/api/tracks/{}/audio?format={}", id, format))
                    .await
            }
            None => self.get(&format!("/api/tracks/{}/audio", id)).await,
        }
    }

    /// GET /api/tracks/{id}/audio with a Range header
    pub async fn get_track_audio_range(&self, id: &str, range: &str) -> Response {
        self.client
            .get(format!("{}/api/tracks/{}/audio", self.base_url, id))
            .header("Range", range)
            .send()
            .await
            .expect("Range request failed")
    }
}
