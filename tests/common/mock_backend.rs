//! A fake model service speaking the gateway's backend contract.
//!
//! Each instance listens on its own random port, writes a short WAV to the
//! `outputPath` it is asked for and counts the calls it receives.

use super::constants::MOCK_DURATION_SECS;
use super::fixtures::write_wav;
use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Default)]
struct MockState {
    load_calls: AtomicUsize,
    unload_calls: AtomicUsize,
    generate_calls: AtomicUsize,
    extend_calls: AtomicUsize,
    remix_calls: AtomicUsize,
    fail_load: AtomicBool,
    fail_generation: AtomicBool,
    requests: Mutex<Vec<(String, Value)>>,
}

pub struct MockModelService {
    /// Base URL to put in the model registry
    pub url: String,
    state: Arc<MockState>,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl MockModelService {
    pub async fn spawn() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route("/load", post(load))
            .route("/unload", post(unload))
            .route("/generate", post(generate))
            .route("/generate/extend", post(extend))
            .route("/generate/remix", post(remix))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock model service");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Mock model service failed");
        });

        Self {
            url: format!("http://127.0.0.1:{}", port),
            state,
            _shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn load_calls(&self) -> usize {
        self.state.load_calls.load(Ordering::SeqCst)
    }

    pub fn unload_calls(&self) -> usize {
        self.state.unload_calls.load(Ordering::SeqCst)
    }

    pub fn generate_calls(&self) -> usize {
        self.state.generate_calls.load(Ordering::SeqCst)
    }

    pub fn extend_calls(&self) -> usize {
        self.state.extend_calls.load(Ordering::SeqCst)
    }

    pub fn remix_calls(&self) -> usize {
        self.state.remix_calls.load(Ordering::SeqCst)
    }

    /// Make `/load` answer 500 with a JSON error.
    pub fn fail_load(&self, fail: bool) {
        self.state.fail_load.store(fail, Ordering::SeqCst);
    }

    /// Make the generation endpoints answer `success: false`.
    pub fn fail_generation(&self, fail: bool) {
        self.state.fail_generation.store(fail, Ordering::SeqCst);
    }

    /// Body of the most recent request to `path`.
    pub fn last_request(&self, path: &str) -> Option<Value> {
        self.state
            .requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(p, _)| p == path)
            .map(|(_, body)| body.clone())
    }
}

impl Drop for MockModelService {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn load(State(state): State<Arc<MockState>>) -> (StatusCode, Json<Value>) {
    state.load_calls.fetch_add(1, Ordering::SeqCst);
    if state.fail_load.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"success": false, "error": "CUDA out of memory"})),
        );
    }
    (StatusCode::OK, Json(json!({"success": true, "message": "loaded"})))
}

async fn unload(State(state): State<Arc<MockState>>) -> Json<Value> {
    state.unload_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({"success": true, "message": "unloaded"}))
}

async fn generate(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Json<Value> {
    state.generate_calls.fetch_add(1, Ordering::SeqCst);
    produce(&state, "/generate", body)
}

async fn extend(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Json<Value> {
    state.extend_calls.fetch_add(1, Ordering::SeqCst);
    produce(&state, "/generate/extend", body)
}

async fn remix(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Json<Value> {
    state.remix_calls.fetch_add(1, Ordering::SeqCst);
    produce(&state, "/generate/remix", body)
}

fn produce(state: &MockState, path: &str, body: Value) -> Json<Value> {
    state
        .requests
        .lock()
        .unwrap()
        .push((path.to_string(), body.clone()));

    if state.fail_generation.load(Ordering::SeqCst) {
        return Json(json!({"success": false, "error": "model crashed"}));
    }

    let output_path = match body["outputPath"].as_str() {
        Some(p) => PathBuf::from(p),
        None => return Json(json!({"success": false, "error": "outputPath missing"})),
    };
    if let Err(e) = write_wav(&output_path, MOCK_DURATION_SECS) {
        return Json(json!({"success": false, "error": e.to_string()}));
    }

    Json(json!({
        "success": true,
        "duration": MOCK_DURATION_SECS,
        "outputPath": output_path,
    }))
}
