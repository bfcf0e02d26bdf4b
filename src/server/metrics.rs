use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all gateway metrics
const PREFIX: &str = "music_gateway";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.1, 1.0, 10.0, 60.0, 300.0, 900.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Model Backend Metrics
    pub static ref BACKEND_CALLS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_backend_calls_total"), "Calls to model backends"),
        &["model", "operation", "outcome"]
    ).expect("Failed to create backend_calls_total metric");

    pub static ref BACKEND_CALL_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_backend_call_duration_seconds"),
            "Model backend call duration in seconds"
        )
        .buckets(vec![0.1, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 900.0]),
        &["model", "operation"]
    ).expect("Failed to create backend_call_duration_seconds metric");

    pub static ref ACTIVE_MODEL: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_active_model"), "1 for the currently loaded model"),
        &["model"]
    ).expect("Failed to create active_model metric");

    // Track Metrics
    pub static ref TRACKS_GENERATED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_tracks_generated_total"), "Tracks stored by model and kind"),
        &["model", "kind"]
    ).expect("Failed to create tracks_generated_total metric");

    pub static ref PROCESS_MEMORY_BYTES: Gauge = Gauge::new(
        format!("{PREFIX}_process_memory_bytes"),
        "Process memory usage in bytes"
    ).expect("Failed to create process_memory_bytes metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(BACKEND_CALLS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(BACKEND_CALL_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(ACTIVE_MODEL.clone()));
    let _ = REGISTRY.register(Box::new(TRACKS_GENERATED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PROCESS_MEMORY_BYTES.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Collapse per-track path segments so label cardinality stays bounded.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if uuid::Uuid::parse_str(segment).is_ok() {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let path = normalize_path(path);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, &path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, &path])
        .observe(duration.as_secs_f64());
}

pub fn record_backend_call(model: &str, operation: &str, outcome: &str, duration: Duration) {
    BACKEND_CALLS_TOTAL
        .with_label_values(&[model, operation, outcome])
        .inc();

    BACKEND_CALL_DURATION_SECONDS
        .with_label_values(&[model, operation])
        .observe(duration.as_secs_f64());
}

pub fn record_track_generated(model: &str, kind: &str) {
    TRACKS_GENERATED_TOTAL
        .with_label_values(&[model, kind])
        .inc();
}

/// Mark `model` as the only active one, or none.
pub fn set_active_model(model: Option<&str>) {
    ACTIVE_MODEL.reset();
    if let Some(model) = model {
        ACTIVE_MODEL.with_label_values(&[model]).set(1.0);
    }
}

pub fn update_memory_usage() {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if line.starts_with("VmRSS:") {
                    // RSS in kB
                    if let Some(kb) = line
                        .split_whitespace()
                        .nth(1)
                        .and_then(|kb| kb.parse::<f64>().ok())
                    {
                        PROCESS_MEMORY_BYTES.set(kb * 1024.0);
                        return;
                    }
                }
            }
        }
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    update_memory_usage();

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
