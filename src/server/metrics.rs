use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all chart-insights metrics
const PREFIX: &str = "chart_insights";

lazy_static! {
    // Global Prometheus registry
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
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Ingestion Metrics
    pub static ref INGESTION_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_ingestion_runs_total"), "Ingestion runs by market and outcome"),
        &["market", "status"]
    ).expect("Failed to create ingestion_runs_total metric");

    pub static ref INGESTION_TRACKS_PROCESSED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_ingestion_tracks_processed_total"),
            "Tracks written by ingestion runs"
        ),
        &["market"]
    ).expect("Failed to create ingestion_tracks_processed_total metric");

    pub static ref INGESTION_ITEMS_FAILED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_ingestion_items_failed_total"),
            "Playlist items that failed to ingest"
        ),
        &["market"]
    ).expect("Failed to create ingestion_items_failed_total metric");

    // Catalog API Metrics
    pub static ref CATALOG_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_catalog_requests_total"), "Requests sent to the catalog API"),
        &["status"]
    ).expect("Failed to create catalog_requests_total metric");

    // Cache Metrics
    pub static ref CACHE_ENTRIES: Gauge = Gauge::new(
        format!("{PREFIX}_cache_entries"),
        "Entries currently held by the response cache"
    ).expect("Failed to create cache_entries metric");

    // Background Job Metrics
    pub static ref BACKGROUND_JOB_EXECUTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_background_job_executions_total"), "Background job executions"),
        &["job_id", "status"]
    ).expect("Failed to create background_job_executions_total metric");

    pub static ref BACKGROUND_JOB_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_background_job_duration_seconds"),
            "Background job duration in seconds"
        )
        .buckets(vec![0.01, 0.1, 1.0, 10.0, 60.0, 300.0]),
        &["job_id"]
    ).expect("Failed to create background_job_duration_seconds metric");

    pub static ref BACKGROUND_JOB_RUNNING: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_background_job_running"), "Whether a background job is running"),
        &["job_id"]
    ).expect("Failed to create background_job_running metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(INGESTION_RUNS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(INGESTION_TRACKS_PROCESSED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(INGESTION_ITEMS_FAILED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CATALOG_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CACHE_ENTRIES.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_EXECUTIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_RUNNING.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Record the outcome of one ingestion run ("success" or "failed")
pub fn record_ingestion_run(market: &str, status: &str) {
    INGESTION_RUNS_TOTAL
        .with_label_values(&[market, status])
        .inc();
}

pub fn record_ingestion_tracks(market: &str, count: usize) {
    INGESTION_TRACKS_PROCESSED_TOTAL
        .with_label_values(&[market])
        .inc_by(count as f64);
}

pub fn record_ingestion_items_failed(market: &str, count: usize) {
    if count > 0 {
        INGESTION_ITEMS_FAILED_TOTAL
            .with_label_values(&[market])
            .inc_by(count as f64);
    }
}

/// Record one catalog API response by status code, or "network_error"
pub fn record_catalog_request(status: &str) {
    CATALOG_REQUESTS_TOTAL.with_label_values(&[status]).inc();
}

pub fn set_cache_entries(count: usize) {
    CACHE_ENTRIES.set(count as f64);
}

/// Record a finished background job execution
pub fn record_background_job_execution(job_id: &str, status: &str, duration: Duration) {
    BACKGROUND_JOB_EXECUTIONS_TOTAL
        .with_label_values(&[job_id, status])
        .inc();
    BACKGROUND_JOB_DURATION_SECONDS
        .with_label_values(&[job_id])
        .observe(duration.as_secs_f64());
}

pub fn set_background_job_running(job_id: &str, running: bool) {
    BACKGROUND_JOB_RUNNING
        .with_label_values(&[job_id])
        .set(if running { 1.0 } else { 0.0 });
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_else(|_| String::from(""));
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
