use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all appraiser metrics
const PREFIX: &str = "appraiser";

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

    // Authentication Metrics
    pub static ref AUTH_LOGIN_ATTEMPTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_auth_login_attempts_total"), "Total OAuth callback outcomes"),
        &["status"]
    ).expect("Failed to create auth_login_attempts_total metric");

    // Upstream Metrics
    pub static ref UPSTREAM_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_upstream_request_duration_seconds"),
            "Duration of requests to the account and marketplace providers"
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["provider", "status"]
    ).expect("Failed to create upstream_request_duration_seconds metric");

    // Pricing Metrics
    pub static ref PRICE_LOOKUPS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_price_lookups_total"), "Price lookups by outcome"),
        &["outcome"]
    ).expect("Failed to create price_lookups_total metric");

    pub static ref PRICE_CACHE_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_price_cache_requests_total"), "Price cache hits and misses"),
        &["result"]
    ).expect("Failed to create price_cache_requests_total metric");

    // Appraisal Metrics
    pub static ref APPRAISAL_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_appraisal_runs_total"), "Appraisal runs by final state"),
        &["state"]
    ).expect("Failed to create appraisal_runs_total metric");

    pub static ref APPRAISAL_ACTIVE_STREAMS: Gauge = Gauge::new(
        format!("{PREFIX}_appraisal_active_streams"),
        "Number of appraisal websocket streams currently open"
    ).expect("Failed to create appraisal_active_streams metric");

    // Process Metrics
    pub static ref PROCESS_MEMORY_BYTES: Gauge = Gauge::new(
        format!("{PREFIX}_process_memory_bytes"),
        "Process memory usage in bytes"
    ).expect("Failed to create process_memory_bytes metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(AUTH_LOGIN_ATTEMPTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(UPSTREAM_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(PRICE_LOOKUPS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PRICE_CACHE_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(APPRAISAL_RUNS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(APPRAISAL_ACTIVE_STREAMS.clone()));
    let _ = REGISTRY.register(Box::new(PROCESS_MEMORY_BYTES.clone()));

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

/// Record the outcome of an OAuth callback
pub fn record_login_attempt(status: &str) {
    AUTH_LOGIN_ATTEMPTS_TOTAL.with_label_values(&[status]).inc();
}

/// Record a request to an external provider. `status` is the HTTP status code,
/// or "error" when no response was received.
pub fn record_upstream_request(provider: &str, status: &str, duration: Duration) {
    UPSTREAM_REQUEST_DURATION_SECONDS
        .with_label_values(&[provider, status])
        .observe(duration.as_secs_f64());
}

/// Record a price lookup: "found", "not_found" or "error"
pub fn record_price_lookup(outcome: &str) {
    PRICE_LOOKUPS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record a price cache read
pub fn record_price_cache(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    PRICE_CACHE_REQUESTS_TOTAL.with_label_values(&[result]).inc();
}

/// Record the final state of an appraisal run
pub fn record_appraisal_run(state: &str) {
    APPRAISAL_RUNS_TOTAL.with_label_values(&[state]).inc();
}

pub fn appraisal_stream_opened() {
    APPRAISAL_ACTIVE_STREAMS.inc();
}

pub fn appraisal_stream_closed() {
    APPRAISAL_ACTIVE_STREAMS.dec();
}

/// Update process memory usage
pub fn update_memory_usage() {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if line.starts_with("VmRSS:") {
                    // RSS is reported in kB
                    if let Some(kb_str) = line.split_whitespace().nth(1) {
                        if let Ok(kb) = kb_str.parse::<f64>() {
                            PROCESS_MEMORY_BYTES.set(kb * 1024.0);
                            return;
                        }
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
