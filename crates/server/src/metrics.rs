//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the discvault server:
//! - HTTP request metrics (latency, counts, errors)
//! - Library size (collected dynamically)
//! - Core install, chunk and assembly metrics

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tracing::warn;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "discvault_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 60.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("discvault_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "discvault_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Library Metrics (collected dynamically)
// =============================================================================

/// Installed titles.
pub static LIBRARY_TITLES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("discvault_library_titles", "Number of installed titles").unwrap()
});

/// Bytes of installed sources.
pub static LIBRARY_BYTES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "discvault_library_bytes",
        "Total size of installed sources in bytes",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Library
    registry.register(Box::new(LIBRARY_TITLES.clone())).unwrap();
    registry.register(Box::new(LIBRARY_BYTES.clone())).unwrap();

    // Core metrics (installs, chunks, assembly)
    for metric in discvault_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// This is called before encoding metrics to update gauges with current values
/// from the library.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    match state.library().stats().await {
        Ok(stats) => {
            LIBRARY_TITLES.set(stats.title_count as i64);
            LIBRARY_BYTES.set(stats.total_bytes as i64);
        }
        Err(e) => warn!(error = %e, "Failed to collect library metrics"),
    }
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    static TITLE_ID: Lazy<regex_lite::Regex> =
        Lazy::new(|| regex_lite::Regex::new(r"local_[0-9a-zA-Z]+").unwrap());
    static NUMERIC: Lazy<regex_lite::Regex> =
        Lazy::new(|| regex_lite::Regex::new(r"/\d+(/|$)").unwrap());

    let result = TITLE_ID.replace_all(path, "{id}");
    let result = NUMERIC.replace_all(&result, "/{id}$1");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_title_id() {
        let path = "/api/v1/titles/local_0192f0c4a7b87c3e9d2f1a6b5c4d3e2f";
        assert_eq!(normalize_path(path), "/api/v1/titles/{id}");
    }

    #[test]
    fn test_normalize_path_title_id_middle() {
        let path = "/api/v1/titles/local_0192f0c4a7b87c3e9d2f1a6b5c4d3e2f/play";
        assert_eq!(normalize_path(path), "/api/v1/titles/{id}/play");
    }

    #[test]
    fn test_normalize_path_numeric() {
        let path = "/api/v1/titles/12345";
        assert_eq!(normalize_path(path), "/api/v1/titles/{id}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        let path = "/api/v1/health";
        assert_eq!(normalize_path(path), "/api/v1/health");
    }

    #[test]
    fn test_registry_contains_all_metrics() {
        // Prometheus only outputs vector metrics that have been touched
        HTTP_REQUEST_DURATION
            .with_label_values(&["GET", "/test", "200"])
            .observe(0.1);
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();
        HTTP_REQUESTS_IN_FLIGHT.set(0);
        LIBRARY_TITLES.set(0);
        discvault_core::metrics::INSTALLS_TOTAL
            .with_label_values(&["single", "success"])
            .inc_by(0);

        let output = encode_metrics();

        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
        assert!(output.contains("discvault_http_request_duration_seconds"));
        assert!(output.contains("discvault_http_requests_total"));
        assert!(output.contains("discvault_http_requests_in_flight"));
        assert!(output.contains("discvault_library_titles"));
        assert!(output.contains("discvault_installs_total"));
        assert!(output.contains("discvault_chunks_written_total"));
    }
}
