//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Installs (by kind: single, chunked, archive)
//! - Chunk writes
//! - Assembly on play
//! - Removals

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Install Metrics
// =============================================================================

/// Installs total by kind and result.
pub static INSTALLS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("discvault_installs_total", "Total title installs"),
        &["kind", "result"], // kind: "single", "chunked", "archive"; result: "success", error kind
    )
    .unwrap()
});

/// Install duration in seconds.
pub static INSTALL_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "discvault_install_duration_seconds",
            "Duration of title installs",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        &["kind"],
    )
    .unwrap()
});

// =============================================================================
// Chunk Store Metrics
// =============================================================================

/// Chunks written total.
pub static CHUNKS_WRITTEN: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "discvault_chunks_written_total",
        "Total chunks committed to the chunk store",
    )
    .unwrap()
});

/// Payload bytes written total.
pub static BYTES_WRITTEN: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "discvault_bytes_written_total",
        "Total payload bytes committed to the chunk store",
    )
    .unwrap()
});

/// Chunk write failures total.
pub static CHUNK_WRITE_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "discvault_chunk_write_failures_total",
        "Total chunk writes that failed",
    )
    .unwrap()
});

// =============================================================================
// Assembly Metrics
// =============================================================================

/// Assemblies total by result.
pub static ASSEMBLIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("discvault_assemblies_total", "Total image assemblies"),
        &["result"], // "success", "corrupt", "error"
    )
    .unwrap()
});

/// Assembly duration in seconds.
pub static ASSEMBLY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "discvault_assembly_duration_seconds",
            "Duration of image assembly",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &[],
    )
    .unwrap()
});

/// Titles removed total.
pub static TITLES_REMOVED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("discvault_titles_removed_total", "Total titles removed").unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Installs
        Box::new(INSTALLS_TOTAL.clone()),
        Box::new(INSTALL_DURATION.clone()),
        // Chunks
        Box::new(CHUNKS_WRITTEN.clone()),
        Box::new(BYTES_WRITTEN.clone()),
        Box::new(CHUNK_WRITE_FAILURES.clone()),
        // Assembly
        Box::new(ASSEMBLIES_TOTAL.clone()),
        Box::new(ASSEMBLY_DURATION.clone()),
        Box::new(TITLES_REMOVED.clone()),
    ]
}
