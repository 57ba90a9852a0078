//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Crawl session (requests, scraped pages, files, skips, errors)
//! - Extraction pipeline (files by extension, archive entries)
//! - Content indexer (rows inserted by level)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Crawl Session
// =============================================================================

/// Requests sent.
pub static REQUESTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("torrenti_requests_total", "Total crawl requests sent").unwrap()
});

/// Fetch duration in seconds.
pub static FETCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "torrenti_fetch_duration_seconds",
            "Duration of page and file fetches",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["result"], // "ok", "error"
    )
    .unwrap()
});

/// Pages fully processed.
pub static SCRAPED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("torrenti_scraped_total", "Total responses fully processed").unwrap()
});

/// File downloads detected.
pub static FILES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("torrenti_files_total", "Total file downloads detected").unwrap()
});

/// Links not queued because the target was already scraped.
pub static SKIPPED_VISITS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "torrenti_skipped_visits_total",
        "Total links skipped because the target was already scraped",
    )
    .unwrap()
});

/// Errors by stage.
pub static ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("torrenti_errors_total", "Total crawl errors"),
        &["stage"], // "fetch", "parse", "storage", "handler"
    )
    .unwrap()
});

// =============================================================================
// Extraction Pipeline
// =============================================================================

/// Files seen by the pipeline, by effective extension.
pub static EXTRACTED_FILES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "torrenti_extracted_files_total",
            "Files seen by the extraction pipeline",
        ),
        &["ext"],
    )
    .unwrap()
});

/// Entries read out of archives.
pub static ARCHIVE_ENTRIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("torrenti_archive_entries_total", "Entries read from archives"),
        &["format"], // "zip", "rar", "7z"
    )
    .unwrap()
});

// =============================================================================
// Content Indexer
// =============================================================================

/// Rows inserted by level.
pub static INDEXED_ROWS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("torrenti_indexed_rows_total", "Rows inserted by the indexer"),
        &["level"], // "meta_file", "torrent", "torrent_file", "subtitle"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Session
        Box::new(REQUESTS_TOTAL.clone()),
        Box::new(FETCH_DURATION.clone()),
        Box::new(SCRAPED_TOTAL.clone()),
        Box::new(FILES_TOTAL.clone()),
        Box::new(SKIPPED_VISITS_TOTAL.clone()),
        Box::new(ERRORS_TOTAL.clone()),
        // Pipeline
        Box::new(EXTRACTED_FILES.clone()),
        Box::new(ARCHIVE_ENTRIES.clone()),
        // Indexer
        Box::new(INDEXED_ROWS.clone()),
    ]
}
