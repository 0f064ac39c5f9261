//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Conversions (one per `/convert` request)
//! - Transcode tasks (one per requested preset)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Conversion Metrics
// =============================================================================

/// Conversions total by outcome.
pub static CONVERSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("brakeweb_conversions_total", "Total conversion requests"),
        &["outcome"], // "succeeded", "rejected", "storage_failed", "transcode_failed", "catalog_failed"
    )
    .unwrap()
});

// =============================================================================
// Task Metrics
// =============================================================================

/// Transcode tasks total by outcome.
pub static TASKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("brakeweb_transcode_tasks_total", "Total transcode tasks"),
        &["outcome"], // "succeeded", "failed", "timeout", "cancelled", "aborted"
    )
    .unwrap()
});

/// Engine processes currently running.
pub static TASKS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "brakeweb_transcode_tasks_active",
        "Number of transcode tasks currently running",
    )
    .unwrap()
});

/// Transcode task duration in seconds.
pub static TASK_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "brakeweb_transcode_task_duration_seconds",
            "Duration of transcode tasks",
        )
        .buckets(vec![
            1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0,
        ]),
        &["outcome"],
    )
    .unwrap()
});

/// Returns all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(CONVERSIONS_TOTAL.clone()),
        Box::new(TASKS_TOTAL.clone()),
        Box::new(TASKS_ACTIVE.clone()),
        Box::new(TASK_DURATION.clone()),
    ]
}
