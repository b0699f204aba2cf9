// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the vcluster engine.
//!
//! All metrics carry the namespace prefix `vcluster_engine_`.
//!
//! # Metrics Categories
//!
//! - **Operation Metrics** - Lifecycle verbs per resource kind and their outcomes
//! - **Retry Metrics** - Retries issued by the retry executor
//! - **Convergence Metrics** - Poll observations while waiting for `Healthy`
//! - **Verification Metrics** - Outcomes of ambiguous-delete verification
//!
//! # Example
//!
//! ```rust,no_run
//! use vcluster_engine::metrics::{gather_metrics, record_operation};
//!
//! record_operation("cluster", "create", "success", std::time::Duration::from_secs(42));
//! println!("{}", gather_metrics().unwrap());
//! ```

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all engine metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "vcluster_engine";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Operation Metrics
// ============================================================================

/// Total number of lifecycle operations by kind, verb and outcome
///
/// Labels:
/// - `kind`: Resource kind (`cluster`, `release`, `secret`, `cleanup`)
/// - `verb`: Lifecycle verb (`create`, `read`, `update`, `delete`)
/// - `outcome`: `success` or an error category
pub static OPERATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_operations_total"),
        "Total number of lifecycle operations by kind, verb and outcome",
    );
    let counter = CounterVec::new(opts, &["kind", "verb", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of lifecycle operations in seconds
///
/// Labels:
/// - `kind`: Resource kind
/// - `verb`: Lifecycle verb
pub static OPERATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_operation_duration_seconds"),
        "Duration of lifecycle operations in seconds by kind and verb",
    )
    .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0]);
    let histogram = HistogramVec::new(opts, &["kind", "verb"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Retry Metrics
// ============================================================================

/// Total number of HTTP retries issued
///
/// Labels:
/// - `method`: HTTP method of the retried request
pub static HTTP_RETRIES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_http_retries_total"),
        "Total number of HTTP retries by method",
    );
    let counter = CounterVec::new(opts, &["method"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Convergence and Verification Metrics
// ============================================================================

/// Total number of convergence polls by observation outcome
///
/// Labels:
/// - `outcome`: `converged`, `pending`, `absent`, `missed`
pub static CONVERGENCE_POLLS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_convergence_polls_total"),
        "Total number of convergence polls by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of ambiguous-delete verifications by outcome
///
/// Labels:
/// - `outcome`: `confirmed_deleted`, `confirmed_present`, `inconclusive`
pub static DELETE_VERIFICATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_delete_verifications_total"),
        "Total number of ambiguous-delete verifications by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a finished lifecycle operation.
pub fn record_operation(kind: &str, verb: &str, outcome: &str, duration: Duration) {
    OPERATIONS_TOTAL
        .with_label_values(&[kind, verb, outcome])
        .inc();
    OPERATION_DURATION_SECONDS
        .with_label_values(&[kind, verb])
        .observe(duration.as_secs_f64());
}

/// Record one retry issued by the retry executor.
pub fn record_http_retry(method: &str) {
    HTTP_RETRIES_TOTAL.with_label_values(&[method]).inc();
}

/// Record one convergence poll observation.
pub fn record_convergence_poll(outcome: &str) {
    CONVERGENCE_POLLS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record one ambiguous-delete verification outcome.
pub fn record_delete_verification(outcome: &str) {
    DELETE_VERIFICATIONS_TOTAL
        .with_label_values(&[outcome])
        .inc();
}

/// Gather all metrics in Prometheus text format.
///
/// # Errors
///
/// Returns an error if metrics encoding fails.
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
