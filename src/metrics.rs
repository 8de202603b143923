// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the service DNS publisher.
//!
//! All metrics carry the namespace prefix `kube_gce_dns_`.
//!
//! # Metrics Categories
//!
//! - **Event Metrics** - Watch notifications by kind and what happened to them
//! - **Change Metrics** - Submitted changes by outcome, and how long they took
//! - **Drift Metrics** - Provider consistency checks by result
//!
//! # Example
//!
//! ```rust,no_run
//! use kube_gce_dns::metrics::{gather_metrics, record_change_outcome};
//!
//! record_change_outcome("done", std::time::Duration::from_secs(2));
//! let text = gather_metrics().unwrap();
//! ```

use crate::constants::METRICS_SERVER_PATH;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{error, info};

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "kube_gce_dns";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Event Metrics
// ============================================================================

/// Total number of service events by kind and outcome
///
/// Labels:
/// - `kind`: `add`, `update`, `delete`
/// - `outcome`: `ineligible`, `noop`, `apply`, `reconcile`
pub static EVENTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_service_events_total"),
        "Total number of service events by kind and outcome",
    );
    let counter = CounterVec::new(opts, &["kind", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Change Metrics
// ============================================================================

/// Total number of changes by outcome
///
/// Labels:
/// - `outcome`: `done`, `rejected`, `unknown`
pub static CHANGES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_changes_total"),
        "Total number of DNS changes by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Time from change submission to its outcome, in seconds
///
/// Labels:
/// - `outcome`: `done`, `rejected`, `unknown`
pub static CHANGE_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_change_duration_seconds"),
        "Time from change submission to outcome in seconds",
    )
    .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]);
    let histogram = HistogramVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Drift Metrics
// ============================================================================

/// Total number of drift checks by result
///
/// Labels:
/// - `result`: `in_sync`, `drifted`, `error`
pub static DRIFT_CHECKS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_drift_checks_total"),
        "Total number of provider drift checks by result",
    );
    let counter = CounterVec::new(opts, &["result"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record what happened to a service event
///
/// # Arguments
/// * `kind` - The event kind (`add`, `update`, `delete`)
/// * `outcome` - What the dispatcher did with it
pub fn record_event(kind: &str, outcome: &str) {
    EVENTS_TOTAL.with_label_values(&[kind, outcome]).inc();
}

/// Record the outcome of a submitted change
///
/// # Arguments
/// * `outcome` - `done`, `rejected` or `unknown`
/// * `duration` - Time from submission to outcome
pub fn record_change_outcome(outcome: &str, duration: Duration) {
    CHANGES_TOTAL.with_label_values(&[outcome]).inc();
    CHANGE_DURATION_SECONDS
        .with_label_values(&[outcome])
        .observe(duration.as_secs_f64());
}

/// Record the result of a drift check
///
/// # Arguments
/// * `result` - `in_sync`, `drifted` or `error`
pub fn record_drift_check(result: &str) {
    DRIFT_CHECKS_TOTAL.with_label_values(&[result]).inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

async fn metrics_handler() -> impl IntoResponse {
    match gather_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Router exposing the metrics endpoint
#[must_use]
pub fn metrics_router() -> Router {
    Router::new().route(METRICS_SERVER_PATH, get(metrics_handler))
}

/// Serve the metrics endpoint on `addr` until the process exits.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn serve_metrics(addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, path = METRICS_SERVER_PATH, "Serving Prometheus metrics");
    axum::serve(listener, metrics_router()).await
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod metrics_tests;
