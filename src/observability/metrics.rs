//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define management-plane metrics (fetches, commits, conflicts, record sets)
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `mgmt_context_fetch_total` (counter): fetches by file and outcome
//! - `mgmt_context_commit_total` (counter): commits by file and outcome
//! - `mgmt_commit_conflicts_total` (counter): stale commits rejected, by file
//! - `mgmt_record_sets_total` (counter): record sets by action needed
//! - `mgmt_admin_requests_total` (counter): admin API requests by route and status
//!
//! # Design Decisions
//! - Recording without an installed exporter is a no-op
//! - Labels are static strings or file names, never record values

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

pub const CONTEXT_FETCH_TOTAL: &str = "mgmt_context_fetch_total";
pub const CONTEXT_COMMIT_TOTAL: &str = "mgmt_context_commit_total";
pub const COMMIT_CONFLICTS_TOTAL: &str = "mgmt_commit_conflicts_total";
pub const RECORD_SETS_TOTAL: &str = "mgmt_record_sets_total";
pub const ADMIN_REQUESTS_TOTAL: &str = "mgmt_admin_requests_total";

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus exporter"),
    }
}

#[inline]
pub fn record_context_fetch(file: &'static str, outcome: &'static str) {
    counter!(CONTEXT_FETCH_TOTAL, "file" => file, "outcome" => outcome).increment(1);
}

#[inline]
pub fn record_context_commit(file: &'static str, outcome: &'static str) {
    counter!(CONTEXT_COMMIT_TOTAL, "file" => file, "outcome" => outcome).increment(1);
}

#[inline]
pub fn record_commit_conflict(file: &'static str) {
    counter!(COMMIT_CONFLICTS_TOTAL, "file" => file).increment(1);
}

/// Record one applied record set by its action-needed label.
#[inline]
pub fn record_record_set(action: &'static str) {
    counter!(RECORD_SETS_TOTAL, "action" => action).increment(1);
}

#[inline]
pub fn record_admin_request(route: &str, status: u16) {
    counter!(ADMIN_REQUESTS_TOTAL, "route" => route.to_owned(), "status" => status.to_string()).increment(1);
}
