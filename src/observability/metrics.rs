//! Metrics collection.
//!
//! # Metrics
//! - `mailsender_active_connections` (gauge): current connection count
//! - `mailsender_request_panics_total` (counter): handler panics caught by recovery
//! - `mailsender_accept_errors_total` (counter): failed accepts retried after a backoff
//! - `mailsender_serve_faults_total` (counter): accept loops that died unexpectedly
//! - `mailsender_shutdowns_total` (counter): completed shutdowns by `outcome`
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; the binary decides whether to
//!   install a recorder, so these are no-ops by default

/// Shutdown outcome label: every in-flight request drained in time.
pub const OUTCOME_DRAINED: &str = "drained";
/// Shutdown outcome label: the grace period elapsed and connections were closed.
pub const OUTCOME_TIMED_OUT: &str = "timed_out";
/// Shutdown outcome label: the serving task failed while draining.
pub const OUTCOME_FAILED: &str = "failed";

pub fn set_active_connections(count: u64) {
    metrics::gauge!("mailsender_active_connections").set(count as f64);
}

pub fn record_request_panic() {
    metrics::counter!("mailsender_request_panics_total").increment(1);
}

pub fn record_accept_error() {
    metrics::counter!("mailsender_accept_errors_total").increment(1);
}

pub fn record_serve_fault() {
    metrics::counter!("mailsender_serve_faults_total").increment(1);
}

pub fn record_shutdown(outcome: &'static str) {
    metrics::counter!("mailsender_shutdowns_total", "outcome" => outcome).increment(1);
}
