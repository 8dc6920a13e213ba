//! Client-side metrics
//!
//! Emitted through the `metrics` facade; the embedding application decides
//! whether and how to export them. Without an installed recorder these calls
//! are no-ops.
//!
//! - `client_requests_total` (counter): labels `method`, `status`
//! - `client_request_duration_seconds` (histogram): label `status`
//! - `client_transport_errors_total` (counter): label `error_type`
//! - `auth_refresh_total` (counter): label `outcome` (success, failure, timeout)
//! - `auth_refresh_waiters` (histogram): callers released per renewal
//! - `auth_refresh_duration_seconds` (histogram)

/// Record one transport call that produced a status code.
pub fn record_request(method: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    ::metrics::counter!("client_requests_total", "method" => method.to_string(), "status" => status_str.clone())
        .increment(1);
    ::metrics::histogram!("client_request_duration_seconds", "status" => status_str)
        .record(duration_secs);
}

pub fn record_transport_error(error_type: &'static str) {
    ::metrics::counter!("client_transport_errors_total", "error_type" => error_type).increment(1);
}

/// Record a resolved renewal and how many suspended callers it released.
pub fn record_renewal(outcome: &'static str, waiters: usize, duration_secs: f64) {
    ::metrics::counter!("auth_refresh_total", "outcome" => outcome).increment(1);
    ::metrics::histogram!("auth_refresh_waiters").record(waiters as f64);
    ::metrics::histogram!("auth_refresh_duration_seconds").record(duration_secs);
}
