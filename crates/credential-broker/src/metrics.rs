//! Acquisition counters
//!
//! - `credential_broker_acquisitions_total` (counter): label `path`
//!   (`reuse`, `refresh`, `mint`, `failed`)
//!
//! Without an installed recorder these calls are no-ops.

/// Record which path an acquisition took.
pub(crate) fn record_acquisition(path: &'static str) {
    metrics::counter!("credential_broker_acquisitions_total", "path" => path).increment(1);
}
