//! # Logging
//!
//! Subscriber initialisation and the structured per-request access log.

mod access;

pub use access::AccessRecord;

use tracing_subscriber::EnvFilter;

/// Initialise the global subscriber from the configured `LOG_LEVEL`.
///
/// The level string is an `EnvFilter` directive, so operators can pass either
/// a plain level (`INFO`) or a full filter (`info,ipfilter_sidecar=debug`).
/// An unparseable value falls back to `info`.
pub fn init(log_level: &str) {
    let filter = EnvFilter::try_new(log_level.to_lowercase())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
