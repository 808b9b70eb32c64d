//! Structured access-log records.

use chrono::{SecondsFormat, Utc};
use tracing::info;

/// One line per completed request.
///
/// `client_ip` is the address selected by the `X-Forwarded-For` index rule,
/// or the raw header value when extraction failed, or `unknown`.
#[derive(Debug)]
pub struct AccessRecord {
    /// Correlation id (inbound `X-B3-TraceId` or generated).
    pub request_id: String,
    /// Client address, best effort.
    pub client_ip: String,
    /// Request method.
    pub method: String,
    /// Raw request path.
    pub path: String,
    /// `allow`, `deny` or `bypass`.
    pub decision: &'static str,
    /// Deny reason, present only on denials.
    pub reason: Option<&'static str>,
    /// Which check admitted the request, present only on engine allows.
    pub allowed_via: Option<&'static str>,
    /// Origin status when the request was forwarded and answered.
    pub upstream_status: Option<u64>,
    /// Response bytes when the origin declared a length.
    pub bytes: Option<u64>,
    /// Wall-clock milliseconds from receipt to response head.
    pub elapsed_ms: u64,
    /// Version of the rule snapshot the request was evaluated against.
    pub snapshot_version: u64,
}

impl AccessRecord {
    /// Emit the record.  Denials log at INFO like everything else; operators
    /// alert on the `decision` field, not the level.
    pub fn emit(&self) {
        info!(
            ts = %Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            request_id = %self.request_id,
            client_ip = %self.client_ip,
            method = %self.method,
            path = %self.path,
            decision = self.decision,
            reason = self.reason,
            allowed_via = self.allowed_via,
            upstream_status = self.upstream_status,
            bytes = self.bytes,
            elapsed_ms = self.elapsed_ms,
            snapshot_version = self.snapshot_version,
            "request complete"
        );
    }
}
