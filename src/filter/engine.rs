//! The per-request authorisation predicate.
//!
//! Three independent checks are combined with a short-circuit OR so that a
//! CDN request (shared token), an automated test tool (Basic credentials) and
//! a direct trusted caller (allow-listed IP) each have their own admission
//! path.  Deny reasons are tracked explicitly and ranked; the client-facing
//! response is identical for every reason.

use std::net::IpAddr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderName};

use crate::rules::Snapshot;

use super::decision::{AllowVia, Decision, DenyReason};

/// Header consulted for the client address.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Constant-time byte comparison to prevent timing side-channel attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Result of evaluating one request against a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authorisation {
    /// The decision.
    pub decision: Decision,
    /// Client address as selected from `X-Forwarded-For`, when it could be
    /// extracted.  Used for logging regardless of the decision.
    pub client_ip: Option<IpAddr>,
}

/// Evaluates the authorisation predicate.
///
/// The engine is stateless apart from the configured `X-Forwarded-For`
/// index; the rule set arrives per call as a [`Snapshot`] so that one request
/// never observes two rule generations.
#[derive(Debug, Clone, Copy)]
pub struct AuthEngine {
    xff_index: i32,
}

impl AuthEngine {
    /// Create an engine selecting the client address with the given index
    /// (negative values count from the right of the `X-Forwarded-For` list).
    #[must_use]
    pub fn new(xff_index: i32) -> Self {
        Self { xff_index }
    }

    /// Select the client address from the request headers, if possible.
    #[must_use]
    pub fn client_ip(&self, headers: &HeaderMap) -> Option<IpAddr> {
        let raw = headers.get(X_FORWARDED_FOR)?.to_str().ok()?;
        let entries: Vec<&str> = raw.split(',').map(str::trim).collect();
        let index = resolve_index(self.xff_index, entries.len())?;
        entries[index].parse().ok()
    }

    /// Evaluate the predicate for a request path and header set.
    #[must_use]
    pub fn authorise(&self, path: &str, headers: &HeaderMap, snapshot: &Snapshot) -> Authorisation {
        let client_ip = self.client_ip(headers);

        // Check 1: client address inside an allow-listed network.
        if let Some(ip) = client_ip {
            if snapshot.contains_ip(&ip) {
                return Authorisation {
                    decision: Decision::Allow(AllowVia::IpRange),
                    client_ip,
                };
            }
        }

        // Check 2: Basic credentials scoped to the request path.
        let mut basic_auth_failed = false;
        let applicable: Vec<_> = snapshot
            .basic_auth()
            .iter()
            .filter(|entry| entry.matches_path(path))
            .collect();
        if !applicable.is_empty() {
            if let Some((username, password)) = decode_basic_credentials(headers) {
                let matched = applicable.iter().any(|entry| {
                    constant_time_eq(entry.username.as_bytes(), username.as_bytes())
                        && constant_time_eq(entry.password.as_bytes(), password.as_bytes())
                });
                if matched {
                    return Authorisation {
                        decision: Decision::Allow(AllowVia::BasicAuth),
                        client_ip,
                    };
                }
            }
            basic_auth_failed = true;
        }

        // Check 3: shared secret in a named header.
        let mut shared_token_failed = false;
        if !snapshot.shared_tokens().is_empty() {
            let matched = snapshot.shared_tokens().iter().any(|token| {
                let Ok(name) = HeaderName::try_from(token.header_name.as_str()) else {
                    return false;
                };
                headers
                    .get(&name)
                    .is_some_and(|value| constant_time_eq(value.as_bytes(), token.value.as_bytes()))
            });
            if matched {
                return Authorisation {
                    decision: Decision::Allow(AllowVia::SharedToken),
                    client_ip,
                };
            }
            shared_token_failed = true;
        }

        // Rank the deny reason: a failed credential attempt outranks a failed
        // token, which outranks an unusable X-Forwarded-For.
        let reason = if basic_auth_failed {
            DenyReason::BasicAuthFailed
        } else if shared_token_failed {
            DenyReason::MissingSharedToken
        } else if client_ip.is_none() {
            DenyReason::MalformedXForwardedFor
        } else {
            DenyReason::NoMatchingRule
        };

        Authorisation {
            decision: Decision::Deny(reason),
            client_ip,
        }
    }
}

/// Resolve a possibly-negative index into a list of `len` entries.
fn resolve_index(index: i32, len: usize) -> Option<usize> {
    if index >= 0 {
        let index = index as usize;
        (index < len).then_some(index)
    } else {
        len.checked_sub(index.unsigned_abs() as usize)
    }
}

/// Decode `Authorization: Basic …` into `(username, password)`.
fn decode_basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}
