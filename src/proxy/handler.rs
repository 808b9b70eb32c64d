//! Per-request pipeline: classify, authorise, forward or deny.

use std::sync::Arc;
use std::time::Instant;

use http::{HeaderMap, HeaderName, Request, Response};
use hyper::body::Incoming;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::filter::{AuthEngine, Decision, PathClassifier, RouteClass, X_FORWARDED_FOR};
use crate::logging::AccessRecord;
use crate::rules::{Snapshot, SnapshotStore};

use super::denial::{self, DenialRenderer};
use super::upstream::{into_proxy_response, UpstreamClient};
use super::ProxyBody;

/// Correlation-id header propagated from the fronting infrastructure.
const TRACE_ID_HEADER: &str = "x-b3-traceid";

/// User-agent prefix of load-balancer health probes, which reach the sidecar
/// directly and therefore never carry `X-Forwarded-For`.
const HEALTH_CHECK_UA_PREFIX: &str = "ELB-HealthChecker";

/// Everything the request path needs, shared across connections.
#[derive(Debug)]
pub struct ProxyState {
    classifier: PathClassifier,
    engine: AuthEngine,
    store: Arc<SnapshotStore>,
    upstream: UpstreamClient,
    denial: DenialRenderer,
}

impl ProxyState {
    /// Assemble the request-path state from resolved settings.
    pub fn new(settings: &Settings, store: Arc<SnapshotStore>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            classifier: PathClassifier::from_settings(settings),
            engine: AuthEngine::new(settings.xff_index),
            store,
            upstream: UpstreamClient::new(settings)?,
            denial: DenialRenderer::new(settings.email.clone(), settings.email_name.clone()),
        })
    }
}

/// Logs `client_abort` if the handler future is dropped before a response was
/// produced, which is how a mid-flight client disconnect manifests.
struct AbortGuard {
    armed: bool,
    request_id: String,
    method: String,
    path: String,
}

impl AbortGuard {
    fn new(request_id: String, method: String, path: String) -> Self {
        Self {
            armed: true,
            request_id,
            method,
            path,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        if self.armed {
            info!(
                request_id = %self.request_id,
                method = %self.method,
                path = %self.path,
                "client_abort"
            );
        }
    }
}

/// Serve one request.
pub async fn handle(
    state: Arc<ProxyState>,
    request: Request<Incoming>,
) -> Result<Response<ProxyBody>, std::convert::Infallible> {
    let started = Instant::now();
    // One snapshot per request: every check below sees the same rule
    // generation even if a refresh lands mid-flight.
    let snapshot = state.store.load();

    let (parts, body) = request.into_parts();
    let request_id = request_id_from(&parts.headers);
    let method = parts.method.to_string();
    let path = parts.uri.path().to_string();

    if is_health_probe(&parts.headers) {
        debug!(request_id = %request_id, "answering load-balancer health probe");
        return Ok(denial::health_ok());
    }

    let (decision, reason, allowed_via, client_ip) =
        match state.classifier.classify(&path) {
            RouteClass::Bypass => ("bypass", None, None, state.engine.client_ip(&parts.headers)),
            RouteClass::Apply => {
                let auth = state.engine.authorise(&path, &parts.headers, &snapshot);
                match auth.decision {
                    Decision::Allow(via) => ("allow", None, Some(via.as_str()), auth.client_ip),
                    Decision::Deny(why) => ("deny", Some(why.as_str()), None, auth.client_ip),
                }
            }
        };

    let client_label = client_ip
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| raw_forwarded_for(&parts.headers));

    if decision == "deny" {
        AccessRecord {
            request_id: request_id.clone(),
            client_ip: client_label,
            method,
            path,
            decision,
            reason,
            allowed_via: None,
            upstream_status: None,
            bytes: None,
            elapsed_ms: elapsed_ms(started),
            snapshot_version: snapshot.version(),
        }
        .emit();
        return Ok(state.denial.render(&request_id));
    }

    let mut guard = AbortGuard::new(request_id.clone(), method.clone(), path.clone());
    let strip = shared_token_header_names(&snapshot);
    let result = state.upstream.forward(parts, body, &strip).await;
    guard.disarm();

    match result {
        Ok(origin_response) => {
            let upstream_status = Some(u64::from(origin_response.status().as_u16()));
            let bytes = origin_response.content_length();
            AccessRecord {
                request_id,
                client_ip: client_label,
                method,
                path,
                decision,
                reason: None,
                allowed_via,
                upstream_status,
                bytes,
                elapsed_ms: elapsed_ms(started),
                snapshot_version: snapshot.version(),
            }
            .emit();
            Ok(into_proxy_response(origin_response))
        }
        Err(e) => {
            warn!(request_id = %request_id, error = %e, "origin dispatch failed");
            AccessRecord {
                request_id,
                client_ip: client_label,
                method,
                path,
                decision,
                reason: None,
                allowed_via,
                // The origin never answered; there is no upstream status.
                upstream_status: None,
                bytes: None,
                elapsed_ms: elapsed_ms(started),
                snapshot_version: snapshot.version(),
            }
            .emit();
            Ok(match e.status() {
                http::StatusCode::GATEWAY_TIMEOUT => denial::gateway_timeout(),
                _ => denial::bad_gateway(),
            })
        }
    }
}

/// Shared-token header names in the snapshot, for request stripping.
fn shared_token_header_names(snapshot: &Snapshot) -> Vec<HeaderName> {
    snapshot
        .shared_tokens()
        .iter()
        .filter_map(|token| HeaderName::try_from(token.header_name.as_str()).ok())
        .collect()
}

fn is_health_probe(headers: &HeaderMap) -> bool {
    !headers.contains_key(X_FORWARDED_FOR)
        && headers
            .get(http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ua| ua.starts_with(HEALTH_CHECK_UA_PREFIX))
}

/// Inbound trace id, or a short generated one.
fn request_id_from(headers: &HeaderMap) -> String {
    headers
        .get(TRACE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| {
            rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(8)
                .map(char::from)
                .collect()
        })
}

fn raw_forwarded_for(headers: &HeaderMap) -> String {
    headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
