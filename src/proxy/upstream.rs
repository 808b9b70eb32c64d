//! Origin dispatch.
//!
//! Forwards a client request to `{SERVER_PROTO}://{SERVER}` and converts the
//! origin's answer back into the server's response type, streaming bodies in
//! both directions.  Framing is preserved: a request that arrived with a
//! `Content-Length` is forwarded with that same header and a sized body, and
//! a request that arrived with no body is forwarded with no body at all, so
//! bodiless GETs never grow a `Transfer-Encoding: chunked`.

use std::time::Duration;

use futures_util::{StreamExt, TryStreamExt};
use http::{header, HeaderMap, HeaderName, Response};
use http_body_util::{BodyExt, BodyStream, StreamBody};
use hyper::body::{Frame, Incoming};
use tracing::debug;

use crate::config::Settings;

use super::error::UpstreamError;
use super::ProxyBody;

/// Hop-by-hop headers, stripped in both directions.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::TRANSFER_ENCODING,
    header::TE,
    header::TRAILER,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::UPGRADE,
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.iter().any(|h| h == name)
}

/// Pooled client for the single configured origin.
#[derive(Debug)]
pub struct UpstreamClient {
    client: reqwest::Client,
    origin_base: String,
    timeout: Duration,
}

impl UpstreamClient {
    /// Build the origin client.  Redirects are never followed and bodies are
    /// never decompressed; the sidecar relays exactly what the origin sent.
    pub fn new(settings: &Settings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(settings.upstream_timeout)
            .build()?;
        Ok(Self {
            client,
            origin_base: settings.origin_base(),
            timeout: settings.upstream_timeout,
        })
    }

    /// Forward a request to the origin.
    ///
    /// `extra_strip` carries the shared-token header names from the snapshot
    /// in use; those secrets never reach the origin.  `X-Forwarded-For` is
    /// passed through untouched (the fronting load balancer is
    /// authoritative).
    pub async fn forward(
        &self,
        parts: http::request::Parts,
        body: Incoming,
        extra_strip: &[HeaderName],
    ) -> Result<reqwest::Response, UpstreamError> {
        let path_and_query = parts
            .uri
            .path_and_query()
            .map_or("/", |pq| pq.as_str());
        let url = format!("{}{}", self.origin_base, path_and_query);

        // Decide body handling from the original framing headers, before any
        // stripping.
        let has_body = parts.headers.contains_key(header::CONTENT_LENGTH)
            || parts
                .headers
                .get(header::TRANSFER_ENCODING)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.eq_ignore_ascii_case("chunked"));

        let mut headers = HeaderMap::with_capacity(parts.headers.len());
        for (name, value) in &parts.headers {
            if name == header::HOST || is_hop_by_hop(name) || extra_strip.contains(name) {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }

        let mut request = self
            .client
            .request(parts.method.clone(), &url)
            .headers(headers);

        if has_body {
            let stream = BodyStream::new(body)
                .try_filter_map(|frame| async move { Ok(frame.into_data().ok()) });
            request = request.body(reqwest::Body::wrap_stream(stream));
        }

        debug!(url = %url, method = %parts.method, "dispatching to origin");

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| UpstreamError::Timeout)?
            .map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::Timeout
                } else {
                    UpstreamError::Connect(e)
                }
            })?;

        Ok(response)
    }
}

/// Convert the origin's response into the server response, streaming the
/// body.  Status and headers propagate verbatim minus hop-by-hop headers.
#[must_use]
pub fn into_proxy_response(upstream: reqwest::Response) -> Response<ProxyBody> {
    let status = upstream.status();
    let origin_headers = upstream.headers().clone();

    let stream = upstream.bytes_stream().map(|result| {
        result
            .map(Frame::data)
            .map_err(std::io::Error::other)
    });
    let body: ProxyBody = BodyExt::boxed(StreamBody::new(stream));

    let mut response = Response::new(body);
    *response.status_mut() = status;
    let headers = response.headers_mut();
    for (name, value) in &origin_headers {
        if is_hop_by_hop(name) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    response
}
