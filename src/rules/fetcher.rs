//! HTTP client for the colocated configuration agent.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use tracing::debug;

use super::error::{FetchError, FetchResult};
use super::fragment::{ProfileName, RuleFragment};

/// Fetches named profiles from the agent and parses them into rule fragments.
///
/// The agent is a localhost sidecar, so the client is plain HTTP/1 with a
/// short per-profile timeout; a slow agent counts as a failed fetch.
pub struct ProfileFetcher {
    client: Client<HttpConnector, Empty<Bytes>>,
    base_url: String,
    timeout: Duration,
}

impl std::fmt::Debug for ProfileFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileFetcher")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ProfileFetcher {
    /// Create a fetcher for the agent at `base_url` (no trailing slash).
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
            base_url: base_url.into(),
            timeout,
        }
    }

    /// Fetch and parse one profile.
    pub async fn fetch(&self, profile: &ProfileName) -> FetchResult<RuleFragment> {
        let uri: Uri = format!("{}{}", self.base_url, profile.request_path())
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| FetchError::Transport {
                profile: profile.to_string(),
                source: Box::new(e),
            })?;

        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Empty::new())
            .map_err(|e| FetchError::Transport {
                profile: profile.to_string(),
                source: Box::new(e),
            })?;

        let response = tokio::time::timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| FetchError::Timeout {
                profile: profile.to_string(),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| FetchError::Transport {
                profile: profile.to_string(),
                source: Box::new(e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                profile: profile.to_string(),
                status: status.as_u16(),
            });
        }

        let body = tokio::time::timeout(self.timeout, response.into_body().collect())
            .await
            .map_err(|_| FetchError::Timeout {
                profile: profile.to_string(),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| FetchError::Transport {
                profile: profile.to_string(),
                source: Box::new(e),
            })?
            .to_bytes();

        let fragment = RuleFragment::parse(profile, &body)?;
        debug!(
            profile = %profile,
            ip_ranges = fragment.ip_ranges.len(),
            basic_auth = fragment.basic_auth.len(),
            shared_tokens = fragment.shared_tokens.len(),
            "fetched profile"
        );
        Ok(fragment)
    }
}
