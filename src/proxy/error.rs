//! Error types for the proxy data plane.

use std::net::SocketAddr;

use thiserror::Error;

/// Fatal server errors.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The listen socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address the server tried to bind.
        addr: SocketAddr,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Per-request upstream failures.  Mapped to 502/504; the client never sees
/// the underlying diagnostic.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The forwarded request could not be constructed.
    #[error("invalid upstream request: {0}")]
    Request(String),

    /// The origin refused the connection or the transport failed.
    #[error("origin connection failed: {0}")]
    Connect(#[source] reqwest::Error),

    /// The origin did not produce a response head in time.
    #[error("origin timed out")]
    Timeout,
}

impl UpstreamError {
    /// HTTP status this failure maps to.
    #[must_use]
    pub fn status(&self) -> http::StatusCode {
        match self {
            Self::Timeout => http::StatusCode::GATEWAY_TIMEOUT,
            Self::Request(_) | Self::Connect(_) => http::StatusCode::BAD_GATEWAY,
        }
    }
}
