//! Error types for rule-set fetching and refresh.

use thiserror::Error;

/// Failure to retrieve or parse a single configuration profile.
///
/// Carries the profile name so refresh logs identify which of the configured
/// profiles is unhealthy.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The profile name is not an `application:environment:configuration`
    /// triple.
    #[error("invalid profile name {0:?}: expected application:environment:configuration")]
    InvalidProfileName(String),

    /// The request could not be issued or the transport failed.
    #[error("profile {profile}: request failed: {source}")]
    Transport {
        /// Profile being fetched.
        profile: String,
        /// Underlying client error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The agent answered with a non-2xx status.
    #[error("profile {profile}: agent returned status {status}")]
    Status {
        /// Profile being fetched.
        profile: String,
        /// HTTP status from the agent.
        status: u16,
    },

    /// The fetch did not complete within the per-profile timeout.
    #[error("profile {profile}: fetch timed out after {timeout_secs}s")]
    Timeout {
        /// Profile being fetched.
        profile: String,
        /// Configured timeout in seconds.
        timeout_secs: u64,
    },

    /// The response body is not a YAML mapping.
    #[error("profile {profile}: invalid profile document: {message}")]
    InvalidDocument {
        /// Profile being fetched.
        profile: String,
        /// Parser diagnostic.
        message: String,
    },
}

/// Failure of a whole refresh pass.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// Every configured profile failed on the initial pass; there is no prior
    /// snapshot to fall back to, so the process cannot safely serve.
    #[error("initial refresh produced no usable profiles ({attempted} attempted)")]
    NoUsableProfiles {
        /// How many profiles were attempted.
        attempted: usize,
    },
}

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;
