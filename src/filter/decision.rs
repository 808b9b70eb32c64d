//! Authorisation decision types.

/// Which check admitted the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowVia {
    /// Client address inside an allow-listed network.
    IpRange,
    /// Matching path-scoped Basic credentials.
    BasicAuth,
    /// Matching shared-token header.
    SharedToken,
}

impl AllowVia {
    /// Stable name for logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IpRange => "ip_range",
            Self::BasicAuth => "basic_auth",
            Self::SharedToken => "shared_token",
        }
    }
}

/// Why a request was denied.  Logged, never sent to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Credential entries applied to the path but none matched.
    BasicAuthFailed,
    /// Token entries exist but no header matched.
    MissingSharedToken,
    /// `X-Forwarded-For` absent, too short for the configured index, or the
    /// selected element is not an IP address.
    MalformedXForwardedFor,
    /// No rule admitted the request.
    NoMatchingRule,
}

impl DenyReason {
    /// Stable name for logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BasicAuthFailed => "basic_auth_failed",
            Self::MissingSharedToken => "missing_shared_token",
            Self::MalformedXForwardedFor => "malformed_x_forwarded_for",
            Self::NoMatchingRule => "no_matching_rule",
        }
    }
}

/// Outcome of evaluating the authorisation predicate for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Forward to the origin.
    Allow(AllowVia),
    /// Render the denial page.
    Deny(DenyReason),
}

impl Decision {
    /// Whether the request may proceed upstream.
    #[must_use]
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow(_))
    }
}
