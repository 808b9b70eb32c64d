//! Decides whether the authorisation engine applies to a request path.

use tracing::warn;

use crate::config::Settings;

/// Classification of a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// The authorisation engine must be consulted.
    Apply,
    /// The request goes straight upstream.
    Bypass,
}

/// Path-prefix classifier built once at start-up.
///
/// Prefix matching is byte-exact and case-sensitive against the raw
/// request-target, with no percent-decoding or normalisation; decoding first
/// would let `%2e%2e`-style spellings smuggle a protected path past the
/// public list.
#[derive(Debug)]
pub struct PathClassifier {
    enabled: bool,
    public_paths: Vec<String>,
    protected_paths: Vec<String>,
}

impl PathClassifier {
    /// Build a classifier.  `PUBLIC_PATHS` and `PROTECTED_PATHS` are mutually
    /// exclusive; when both are set the protected list is ignored with a
    /// one-shot warning.
    #[must_use]
    pub fn new(enabled: bool, public_paths: Vec<String>, mut protected_paths: Vec<String>) -> Self {
        if enabled && !public_paths.is_empty() && !protected_paths.is_empty() {
            warn!(
                "PUBLIC_PATHS and PROTECTED_PATHS are mutually exclusive; ignoring PROTECTED_PATHS"
            );
            protected_paths.clear();
        }
        Self {
            enabled,
            public_paths,
            protected_paths,
        }
    }

    /// Build from resolved settings.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.ipfilter_enabled,
            settings.public_paths.clone(),
            settings.protected_paths.clone(),
        )
    }

    /// Classify a raw request path.
    #[must_use]
    pub fn classify(&self, path: &str) -> RouteClass {
        if !self.enabled {
            return RouteClass::Bypass;
        }

        // Paths are protected by default unless listed in PUBLIC_PATHS.
        if !self.public_paths.is_empty() {
            return if self.public_paths.iter().any(|p| path.starts_with(p.as_str())) {
                RouteClass::Bypass
            } else {
                RouteClass::Apply
            };
        }

        // With PROTECTED_PATHS set, paths are public by default instead.
        if !self.protected_paths.is_empty() {
            return if self
                .protected_paths
                .iter()
                .any(|p| path.starts_with(p.as_str()))
            {
                RouteClass::Apply
            } else {
                RouteClass::Bypass
            };
        }

        RouteClass::Apply
    }
}
