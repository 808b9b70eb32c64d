//! Per-environment overlay over the process environment.
//!
//! Deployment environments share one container image; environment-specific
//! values are expressed by prefixing a variable with the upper-cased
//! environment name.  With `COPILOT_ENVIRONMENT_NAME=staging`,
//! `STAGING_IPFILTER_ENABLED` shadows `IPFILTER_ENABLED`.  An empty shadow
//! value is an explicit unset and is returned as-is.

use std::collections::HashMap;

use super::error::{ConfigError, ConfigResult};

/// Name of the variable carrying the deployment environment name.
pub const ENVIRONMENT_NAME_VAR: &str = "COPILOT_ENVIRONMENT_NAME";

/// A captured view of the process environment with overlay resolution and
/// typed coercions.
///
/// The map is captured once; later mutations of the real process environment
/// are invisible, which keeps every accessor a pure function.
#[derive(Debug, Clone)]
pub struct Environ {
    vars: HashMap<String, String>,
    /// Upper-cased environment name plus joining underscore, e.g. `STAGING_`.
    shadow_prefix: Option<String>,
}

impl Environ {
    /// Capture the current process environment.
    #[must_use]
    pub fn from_process() -> Self {
        Self::from_vars(std::env::vars().collect())
    }

    /// Build from an explicit map.  Used by tests and by anything that wants
    /// deterministic resolution.
    #[must_use]
    pub fn from_vars(vars: HashMap<String, String>) -> Self {
        let shadow_prefix = vars
            .get(ENVIRONMENT_NAME_VAR)
            .map(|name| format!("{}_", name.to_uppercase()));
        Self {
            vars,
            shadow_prefix,
        }
    }

    /// The deployment environment name.
    pub fn environment_name(&self) -> ConfigResult<&str> {
        self.vars
            .get(ENVIRONMENT_NAME_VAR)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::MissingVar(ENVIRONMENT_NAME_VAR.to_string()))
    }

    /// Resolve `name` with the per-environment shadow applied: `<ENV>_<NAME>`
    /// wins when set (an empty string counts as set), else `<NAME>`, else
    /// absent.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        if let Some(prefix) = &self.shadow_prefix {
            if let Some(value) = self.vars.get(&format!("{prefix}{name}")) {
                return Some(value);
            }
        }
        self.vars.get(name).map(String::as_str)
    }

    /// Resolve a required variable.  Required variables identify the
    /// deployment itself, so the shadow overlay does not apply.
    pub fn required(&self, name: &str) -> ConfigResult<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::MissingVar(name.to_string()))
    }

    /// String accessor with a default.
    #[must_use]
    pub fn string_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or(default).to_string()
    }

    /// Integer accessor.  A present but unparseable value is an error rather
    /// than silently falling back to the default.
    pub fn int_or(&self, name: &str, default: i64) -> ConfigResult<i64> {
        match self.get(name) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|e| ConfigError::invalid(name, format!("{raw:?}: {e}"))),
        }
    }

    /// Boolean accessor: `True`, `true` and `1` are true, any other present
    /// value is false, absence yields the default.
    #[must_use]
    pub fn bool_or(&self, name: &str, default: bool) -> bool {
        match self.get(name) {
            None => default,
            Some(raw) => matches!(raw.trim(), "True" | "true" | "1"),
        }
    }

    /// Base-URL accessor: requires an `http` or `https` scheme and drops any
    /// trailing slash so paths can be appended directly.
    pub fn url_or(&self, name: &str, default: &str) -> ConfigResult<String> {
        let raw = self.get(name).unwrap_or(default);
        if !raw.starts_with("http://") && !raw.starts_with("https://") {
            return Err(ConfigError::invalid(
                name,
                format!("{raw:?} is not an http(s) URL"),
            ));
        }
        Ok(raw.trim_end_matches('/').to_string())
    }

    /// Comma-separated list accessor.  Entries are trimmed; an empty value
    /// (or an explicit empty shadow) yields an empty list.
    #[must_use]
    pub fn list(&self, name: &str) -> Vec<String> {
        match self.get(name) {
            None => Vec::new(),
            Some(raw) if raw.trim().is_empty() => Vec::new(),
            Some(raw) => raw
                .split(',')
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn environ(pairs: &[(&str, &str)]) -> Environ {
        Environ::from_vars(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_plain_resolution() {
        let env = environ(&[(ENVIRONMENT_NAME_VAR, "prod"), ("SERVER", "origin:8000")]);
        assert_eq!(env.get("SERVER"), Some("origin:8000"));
        assert_eq!(env.get("MISSING"), None);
    }

    #[test]
    fn test_shadow_wins() {
        let env = environ(&[
            (ENVIRONMENT_NAME_VAR, "staging"),
            ("IPFILTER_ENABLED", "true"),
            ("STAGING_IPFILTER_ENABLED", "false"),
        ]);
        assert_eq!(env.get("IPFILTER_ENABLED"), Some("false"));
    }

    #[test]
    fn test_shadow_name_is_uppercased() {
        let env = environ(&[
            (ENVIRONMENT_NAME_VAR, "dev"),
            ("DEV_EMAIL", "dev@example.test"),
        ]);
        assert_eq!(env.get("EMAIL"), Some("dev@example.test"));
    }

    #[test]
    fn test_empty_shadow_is_explicit_unset() {
        let env = environ(&[
            (ENVIRONMENT_NAME_VAR, "staging"),
            ("PUBLIC_PATHS", "/healthcheck"),
            ("STAGING_PUBLIC_PATHS", ""),
        ]);
        assert_eq!(env.get("PUBLIC_PATHS"), Some(""));
        assert!(env.list("PUBLIC_PATHS").is_empty());
    }

    #[test]
    fn test_required_ignores_shadow() {
        let env = environ(&[
            (ENVIRONMENT_NAME_VAR, "prod"),
            ("SERVER", "origin:8000"),
            ("PROD_SERVER", "evil:9999"),
        ]);
        assert_eq!(env.required("SERVER").unwrap(), "origin:8000");
        assert!(env.required("ABSENT").is_err());
    }

    #[test]
    fn test_int_accessor() {
        let env = environ(&[(ENVIRONMENT_NAME_VAR, "prod"), ("PORT", "9090")]);
        assert_eq!(env.int_or("PORT", 8080).unwrap(), 9090);
        assert_eq!(env.int_or("OTHER", 8080).unwrap(), 8080);

        let env = environ(&[(ENVIRONMENT_NAME_VAR, "prod"), ("PORT", "eighty")]);
        assert!(env.int_or("PORT", 8080).is_err());
    }

    #[test]
    fn test_negative_int() {
        let env = environ(&[
            (ENVIRONMENT_NAME_VAR, "prod"),
            ("IP_DETERMINED_BY_X_FORWARDED_FOR_INDEX", "-3"),
        ]);
        assert_eq!(
            env.int_or("IP_DETERMINED_BY_X_FORWARDED_FOR_INDEX", -2)
                .unwrap(),
            -3
        );
    }

    #[test]
    fn test_bool_accessor() {
        let env = environ(&[
            (ENVIRONMENT_NAME_VAR, "prod"),
            ("A", "True"),
            ("B", "true"),
            ("C", "1"),
            ("D", "yes"),
            ("E", "false"),
        ]);
        assert!(env.bool_or("A", false));
        assert!(env.bool_or("B", false));
        assert!(env.bool_or("C", false));
        assert!(!env.bool_or("D", false));
        assert!(!env.bool_or("E", true));
        assert!(env.bool_or("MISSING", true));
    }

    #[test]
    fn test_url_accessor() {
        let env = environ(&[
            (ENVIRONMENT_NAME_VAR, "prod"),
            ("AGENT", "http://localhost:2772/"),
            ("BAD", "localhost:2772"),
        ]);
        assert_eq!(
            env.url_or("AGENT", "http://localhost:2772").unwrap(),
            "http://localhost:2772"
        );
        assert_eq!(
            env.url_or("MISSING", "https://agent.internal").unwrap(),
            "https://agent.internal"
        );
        assert!(env.url_or("BAD", "http://localhost:2772").is_err());
    }

    #[test]
    fn test_list_accessor() {
        let env = environ(&[
            (ENVIRONMENT_NAME_VAR, "prod"),
            ("PATHS", "/a, /b ,/c"),
            ("EMPTY", ""),
        ]);
        assert_eq!(env.list("PATHS"), vec!["/a", "/b", "/c"]);
        assert!(env.list("EMPTY").is_empty());
        assert!(env.list("MISSING").is_empty());
    }
}
