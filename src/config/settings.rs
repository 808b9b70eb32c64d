//! Effective per-process settings.
//!
//! `Settings` is resolved once at start-up from the [`Environ`] overlay and is
//! immutable afterwards: changing `SERVER`, `SERVER_PROTO` or the XFF index in
//! the environment of a running process has no effect.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use super::env::Environ;
use super::error::{ConfigError, ConfigResult};

/// Default port the sidecar listens on.
const DEFAULT_PORT: i64 = 8080;

/// Default base URL of the colocated configuration agent.
const DEFAULT_APPCONFIG_URL: &str = "http://localhost:2772";

/// Default index into `X-Forwarded-For` selecting the client address.
///
/// `-2` (second-from-right) assumes exactly one trusted hop (the fronting
/// load balancer) appends its own address to the header.  Deployments with
/// additional trusted hops must lower the index accordingly; this value is
/// security-relevant.
const DEFAULT_XFF_INDEX: i64 = -2;

/// Resolved process-wide settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Deployment environment name (`COPILOT_ENVIRONMENT_NAME`).
    pub environment: String,
    /// Origin authority, e.g. `origin.internal:8000` (`SERVER`).
    pub server: String,
    /// Origin scheme, `http` or `https` (`SERVER_PROTO`).
    pub server_proto: String,
    /// Listen port (`PORT`).
    pub port: u16,
    /// Log level name (`LOG_LEVEL`).
    pub log_level: String,
    /// Base URL of the configuration agent (`APPCONFIG_URL`).
    pub appconfig_url: String,
    /// Profile names to fetch, `application:environment:configuration`
    /// triples (`APPCONFIG_PROFILES`).
    pub appconfig_profiles: Vec<String>,
    /// Index into the `X-Forwarded-For` list selecting the client address,
    /// negative values counting from the right
    /// (`IP_DETERMINED_BY_X_FORWARDED_FOR_INDEX`).
    pub xff_index: i32,
    /// Contact address shown on the denial page (`EMAIL`).
    pub email: String,
    /// Human-readable label for the contact address (`EMAIL_NAME`).
    pub email_name: String,
    /// Master switch for the authorisation engine (`IPFILTER_ENABLED`).
    pub ipfilter_enabled: bool,
    /// Path prefixes exempt from authorisation (`PUBLIC_PATHS`).
    pub public_paths: Vec<String>,
    /// Path prefixes subject to authorisation (`PROTECTED_PATHS`).
    pub protected_paths: Vec<String>,
    /// Extra allow-listed addresses appended to every snapshot
    /// (`ADDITIONAL_IP_LIST`).
    pub additional_ip_list: Vec<String>,
    /// Period between rule-set refreshes (`APPCONFIG_REFRESH_SECS`).
    pub refresh_interval: Duration,
    /// Per-profile fetch timeout (`APPCONFIG_FETCH_TIMEOUT_SECS`).
    pub fetch_timeout: Duration,
    /// Upstream connect-plus-response-head timeout (`UPSTREAM_TIMEOUT_SECS`).
    pub upstream_timeout: Duration,
}

impl Settings {
    /// Resolve settings from the process environment.
    pub fn from_env(env: &Environ) -> ConfigResult<Self> {
        let environment = env.environment_name()?.to_string();
        let server = env.required("SERVER")?.to_string();

        let server_proto = env.string_or("SERVER_PROTO", "http");
        if server_proto != "http" && server_proto != "https" {
            return Err(ConfigError::invalid(
                "SERVER_PROTO",
                format!("expected http or https, got {server_proto:?}"),
            ));
        }

        let port = env.int_or("PORT", DEFAULT_PORT)?;
        let port = u16::try_from(port)
            .map_err(|_| ConfigError::invalid("PORT", format!("{port} is out of range")))?;

        // Required, therefore read without the shadow overlay.
        let appconfig_profiles: Vec<String> = env
            .required("APPCONFIG_PROFILES")?
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if appconfig_profiles.is_empty() {
            return Err(ConfigError::invalid(
                "APPCONFIG_PROFILES",
                "at least one profile is required",
            ));
        }

        let xff_index = env.int_or("IP_DETERMINED_BY_X_FORWARDED_FOR_INDEX", DEFAULT_XFF_INDEX)?;
        let xff_index = i32::try_from(xff_index).map_err(|_| {
            ConfigError::invalid(
                "IP_DETERMINED_BY_X_FORWARDED_FOR_INDEX",
                format!("{xff_index} is out of range"),
            )
        })?;

        let refresh_secs = env.int_or("APPCONFIG_REFRESH_SECS", 30)?;
        if refresh_secs <= 0 {
            return Err(ConfigError::invalid(
                "APPCONFIG_REFRESH_SECS",
                "must be positive",
            ));
        }
        let fetch_timeout_secs = env.int_or("APPCONFIG_FETCH_TIMEOUT_SECS", 5)?;
        if fetch_timeout_secs <= 0 {
            return Err(ConfigError::invalid(
                "APPCONFIG_FETCH_TIMEOUT_SECS",
                "must be positive",
            ));
        }
        let upstream_timeout_secs = env.int_or("UPSTREAM_TIMEOUT_SECS", 30)?;
        if upstream_timeout_secs <= 0 {
            return Err(ConfigError::invalid(
                "UPSTREAM_TIMEOUT_SECS",
                "must be positive",
            ));
        }

        Ok(Self {
            environment,
            server,
            server_proto,
            port,
            log_level: env.string_or("LOG_LEVEL", "INFO"),
            appconfig_url: env.url_or("APPCONFIG_URL", DEFAULT_APPCONFIG_URL)?,
            appconfig_profiles,
            xff_index,
            email: env.string_or("EMAIL", ""),
            email_name: env.string_or("EMAIL_NAME", "DBT"),
            ipfilter_enabled: env.bool_or("IPFILTER_ENABLED", true),
            public_paths: env.list("PUBLIC_PATHS"),
            protected_paths: env.list("PROTECTED_PATHS"),
            additional_ip_list: env.list("ADDITIONAL_IP_LIST"),
            refresh_interval: Duration::from_secs(refresh_secs as u64),
            fetch_timeout: Duration::from_secs(fetch_timeout_secs as u64),
            upstream_timeout: Duration::from_secs(upstream_timeout_secs as u64),
        })
    }

    /// Socket address the sidecar binds.
    #[must_use]
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.port)
    }

    /// Scheme-plus-authority of the origin, e.g. `http://origin.internal:8000`.
    #[must_use]
    pub fn origin_base(&self) -> String {
        format!("{}://{}", self.server_proto, self.server)
    }
}
