//! Profile documents fetched from the configuration agent.
//!
//! A profile is YAML with up to three recognised top-level keys; unknown keys
//! are ignored and absent keys contribute nothing.  Malformed *entries* are
//! dropped with a warning rather than failing the fetch, so one bad CIDR in a
//! shared profile cannot take the whole rule set down.

use std::fmt;
use std::str::FromStr;

use ipnet::IpNet;
use serde::Deserialize;
use tracing::warn;

use super::error::FetchError;
use super::snapshot::{parse_ip_range, BasicAuthEntry, SharedTokenEntry};

/// A profile name: the `application:environment:configuration` triple
/// addressing one document on the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileName {
    /// AppConfig application segment.
    pub application: String,
    /// AppConfig environment segment (not the local deployment environment).
    pub environment: String,
    /// AppConfig configuration segment.
    pub configuration: String,
}

impl ProfileName {
    /// Path of this profile on the agent.
    #[must_use]
    pub fn request_path(&self) -> String {
        format!(
            "/applications/{}/environments/{}/configurations/{}",
            self.application, self.environment, self.configuration
        )
    }
}

impl FromStr for ProfileName {
    type Err = FetchError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut parts = raw.split(':');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(e), Some(c), None) if !a.is_empty() && !e.is_empty() && !c.is_empty() => {
                Ok(Self {
                    application: a.to_string(),
                    environment: e.to_string(),
                    configuration: c.to_string(),
                })
            }
            _ => Err(FetchError::InvalidProfileName(raw.to_string())),
        }
    }
}

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.application, self.environment, self.configuration
        )
    }
}

#[derive(Debug, Deserialize)]
struct RawBasicAuth {
    #[serde(rename = "Path")]
    path: String,
    #[serde(rename = "Username")]
    username: String,
    #[serde(rename = "Password")]
    password: String,
}

#[derive(Debug, Deserialize)]
struct RawSharedToken {
    #[serde(rename = "HeaderName")]
    header_name: String,
    #[serde(rename = "Value")]
    value: String,
}

/// The typed rules contributed by a single profile.
#[derive(Debug, Clone, Default)]
pub struct RuleFragment {
    /// Allow-listed networks.
    pub ip_ranges: Vec<IpNet>,
    /// Path-scoped Basic credentials.
    pub basic_auth: Vec<BasicAuthEntry>,
    /// Shared-token header entries.
    pub shared_tokens: Vec<SharedTokenEntry>,
}

impl RuleFragment {
    /// Parse a profile body.
    ///
    /// Fails only when the document is not a YAML mapping at all; individual
    /// entries that do not match the expected shape are dropped with a WARN
    /// naming the profile and entry index.
    pub fn parse(profile: &ProfileName, body: &[u8]) -> Result<Self, FetchError> {
        let doc: serde_yaml::Value =
            serde_yaml::from_slice(body).map_err(|e| FetchError::InvalidDocument {
                profile: profile.to_string(),
                message: e.to_string(),
            })?;

        let mapping = match doc {
            serde_yaml::Value::Mapping(mapping) => mapping,
            // An empty body parses as null; it simply contributes nothing.
            serde_yaml::Value::Null => return Ok(Self::default()),
            other => {
                return Err(FetchError::InvalidDocument {
                    profile: profile.to_string(),
                    message: format!("expected a mapping, got {}", value_kind(&other)),
                })
            }
        };

        let mut fragment = Self::default();

        for (key, value) in mapping {
            let Some(key) = key.as_str() else { continue };
            match key {
                "IpRanges" => fragment.parse_ip_ranges(profile, value),
                // The agent has served both spellings over time.
                "SharedToken" | "SharedTokens" => fragment.parse_shared_tokens(profile, value),
                "BasicAuth" => fragment.parse_basic_auth(profile, value),
                _ => {}
            }
        }

        Ok(fragment)
    }

    fn parse_ip_ranges(&mut self, profile: &ProfileName, value: serde_yaml::Value) {
        for (index, entry) in sequence_of(profile, "IpRanges", value).into_iter().enumerate() {
            let Some(raw) = entry.as_str() else {
                warn!(profile = %profile, index, "dropping IpRanges entry: not a string");
                continue;
            };
            match parse_ip_range(raw) {
                Ok(range) => self.ip_ranges.push(range),
                Err(e) => {
                    warn!(profile = %profile, index, cidr = raw, error = %e, "dropping malformed IpRanges entry");
                }
            }
        }
    }

    fn parse_basic_auth(&mut self, profile: &ProfileName, value: serde_yaml::Value) {
        for (index, entry) in sequence_of(profile, "BasicAuth", value).into_iter().enumerate() {
            match serde_yaml::from_value::<RawBasicAuth>(entry) {
                Ok(raw) => self.basic_auth.push(BasicAuthEntry {
                    path_prefix: raw.path,
                    username: raw.username,
                    password: raw.password,
                }),
                Err(e) => {
                    warn!(profile = %profile, index, error = %e, "dropping malformed BasicAuth entry");
                }
            }
        }
    }

    fn parse_shared_tokens(&mut self, profile: &ProfileName, value: serde_yaml::Value) {
        for (index, entry) in sequence_of(profile, "SharedToken", value).into_iter().enumerate() {
            match serde_yaml::from_value::<RawSharedToken>(entry) {
                Ok(raw) => self.shared_tokens.push(SharedTokenEntry {
                    header_name: raw.header_name,
                    value: raw.value,
                }),
                Err(e) => {
                    warn!(profile = %profile, index, error = %e, "dropping malformed SharedToken entry");
                }
            }
        }
    }
}

/// Coerce a top-level value to a sequence, warning when it is anything else.
fn sequence_of(
    profile: &ProfileName,
    key: &str,
    value: serde_yaml::Value,
) -> Vec<serde_yaml::Value> {
    match value {
        serde_yaml::Value::Sequence(seq) => seq,
        serde_yaml::Value::Null => Vec::new(),
        other => {
            warn!(profile = %profile, key, "ignoring {key}: expected a sequence, got {}", value_kind(&other));
            Vec::new()
        }
    }
}

fn value_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a boolean",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a sequence",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> ProfileName {
        "app:prod:ipfilter".parse().unwrap()
    }

    #[test]
    fn test_profile_name_parse() {
        let name: ProfileName = "myapp:staging:rules".parse().unwrap();
        assert_eq!(name.application, "myapp");
        assert_eq!(name.environment, "staging");
        assert_eq!(name.configuration, "rules");
        assert_eq!(
            name.request_path(),
            "/applications/myapp/environments/staging/configurations/rules"
        );
        assert_eq!(name.to_string(), "myapp:staging:rules");
    }

    #[test]
    fn test_profile_name_rejects_wrong_arity() {
        assert!("a:b".parse::<ProfileName>().is_err());
        assert!("a:b:c:d".parse::<ProfileName>().is_err());
        assert!("::".parse::<ProfileName>().is_err());
    }

    #[test]
    fn test_parse_full_document() {
        let body = br#"
IpRanges:
  - "10.0.0.0/8"
  - "192.0.2.1"
BasicAuth:
  - Path: "/admin/"
    Username: "u"
    Password: "p"
SharedToken:
  - HeaderName: "x-cdn-token"
    Value: "secret"
"#;
        let fragment = RuleFragment::parse(&profile(), body).unwrap();
        assert_eq!(fragment.ip_ranges.len(), 2);
        assert_eq!(fragment.basic_auth.len(), 1);
        assert_eq!(fragment.basic_auth[0].path_prefix, "/admin/");
        assert_eq!(fragment.shared_tokens.len(), 1);
        assert_eq!(fragment.shared_tokens[0].header_name, "x-cdn-token");
    }

    #[test]
    fn test_absent_keys_contribute_nothing() {
        let fragment = RuleFragment::parse(&profile(), b"IpRanges: [\"10.0.0.0/8\"]").unwrap();
        assert_eq!(fragment.ip_ranges.len(), 1);
        assert!(fragment.basic_auth.is_empty());
        assert!(fragment.shared_tokens.is_empty());
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let body = br#"
IpRanges: ["10.0.0.0/8"]
SomethingElse:
  nested: true
"#;
        let fragment = RuleFragment::parse(&profile(), body).unwrap();
        assert_eq!(fragment.ip_ranges.len(), 1);
    }

    #[test]
    fn test_malformed_entries_dropped_not_fatal() {
        let body = br#"
IpRanges:
  - "10.0.0.0/8"
  - "not-a-cidr"
  - 42
BasicAuth:
  - Path: "/ok/"
    Username: "u"
    Password: "p"
  - Path: "/missing-credentials/"
"#;
        let fragment = RuleFragment::parse(&profile(), body).unwrap();
        assert_eq!(fragment.ip_ranges.len(), 1);
        assert_eq!(fragment.basic_auth.len(), 1);
        assert_eq!(fragment.basic_auth[0].path_prefix, "/ok/");
    }

    #[test]
    fn test_plural_shared_tokens_accepted() {
        let body = br#"
SharedTokens:
  - HeaderName: "x-cdn"
    Value: "s"
"#;
        let fragment = RuleFragment::parse(&profile(), body).unwrap();
        assert_eq!(fragment.shared_tokens.len(), 1);
    }

    #[test]
    fn test_empty_body_is_empty_fragment() {
        let fragment = RuleFragment::parse(&profile(), b"").unwrap();
        assert!(fragment.ip_ranges.is_empty());
        assert!(fragment.basic_auth.is_empty());
        assert!(fragment.shared_tokens.is_empty());
    }

    #[test]
    fn test_non_mapping_document_rejected() {
        assert!(RuleFragment::parse(&profile(), b"- just\n- a\n- list\n").is_err());
        assert!(RuleFragment::parse(&profile(), b"\"scalar\"").is_err());
    }
}
