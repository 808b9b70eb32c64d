//! Periodic rule-set refresh.
//!
//! One synchronous pass runs at start-up; afterwards a background task
//! re-fetches every profile on a fixed period.  A steady-state cycle is
//! all-or-nothing: when any profile fails, nothing is published and the prior
//! snapshot stays authoritative.  The initial pass instead publishes whatever
//! subset succeeded, because with no prior snapshot the alternative to a
//! partial rule set is refusing to start at all; zero usable profiles is
//! fatal.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use ipnet::IpNet;
use tracing::{debug, info, warn};

use crate::config::Settings;

use super::error::{FetchResult, RefreshError};
use super::fetcher::ProfileFetcher;
use super::fragment::{ProfileName, RuleFragment};
use super::snapshot::{parse_ip_range, SnapshotStore};

/// Owns the fetch-merge-publish cycle for the [`SnapshotStore`].
#[derive(Debug)]
pub struct Refresher {
    fetcher: ProfileFetcher,
    profiles: Vec<ProfileName>,
    extra_ranges: Vec<IpNet>,
    store: Arc<SnapshotStore>,
    interval: Duration,
}

impl Refresher {
    /// Build a refresher from resolved settings.
    ///
    /// Fails when any configured profile name is malformed; malformed entries
    /// in `ADDITIONAL_IP_LIST` are dropped with a warning instead, matching
    /// the treatment of profile entries.
    pub fn new(settings: &Settings, store: Arc<SnapshotStore>) -> FetchResult<Self> {
        let profiles = settings
            .appconfig_profiles
            .iter()
            .map(|raw| ProfileName::from_str(raw))
            .collect::<FetchResult<Vec<_>>>()?;

        let extra_ranges = settings
            .additional_ip_list
            .iter()
            .filter_map(|raw| match parse_ip_range(raw) {
                Ok(range) => Some(range),
                Err(e) => {
                    warn!(cidr = %raw, error = %e, "dropping malformed ADDITIONAL_IP_LIST entry");
                    None
                }
            })
            .collect();

        Ok(Self {
            fetcher: ProfileFetcher::new(settings.appconfig_url.clone(), settings.fetch_timeout),
            profiles,
            extra_ranges,
            store,
            interval: settings.refresh_interval,
        })
    }

    /// The profiles this refresher polls.
    #[must_use]
    pub fn profiles(&self) -> &[ProfileName] {
        &self.profiles
    }

    /// Fetch every profile once, returning the successful fragments and the
    /// failure count.  Failures are logged here.
    async fn fetch_all(&self) -> (Vec<RuleFragment>, usize) {
        let mut fragments = Vec::with_capacity(self.profiles.len());
        let mut failures = 0;
        for profile in &self.profiles {
            match self.fetcher.fetch(profile).await {
                Ok(fragment) => fragments.push(fragment),
                Err(e) => {
                    failures += 1;
                    warn!(profile = %profile, error = %e, "profile fetch failed");
                }
            }
        }
        (fragments, failures)
    }

    /// The blocking start-up pass.  Publishes a snapshot from whichever
    /// profiles succeeded; errs only when every profile failed.
    pub async fn initial_refresh(&self) -> Result<u64, RefreshError> {
        let (fragments, failures) = self.fetch_all().await;
        if fragments.is_empty() {
            return Err(RefreshError::NoUsableProfiles {
                attempted: self.profiles.len(),
            });
        }

        let version = self.store.publish(&fragments, &self.extra_ranges);
        info!(
            version,
            profiles = self.profiles.len(),
            failures,
            "initial rule set published"
        );
        Ok(version)
    }

    /// One steady-state cycle: publish only when every profile fetched.
    async fn refresh_cycle(&self) {
        let (fragments, failures) = self.fetch_all().await;
        if failures > 0 {
            warn!(
                failures,
                retained_version = self.store.load().version(),
                "refresh incomplete, retaining prior snapshot"
            );
            return;
        }

        let version = self.store.publish(&fragments, &self.extra_ranges);
        debug!(version, "published refreshed rule set");
    }

    /// Run the periodic refresh until the process exits.
    pub async fn run(self) {
        loop {
            tokio::time::sleep(self.interval).await;
            self.refresh_cycle().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Environ, Settings};
    use std::collections::HashMap;

    fn settings(profiles: &str, additional: &str) -> Settings {
        let vars: HashMap<String, String> = [
            ("COPILOT_ENVIRONMENT_NAME", "prod"),
            ("SERVER", "origin:8000"),
            ("APPCONFIG_PROFILES", profiles),
            ("ADDITIONAL_IP_LIST", additional),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Settings::from_env(&Environ::from_vars(vars)).unwrap()
    }

    #[test]
    fn test_new_parses_profiles() {
        let store = Arc::new(SnapshotStore::new());
        let refresher =
            Refresher::new(&settings("app:prod:a,app:prod:b", ""), store).unwrap();
        assert_eq!(refresher.profiles().len(), 2);
        assert_eq!(refresher.profiles()[0].to_string(), "app:prod:a");
    }

    #[test]
    fn test_new_rejects_malformed_profile() {
        let store = Arc::new(SnapshotStore::new());
        assert!(Refresher::new(&settings("not-a-profile", ""), store).is_err());
    }

    #[test]
    fn test_additional_ranges_skip_malformed() {
        let store = Arc::new(SnapshotStore::new());
        let refresher = Refresher::new(
            &settings("app:prod:a", "10.0.0.0/8,bogus,192.0.2.7"),
            store,
        )
        .unwrap();
        assert_eq!(refresher.extra_ranges.len(), 2);
    }

    #[tokio::test]
    async fn test_initial_refresh_fails_when_agent_unreachable() {
        // Port 1 on localhost refuses connections.
        let vars: HashMap<String, String> = [
            ("COPILOT_ENVIRONMENT_NAME", "prod"),
            ("SERVER", "origin:8000"),
            ("APPCONFIG_PROFILES", "app:prod:a"),
            ("APPCONFIG_URL", "http://127.0.0.1:1"),
            ("APPCONFIG_FETCH_TIMEOUT_SECS", "1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let settings = Settings::from_env(&Environ::from_vars(vars)).unwrap();

        let store = Arc::new(SnapshotStore::new());
        let refresher = Refresher::new(&settings, Arc::clone(&store)).unwrap();

        assert!(refresher.initial_refresh().await.is_err());
        // Nothing was published.
        assert_eq!(store.load().version(), 0);
    }
}
