//! The in-memory authorisation rule set.
//!
//! A [`Snapshot`] is an immutable merged view of every fetched profile.  The
//! refresher builds a new snapshot off to the side and publishes it into the
//! [`SnapshotStore`] with a single atomic swap; request handlers load the
//! current `Arc` once at entry and keep using that snapshot for the whole
//! request, so a mid-request publish never mixes rule generations.

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use ipnet::IpNet;

use super::fragment::RuleFragment;

/// A path-scoped Basic credential pair.
///
/// `path_prefix` matches a request path when it is a byte-wise prefix; `/`
/// matches every path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuthEntry {
    /// Path prefix the credentials are valid for.
    pub path_prefix: String,
    /// Expected username.
    pub username: String,
    /// Expected password.
    pub password: String,
}

impl BasicAuthEntry {
    /// Whether this entry applies to the given request path.
    #[must_use]
    pub fn matches_path(&self, path: &str) -> bool {
        path.starts_with(&self.path_prefix)
    }
}

/// A shared-secret header entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedTokenEntry {
    /// Header carrying the secret; matched case-insensitively.
    pub header_name: String,
    /// Expected secret value.
    pub value: String,
}

/// Parse an allow-list entry: a CIDR block, or a bare address treated as a
/// host-length network.
pub(crate) fn parse_ip_range(raw: &str) -> Result<IpNet, String> {
    if raw.contains('/') {
        raw.parse::<IpNet>().map_err(|e| e.to_string())
    } else {
        raw.parse::<IpAddr>()
            .map(IpNet::from)
            .map_err(|e| e.to_string())
    }
}

/// An immutable, versioned rule set.
#[derive(Debug, Default)]
pub struct Snapshot {
    version: u64,
    ip_ranges: Vec<IpNet>,
    basic_auth: Vec<BasicAuthEntry>,
    shared_tokens: Vec<SharedTokenEntry>,
}

impl Snapshot {
    /// Merge profile fragments (plus the statically configured extra ranges)
    /// into a new snapshot.
    ///
    /// IP ranges are unioned with duplicates collapsed; credential and token
    /// entries are concatenated preserving encounter order across fragments.
    #[must_use]
    pub fn merge(version: u64, fragments: &[RuleFragment], extra_ranges: &[IpNet]) -> Self {
        let mut ip_ranges: Vec<IpNet> = Vec::new();
        let mut basic_auth = Vec::new();
        let mut shared_tokens = Vec::new();

        for fragment in fragments {
            for range in &fragment.ip_ranges {
                if !ip_ranges.contains(range) {
                    ip_ranges.push(*range);
                }
            }
            basic_auth.extend(fragment.basic_auth.iter().cloned());
            shared_tokens.extend(fragment.shared_tokens.iter().cloned());
        }
        for range in extra_ranges {
            if !ip_ranges.contains(range) {
                ip_ranges.push(*range);
            }
        }

        Self {
            version,
            ip_ranges,
            basic_auth,
            shared_tokens,
        }
    }

    /// Version assigned at publication; monotonically increasing.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Allow-listed networks.
    #[must_use]
    pub fn ip_ranges(&self) -> &[IpNet] {
        &self.ip_ranges
    }

    /// Path-scoped Basic credentials, in encounter order.
    #[must_use]
    pub fn basic_auth(&self) -> &[BasicAuthEntry] {
        &self.basic_auth
    }

    /// Shared-token entries, in encounter order.
    #[must_use]
    pub fn shared_tokens(&self) -> &[SharedTokenEntry] {
        &self.shared_tokens
    }

    /// Whether the address lies within any allow-listed network.
    #[must_use]
    pub fn contains_ip(&self, ip: &IpAddr) -> bool {
        self.ip_ranges.iter().any(|net| net.contains(ip))
    }

    /// True when the snapshot holds no rules of any kind.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ip_ranges.is_empty() && self.basic_auth.is_empty() && self.shared_tokens.is_empty()
    }
}

/// Shared handle to the currently-published snapshot.
///
/// Readers never lock: [`SnapshotStore::load`] is an atomic pointer read.
/// The refresher is the only writer.
#[derive(Debug)]
pub struct SnapshotStore {
    current: ArcSwap<Snapshot>,
    next_version: AtomicU64,
}

impl SnapshotStore {
    /// Create a store holding an empty version-0 snapshot.  Version 0 denies
    /// everything, which is the safe state before the first refresh lands.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::default()),
            next_version: AtomicU64::new(1),
        }
    }

    /// Load the current snapshot.  Call once per request and reuse the `Arc`
    /// for every check.
    #[must_use]
    pub fn load(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Merge fragments into a new snapshot and publish it atomically.
    /// Returns the version assigned to the published snapshot.
    pub fn publish(&self, fragments: &[RuleFragment], extra_ranges: &[IpNet]) -> u64 {
        let version = self.next_version.fetch_add(1, Ordering::Relaxed);
        let snapshot = Snapshot::merge(version, fragments, extra_ranges);
        self.current.store(Arc::new(snapshot));
        version
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(ranges: &[&str], auth: &[(&str, &str, &str)], tokens: &[(&str, &str)]) -> RuleFragment {
        RuleFragment {
            ip_ranges: ranges.iter().map(|r| parse_ip_range(r).unwrap()).collect(),
            basic_auth: auth
                .iter()
                .map(|(p, u, w)| BasicAuthEntry {
                    path_prefix: p.to_string(),
                    username: u.to_string(),
                    password: w.to_string(),
                })
                .collect(),
            shared_tokens: tokens
                .iter()
                .map(|(h, v)| SharedTokenEntry {
                    header_name: h.to_string(),
                    value: v.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_parse_ip_range() {
        assert!(parse_ip_range("10.0.0.0/8").is_ok());
        assert!(parse_ip_range("2001:db8::/32").is_ok());
        assert!(parse_ip_range("not-a-range").is_err());
        assert!(parse_ip_range("10.0.0.0/33").is_err());

        // Bare addresses become host-length networks.
        let host = parse_ip_range("192.0.2.7").unwrap();
        assert!(host.contains(&"192.0.2.7".parse::<IpAddr>().unwrap()));
        assert!(!host.contains(&"192.0.2.8".parse::<IpAddr>().unwrap()));
    }

    #[test]
    fn test_merge_unions_ranges() {
        let a = fragment(&["10.0.0.0/8", "192.0.2.0/24"], &[], &[]);
        let b = fragment(&["10.0.0.0/8", "198.51.100.0/24"], &[], &[]);
        let snapshot = Snapshot::merge(1, &[a, b], &[]);
        assert_eq!(snapshot.ip_ranges().len(), 3);
    }

    #[test]
    fn test_merge_concatenates_in_encounter_order() {
        let a = fragment(&[], &[("/a/", "u1", "p1")], &[("x-one", "s1")]);
        let b = fragment(&[], &[("/b/", "u2", "p2")], &[("x-two", "s2")]);
        let snapshot = Snapshot::merge(1, &[a, b], &[]);
        assert_eq!(snapshot.basic_auth()[0].path_prefix, "/a/");
        assert_eq!(snapshot.basic_auth()[1].path_prefix, "/b/");
        assert_eq!(snapshot.shared_tokens()[0].header_name, "x-one");
        assert_eq!(snapshot.shared_tokens()[1].header_name, "x-two");
    }

    #[test]
    fn test_merge_appends_extra_ranges() {
        let extra = vec![parse_ip_range("203.0.113.9").unwrap()];
        let snapshot = Snapshot::merge(1, &[fragment(&["10.0.0.0/8"], &[], &[])], &extra);
        assert!(snapshot.contains_ip(&"203.0.113.9".parse().unwrap()));
        assert!(snapshot.contains_ip(&"10.1.2.3".parse().unwrap()));
    }

    #[test]
    fn test_contains_ip_v4_and_v6() {
        let snapshot = Snapshot::merge(
            1,
            &[fragment(&["10.0.0.0/8", "2001:db8::/32"], &[], &[])],
            &[],
        );
        assert!(snapshot.contains_ip(&"10.255.0.1".parse().unwrap()));
        assert!(!snapshot.contains_ip(&"11.0.0.1".parse().unwrap()));
        assert!(snapshot.contains_ip(&"2001:db8::1".parse().unwrap()));
        assert!(!snapshot.contains_ip(&"2001:db9::1".parse().unwrap()));
    }

    #[test]
    fn test_basic_auth_path_match() {
        let entry = BasicAuthEntry {
            path_prefix: "/admin/".to_string(),
            username: "u".to_string(),
            password: "p".to_string(),
        };
        assert!(entry.matches_path("/admin/users"));
        assert!(!entry.matches_path("/admins"));

        let root = BasicAuthEntry {
            path_prefix: "/".to_string(),
            username: "u".to_string(),
            password: "p".to_string(),
        };
        assert!(root.matches_path("/anything"));
    }

    #[test]
    fn test_store_starts_empty_at_version_zero() {
        let store = SnapshotStore::new();
        let snapshot = store.load();
        assert_eq!(snapshot.version(), 0);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_publish_is_visible_and_versioned() {
        let store = SnapshotStore::new();
        let v1 = store.publish(&[fragment(&["10.0.0.0/8"], &[], &[])], &[]);
        assert_eq!(v1, 1);
        assert_eq!(store.load().version(), 1);

        let v2 = store.publish(&[fragment(&[], &[], &[])], &[]);
        assert_eq!(v2, 2);
        assert_eq!(store.load().version(), 2);
    }

    #[test]
    fn test_reader_keeps_old_snapshot_across_publish() {
        let store = SnapshotStore::new();
        store.publish(&[fragment(&["10.0.0.0/8"], &[], &[])], &[]);

        let held = store.load();
        store.publish(&[fragment(&[], &[], &[])], &[]);

        // The held reference still sees the full version-1 rule set.
        assert_eq!(held.version(), 1);
        assert!(held.contains_ip(&"10.1.2.3".parse().unwrap()));
        assert_eq!(store.load().version(), 2);
    }
}
