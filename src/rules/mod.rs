//! # Rule-set pipeline
//!
//! Everything between the configuration agent and the authorisation engine:
//! fetching named profiles ([`ProfileFetcher`]), parsing their YAML bodies
//! into typed fragments ([`RuleFragment`]), merging fragments into immutable
//! [`Snapshot`]s, and the periodic [`Refresher`] that publishes them into the
//! lock-free [`SnapshotStore`].

mod error;
mod fetcher;
mod fragment;
mod refresher;
mod snapshot;

pub use error::{FetchError, FetchResult, RefreshError};
pub use fetcher::ProfileFetcher;
pub use fragment::{ProfileName, RuleFragment};
pub use refresher::Refresher;
pub use snapshot::{BasicAuthEntry, SharedTokenEntry, Snapshot, SnapshotStore};
