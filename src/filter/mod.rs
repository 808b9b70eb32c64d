//! # Request filtering
//!
//! The two per-request gates: [`PathClassifier`] decides whether the
//! authorisation engine applies at all, and [`AuthEngine`] evaluates the
//! disjunctive IP / Basic-credential / shared-token predicate against the
//! current rule [`Snapshot`](crate::rules::Snapshot).

mod classifier;
mod decision;
mod engine;

pub use classifier::{PathClassifier, RouteClass};
pub use decision::{AllowVia, Decision, DenyReason};
pub use engine::{AuthEngine, Authorisation, X_FORWARDED_FOR};
