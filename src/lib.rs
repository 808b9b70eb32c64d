//! # ipfilter-sidecar
//!
//! An authorising reverse proxy that sits between a CDN or load balancer and
//! a backend origin.  Every inbound request is checked against a dynamically
//! refreshed rule set before being streamed to the origin.
//!
//! ## Admission paths
//!
//! Three independent checks, any one of which admits a request:
//!
//! - client IP (selected from `X-Forwarded-For`) inside an allow-listed CIDR
//!   range
//! - HTTP Basic credentials matching a path-scoped entry
//! - a named header carrying a shared secret
//!
//! ## Architecture
//!
//! Rules are fetched periodically from a colocated configuration agent,
//! merged across named profiles, and published as immutable snapshots behind
//! an atomic pointer; request handlers read the current snapshot once per
//! request and never lock.
//!
//! The `X-Forwarded-For` index defaults to `-2` (second-from-right), which
//! assumes exactly one trusted hop appends its own address.  Deployments
//! with more trusted hops must adjust
//! `IP_DETERMINED_BY_X_FORWARDED_FOR_INDEX`.

pub mod config;
pub mod filter;
pub mod logging;
pub mod proxy;
pub mod rules;
