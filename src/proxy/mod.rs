//! # Proxy data plane
//!
//! The HTTP server, the per-request authorise-and-forward pipeline, the
//! origin client, and the user-facing error pages.
//!
//! Responses mix streamed origin bodies with small static pages, so the
//! shared body type is a boxed stream of byte frames.

mod denial;
mod error;
mod handler;
mod server;
mod upstream;

use bytes::Bytes;
use http_body_util::combinators::BoxBody;

/// Response body type used throughout the data plane.
pub type ProxyBody = BoxBody<Bytes, std::io::Error>;

pub use denial::DenialRenderer;
pub use error::{ProxyError, UpstreamError};
pub use handler::{handle, ProxyState};
pub use server::{run, serve};
pub use upstream::UpstreamClient;
