//! # Configuration
//!
//! Start-up configuration for the sidecar: a captured view of the process
//! environment with per-environment shadowing ([`Environ`]) and the resolved,
//! immutable [`Settings`] built from it.
//!
//! Settings are captured exactly once; nothing in the serving path reads the
//! process environment again.

mod env;
mod error;
mod settings;

pub use env::{Environ, ENVIRONMENT_NAME_VAR};
pub use error::{ConfigError, ConfigResult};
pub use settings::Settings;
