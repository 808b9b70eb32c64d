//! Binary entry point.
//!
//! Start-up order matters: logging first (so configuration failures are
//! visible), then settings, then one blocking rule-set refresh, and only then
//! the listener.  Serving never starts without a usable snapshot.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::error;

use ipfilter_sidecar::config::{Environ, Settings};
use ipfilter_sidecar::logging;
use ipfilter_sidecar::proxy::{self, ProxyState};
use ipfilter_sidecar::rules::{Refresher, SnapshotStore};

#[tokio::main]
async fn main() -> ExitCode {
    let env = Environ::from_process();
    logging::init(env.get("LOG_LEVEL").unwrap_or("INFO"));

    let settings = match Settings::from_env(&env) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "configuration error");
            return ExitCode::FAILURE;
        }
    };

    let store = Arc::new(SnapshotStore::new());

    let refresher = match Refresher::new(&settings, Arc::clone(&store)) {
        Ok(refresher) => refresher,
        Err(e) => {
            error!(error = %e, "configuration error");
            return ExitCode::FAILURE;
        }
    };

    // The sidecar cannot safely serve without rules.
    if let Err(e) = refresher.initial_refresh().await {
        error!(error = %e, "initial rule-set refresh failed");
        return ExitCode::FAILURE;
    }
    tokio::spawn(refresher.run());

    let state = match ProxyState::new(&settings, Arc::clone(&store)) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!(error = %e, "failed to build origin client");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = proxy::run(&settings, state).await {
        error!(error = %e, "server failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
