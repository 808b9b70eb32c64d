//! The HTTP/1.1 listener.

use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::config::Settings;

use super::error::ProxyError;
use super::handler::{handle, ProxyState};

/// Bind the listen socket and serve until the process exits.
pub async fn run(settings: &Settings, state: Arc<ProxyState>) -> Result<(), ProxyError> {
    let addr = settings.listen_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ProxyError::Bind { addr, source })?;

    info!(
        %addr,
        origin = %settings.origin_base(),
        environment = %settings.environment,
        "proxy listening"
    );

    serve(listener, state).await;
    Ok(())
}

/// Accept loop over an already-bound listener.
///
/// One task per connection: a slow or hung peer never blocks accepting.
pub async fn serve(listener: TcpListener, state: Arc<ProxyState>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };

        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |request| handle(Arc::clone(&state), request));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!(peer = %peer, error = %e, "connection ended with error");
            }
        });
    }
}
