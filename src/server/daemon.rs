use super::ipc::ControlServer;
use super::router::ControlRouter;
use crate::capture::CaptureSet;
use crate::chrome::{BrowserManager, CdpHost};
use crate::codec::registry;
use crate::config::Config;
use crate::store::SessionStore;
use crate::Result;
use std::sync::Arc;

/// Runs the editor daemon: browser connection, capture pipeline, and the
/// control socket, until interrupted. On shutdown every attached panel gets
/// a `command` notification before the socket closes.
pub async fn run(config: Arc<Config>) -> Result<()> {
    let store = Arc::new(SessionStore::new());
    let host = Arc::new(CdpHost::new());
    let capture = Arc::new(CaptureSet::new(store.clone(), host.clone(), registry()));

    let manager = Arc::new(BrowserManager::new(
        config.clone(),
        host.clone(),
        capture.clone(),
    ));
    manager.start().await?;

    let router = Arc::new(ControlRouter::new(store.clone(), host, registry()));
    let server = ControlServer::new(config.control.resolved_socket_path()?, router.clone());
    let listener = server.bind().await?;
    tracing::info!(socket = %server.socket_path().display(), "control channel ready");

    tokio::select! {
        result = server.accept(&listener) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }

    for tab in store.peer_tabs().await {
        router.notify_command(tab, "shutdown").await;
    }
    server.shutdown();
    manager.shutdown().await;

    Ok(())
}
