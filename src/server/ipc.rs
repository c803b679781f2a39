use super::protocol::{ControlMessage, Outbound};
use super::router::ControlRouter;
use crate::{EditorError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc};

/// Line-delimited JSON control channel over a Unix socket. Each connected
/// client is an edit panel; its first message attaches it as the peer for
/// the tab it names, and later messages re-attach (overwriting any prior
/// peer for that tab).
pub struct ControlServer {
    socket_path: PathBuf,
    router: Arc<ControlRouter>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ControlServer {
    pub fn new(socket_path: PathBuf, router: Arc<ControlRouter>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            socket_path,
            router,
            shutdown_tx,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub async fn bind(&self) -> Result<UnixListener> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        UnixListener::bind(&self.socket_path)
            .map_err(|e| EditorError::General(format!("Failed to bind socket: {}", e)))
    }

    pub async fn accept(&self, listener: &UnixListener) -> Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, _)) => {
                            let router = self.router.clone();
                            tokio::spawn(async move {
                                Self::handle_client(stream, router).await;
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_client(stream: UnixStream, router: Arc<ControlRouter>) {
        let (read_half, mut write_half) = stream.into_split();
        let (tx, mut rx) = mpsc::channel::<String>(256);

        let write_task = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if write_half
                    .write_all(format!("{}\n", msg).as_bytes())
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        let reader = BufReader::new(read_half);
        let mut lines = reader.lines();
        let mut attached_tabs: Vec<crate::store::TabId> = Vec::new();

        while let Ok(Some(line)) = lines.next_line().await {
            if line.is_empty() {
                continue;
            }

            let message = match serde_json::from_str::<ControlMessage>(&line) {
                Ok(message) => message,
                Err(e) => {
                    let reply = Outbound::Error(format!("Parse error: {}", e));
                    if let Ok(json) = reply.to_json() {
                        tx.send(json).await.ok();
                    }
                    continue;
                }
            };

            let tab = message.tab_id();
            router.store().attach_peer(tab, tx.clone()).await;
            if !attached_tabs.contains(&tab) {
                attached_tabs.push(tab);
            }

            if let Err(e) = router.dispatch(message).await {
                tracing::debug!(tab, error = %e, "control command failed");
                router.notify_error(tab, &e).await;
            }
        }

        for tab in attached_tabs {
            router.store().detach_peer(tab).await;
        }
        write_task.abort();
    }

    pub fn shutdown(&self) {
        self.shutdown_tx.send(()).ok();
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).ok();
        }
    }
}
