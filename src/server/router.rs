use super::protocol::{ControlMessage, LoadPayload, Outbound};
use crate::codec::CodecRegistry;
use crate::host::BrowserHost;
use crate::rules::{RuleEngine, method_carries_body};
use crate::snapshot::RequestSnapshot;
use crate::store::{SessionStore, TabId};
use crate::{EditorError, Result};
use std::sync::Arc;
use url::Url;

/// Single entry point for control-surface commands. Failures follow the
/// per-session isolation policy: a detached peer drops the operation
/// silently, an execute failure is reported to that tab's peer only, and no
/// failure touches any other session's state.
pub struct ControlRouter {
    store: Arc<SessionStore>,
    host: Arc<dyn BrowserHost>,
    engine: RuleEngine,
}

impl ControlRouter {
    pub fn new(
        store: Arc<SessionStore>,
        host: Arc<dyn BrowserHost>,
        registry: &'static CodecRegistry,
    ) -> Self {
        Self {
            store,
            host,
            engine: RuleEngine::new(registry),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub async fn dispatch(&self, message: ControlMessage) -> Result<()> {
        match message {
            ControlMessage::Load { tab_id } => self.load(tab_id).await,
            ControlMessage::Execute { tab_id, data } => self.execute(tab_id, data).await,
            ControlMessage::Test { tab_id, data } => self.test(tab_id, data).await,
        }
    }

    /// Best-effort: missing snapshot or detached peer is a no-op.
    async fn load(&self, tab: TabId) -> Result<()> {
        let Some(snapshot) = self.store.snapshot(tab).await else {
            tracing::debug!(tab, "load: no snapshot captured");
            return Ok(());
        };
        let captured_at = self.store.captured_at(tab).await;
        self.notify(tab, Outbound::Load(LoadPayload { snapshot, captured_at }))
            .await;
        Ok(())
    }

    async fn execute(&self, tab: TabId, snapshot: RequestSnapshot) -> Result<()> {
        Url::parse(&snapshot.url).map_err(|_| EditorError::InvalidUrl(snapshot.url.clone()))?;

        // Unsupported encodings abort here, before any rule or navigation
        // side effect.
        self.engine.activate(self.host.as_ref(), tab, &snapshot).await?;

        if method_carries_body(&snapshot.method) {
            if let Some(error) = self.host.submit_body(tab, &snapshot).await? {
                tracing::debug!(tab, %error, "in-page submission reported failure");
                self.notify(tab, Outbound::Error(error)).await;
            }
        } else {
            self.host.navigate(tab, &snapshot.url).await?;
        }

        Ok(())
    }

    async fn test(&self, tab: TabId, payload: serde_json::Value) -> Result<()> {
        if payload.get("action").and_then(|a| a.as_str()) == Some("start") {
            let script = payload
                .get("script")
                .and_then(|s| s.as_str())
                .map(crate::js_templates::named_test_script)
                .unwrap_or_else(|| crate::js_templates::TEST_HARNESS.to_string());
            self.host.inject_script(tab, &script).await?;
        }

        self.host.forward_test(tab, &payload).await?;
        // Acknowledge delivery so the surface can sequence its steps.
        self.notify(tab, Outbound::Test(payload)).await;
        Ok(())
    }

    /// Forward a device-level command string to a tab's peer.
    pub async fn notify_command(&self, tab: TabId, command: &str) {
        self.notify(tab, Outbound::Command(command.to_string())).await;
    }

    /// Report an execute failure back to the issuing tab's peer.
    pub async fn notify_error(&self, tab: TabId, error: &EditorError) {
        self.notify(tab, Outbound::Error(error.to_string())).await;
    }

    async fn notify(&self, tab: TabId, outbound: Outbound) {
        let Some(peer) = self.store.peer(tab).await else {
            tracing::debug!(tab, "control surface detached, dropping notification");
            return;
        };
        match outbound.to_json() {
            Ok(json) => {
                if peer.send(json).await.is_err() {
                    tracing::debug!(tab, "peer channel closed, dropping notification");
                }
            }
            Err(e) => tracing::warn!(tab, error = %e, "failed to serialize notification"),
        }
    }
}
