use super::TerminalKind;
use crate::host::BrowserHost;
use crate::rules::RuleUpdate;
use crate::store::{SessionStore, TabId};
use std::sync::Arc;

/// Tears down the per-tab rewrite rule when the tracked request reaches a
/// terminal state, and drops all session state when the tab closes. Removal
/// is idempotent: clearing a rule that does not exist is not an error, so
/// the rule table is bounded by the number of in-flight edited requests.
#[derive(Clone)]
pub struct LifecycleManager {
    store: Arc<SessionStore>,
    host: Arc<dyn BrowserHost>,
}

impl LifecycleManager {
    pub fn new(store: Arc<SessionStore>, host: Arc<dyn BrowserHost>) -> Self {
        Self { store, host }
    }

    pub async fn on_terminal(&self, tab: TabId, kind: TerminalKind) {
        tracing::debug!(tab, ?kind, "request finished, clearing rule");
        if let Err(e) = self
            .host
            .update_session_rules(RuleUpdate::removal(tab))
            .await
        {
            tracing::debug!(tab, error = %e, "rule teardown failed");
        }
    }

    pub async fn on_tab_removed(&self, tab: TabId) {
        let existed = self.store.remove(tab).await;
        tracing::debug!(tab, existed, "tab closed, session removed");
        if let Err(e) = self
            .host
            .update_session_rules(RuleUpdate::removal(tab))
            .await
        {
            tracing::debug!(tab, error = %e, "rule teardown failed");
        }
    }
}
