use crate::Result;
use crate::rules::RuleUpdate;
use crate::snapshot::RequestSnapshot;
use crate::store::TabId;
use async_trait::async_trait;

/// Seam over the browser subsystem. The pipeline drives the host through
/// this trait only; the CDP adapter in [`crate::chrome`] is the production
/// implementation and tests substitute a recording mock.
///
/// All operations are at-most-once: a failed call is reported, never
/// retried, since repeated header-rule updates would be visible as request
/// flicker.
#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// Apply a session-scoped rule update with replace semantics: removals
    /// happen before additions, atomically per call.
    async fn update_session_rules(&self, update: RuleUpdate) -> Result<()>;

    /// Navigate the tab's document to the given URL.
    async fn navigate(&self, tab: TabId, url: &str) -> Result<()>;

    /// Submit the snapshot's body from page context (a navigational form
    /// submission). `Ok(Some(message))` is a page-reported failure, which
    /// the router forwards to the peer; it is not a host error.
    async fn submit_body(&self, tab: TabId, snapshot: &RequestSnapshot) -> Result<Option<String>>;

    /// Evaluate a script in the tab's page context.
    async fn inject_script(&self, tab: TabId, script: &str) -> Result<()>;

    /// Deliver a test payload to the page context.
    async fn forward_test(&self, tab: TabId, payload: &serde_json::Value) -> Result<()>;
}
