use crate::snapshot::RequestSnapshot;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::{RwLock, mpsc};

/// Stable identifier for one browser tab / request context. Reused across
/// navigations of the same tab, so per-tab state is always overwritten,
/// never accumulated.
pub type TabId = i64;

/// Serialized outbound notifications travel to the control-surface peer
/// through this sender (one writer task per connected client).
pub type PeerSender = mpsc::Sender<String>;

#[derive(Default)]
struct SessionEntry {
    snapshot: Option<RequestSnapshot>,
    captured_at: Option<DateTime<Utc>>,
    peer: Option<PeerSender>,
}

/// Shared per-tab state: the latest captured snapshot and the attached
/// control-channel peer. Entries are created on first capture or first peer
/// attachment and removed when the tab closes.
#[derive(Default)]
pub struct SessionStore {
    inner: RwLock<HashMap<TabId, SessionEntry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditional overwrite: a new navigation in the same tab replaces
    /// whatever was captured before.
    pub async fn record_capture(&self, tab: TabId, snapshot: RequestSnapshot) {
        let mut inner = self.inner.write().await;
        let entry = inner.entry(tab).or_default();
        entry.snapshot = Some(snapshot);
        entry.captured_at = Some(Utc::now());
    }

    /// Overwrite only `body.enctype`, leaving every other field intact.
    /// A refinement for a tab with no captured snapshot is a stale event
    /// and is dropped.
    pub async fn refine_enctype(&self, tab: TabId, enctype: &str) {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.get_mut(&tab)
            && let Some(snapshot) = entry.snapshot.as_mut()
        {
            snapshot.body.enctype = enctype.to_string();
        }
    }

    /// Overwrite only `body.content`, with the same stale-event policy as
    /// [`refine_enctype`](Self::refine_enctype).
    pub async fn refine_content(&self, tab: TabId, content: String) {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.get_mut(&tab)
            && let Some(snapshot) = entry.snapshot.as_mut()
        {
            snapshot.body.content = content;
        }
    }

    pub async fn snapshot(&self, tab: TabId) -> Option<RequestSnapshot> {
        self.inner
            .read()
            .await
            .get(&tab)
            .and_then(|e| e.snapshot.clone())
    }

    pub async fn captured_at(&self, tab: TabId) -> Option<DateTime<Utc>> {
        self.inner.read().await.get(&tab).and_then(|e| e.captured_at)
    }

    /// Re-attachment overwrites: at most one peer per tab.
    pub async fn attach_peer(&self, tab: TabId, peer: PeerSender) {
        self.inner.write().await.entry(tab).or_default().peer = Some(peer);
    }

    pub async fn peer(&self, tab: TabId) -> Option<PeerSender> {
        self.inner.read().await.get(&tab).and_then(|e| e.peer.clone())
    }

    pub async fn detach_peer(&self, tab: TabId) {
        if let Some(entry) = self.inner.write().await.get_mut(&tab) {
            entry.peer = None;
        }
    }

    /// Tabs with an attached peer, for daemon-wide command notifications.
    pub async fn peer_tabs(&self) -> Vec<TabId> {
        self.inner
            .read()
            .await
            .iter()
            .filter(|(_, e)| e.peer.is_some())
            .map(|(tab, _)| *tab)
            .collect()
    }

    /// Drop all state for a closed tab. Returns whether an entry existed.
    pub async fn remove(&self, tab: TabId) -> bool {
        self.inner.write().await.remove(&tab).is_some()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::RequestSnapshot;

    fn snap(url: &str) -> RequestSnapshot {
        RequestSnapshot::captured(url, "POST", "application/x-www-form-urlencoded", String::new())
    }

    #[tokio::test]
    async fn test_capture_overwrites() {
        let store = SessionStore::new();
        store.record_capture(7, snap("https://a.example/")).await;
        store.record_capture(7, snap("https://b.example/")).await;

        let current = store.snapshot(7).await.unwrap();
        assert_eq!(current.url, "https://b.example/");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_refine_enctype_preserves_other_fields() {
        let store = SessionStore::new();
        let mut captured = snap("https://a.example/");
        captured.body.content = "a=1".into();
        store.record_capture(7, captured).await;

        store.refine_enctype(7, "json").await;

        let current = store.snapshot(7).await.unwrap();
        assert_eq!(current.body.enctype, "json");
        assert_eq!(current.body.content, "a=1");
        assert_eq!(current.url, "https://a.example/");
    }

    #[tokio::test]
    async fn test_refine_without_capture_is_stale_noop() {
        let store = SessionStore::new();
        store.refine_enctype(7, "json").await;
        store.refine_content(7, "a=1".into()).await;
        assert!(store.snapshot(7).await.is_none());
    }

    #[tokio::test]
    async fn test_refine_content_preserves_enctype() {
        let store = SessionStore::new();
        store.record_capture(7, snap("https://a.example/")).await;
        store.refine_enctype(7, "json").await;

        store.refine_content(7, "{\"k\":1}".into()).await;

        let current = store.snapshot(7).await.unwrap();
        assert_eq!(current.body.enctype, "json");
        assert_eq!(current.body.content, "{\"k\":1}");
    }

    #[tokio::test]
    async fn test_remove_drops_everything() {
        let store = SessionStore::new();
        let (tx, _rx) = mpsc::channel(1);
        store.record_capture(7, snap("https://a.example/")).await;
        store.attach_peer(7, tx).await;

        assert!(store.remove(7).await);
        assert!(!store.remove(7).await);
        assert!(store.snapshot(7).await.is_none());
        assert!(store.peer(7).await.is_none());
    }

    #[tokio::test]
    async fn test_peer_attachment_without_capture() {
        let store = SessionStore::new();
        let (tx, _rx) = mpsc::channel(1);
        store.attach_peer(3, tx).await;

        assert!(store.peer(3).await.is_some());
        assert!(store.snapshot(3).await.is_none());
        assert_eq!(store.peer_tabs().await, vec![3]);
    }
}
