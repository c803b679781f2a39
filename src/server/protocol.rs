use crate::snapshot::RequestSnapshot;
use crate::store::TabId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Commands from the control surface. Tagged on `type`; every command names
/// the tab (session identifier) it operates on. Consumed exactly once by the
/// router, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    /// Ask for the stored snapshot of a tab.
    #[serde(rename_all = "camelCase")]
    Load { tab_id: TabId },
    /// Replay an edited snapshot.
    #[serde(rename_all = "camelCase")]
    Execute { tab_id: TabId, data: RequestSnapshot },
    /// Drive the in-page test harness; the payload is passed through.
    #[serde(rename_all = "camelCase")]
    Test { tab_id: TabId, data: Value },
}

impl ControlMessage {
    pub fn tab_id(&self) -> TabId {
        match self {
            Self::Load { tab_id }
            | Self::Execute { tab_id, .. }
            | Self::Test { tab_id, .. } => *tab_id,
        }
    }
}

/// Snapshot payload of a `load` notification, annotated with the time the
/// request was captured.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadPayload {
    #[serde(flatten)]
    pub snapshot: RequestSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
}

/// Notifications to the control surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", content = "data")]
pub enum Outbound {
    Load(LoadPayload),
    Error(String),
    Command(String),
    Test(Value),
}

impl Outbound {
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
