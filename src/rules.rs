use crate::codec::CodecRegistry;
use crate::host::BrowserHost;
use crate::snapshot::{HeaderEdit, RequestSnapshot};
use crate::store::TabId;
use crate::{EditorError, Result};
use serde::{Deserialize, Serialize};

/// Methods whose replay carries the edited body. Everything else replays by
/// plain navigation to the edited URL.
pub fn method_carries_body(method: &str) -> bool {
    matches!(
        method.to_ascii_uppercase().as_str(),
        "POST" | "PUT" | "PATCH"
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderOperation {
    Set,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderDirective {
    pub header: String,
    pub operation: HeaderOperation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleActionKind {
    ModifyHeaders,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub kind: RuleActionKind,
    pub request_headers: Vec<HeaderDirective>,
}

/// Scopes a rule to the originating tab's main-document requests so the
/// rewrite can never leak onto subresources or other tabs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    pub tab_ids: Vec<TabId>,
    pub resource_types: Vec<String>,
}

impl RuleCondition {
    pub fn main_frame(tab: TabId) -> Self {
        Self {
            tab_ids: vec![tab],
            resource_types: vec!["main_frame".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRule {
    pub id: TabId,
    pub action: RuleAction,
    pub condition: RuleCondition,
}

impl SessionRule {
    /// Whether this rule's condition matches a main-document request in the
    /// given tab. The host consults this before applying directives.
    pub fn applies_to(&self, tab: TabId) -> bool {
        self.condition.tab_ids.contains(&tab)
            && self.condition.resource_types.iter().any(|r| r == "main_frame")
    }
}

/// Atomic replace update: removal of any prior rule for the ids always
/// precedes the addition, so one tab never has two active rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleUpdate {
    pub remove_rule_ids: Vec<TabId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_rules: Option<Vec<SessionRule>>,
}

impl RuleUpdate {
    pub fn removal(tab: TabId) -> Self {
        Self {
            remove_rule_ids: vec![tab],
            add_rules: None,
        }
    }
}

/// Directive truth table: enabled edits with a non-empty name produce `set`
/// when they carry a value or have remove-if-empty unset (an operator can
/// force-set an empty header), and `remove` otherwise. Disabled and unnamed
/// edits produce nothing.
pub fn build_header_directives(edits: &[HeaderEdit]) -> Vec<HeaderDirective> {
    edits
        .iter()
        .filter(|e| e.enabled && !e.name.is_empty())
        .map(|e| {
            if !e.value.is_empty() || !e.remove_if_empty {
                HeaderDirective {
                    header: e.name.clone(),
                    operation: HeaderOperation::Set,
                    value: Some(e.value.clone()),
                }
            } else {
                HeaderDirective {
                    header: e.name.clone(),
                    operation: HeaderOperation::Remove,
                    value: None,
                }
            }
        })
        .collect()
}

/// Computes and activates the per-tab header-rewrite rule for an edited
/// snapshot.
pub struct RuleEngine {
    registry: &'static CodecRegistry,
}

impl RuleEngine {
    pub fn new(registry: &'static CodecRegistry) -> Self {
        Self { registry }
    }

    /// Builds the rule update for an edited snapshot. Fails only on an
    /// unknown declared encoding; the session store is never touched here.
    pub fn compute(&self, tab: TabId, snapshot: &RequestSnapshot) -> Result<RuleUpdate> {
        let mut edits = snapshot.headers.clone();

        if method_carries_body(&snapshot.method) {
            let codec = self
                .registry
                .find(&snapshot.body.enctype)
                .ok_or_else(|| EditorError::UnsupportedEncoding(snapshot.body.enctype.clone()))?;

            // The in-page submission can only emit form enctypes; codecs
            // whose wire type differs get it restored by one synthetic edit.
            if codec.needs_content_type_rewrite() {
                edits.push(HeaderEdit {
                    name: "content-type".to_string(),
                    value: codec.wire_type().to_string(),
                    enabled: true,
                    remove_if_empty: false,
                    created: true,
                });
            }
        }

        let directives = build_header_directives(&edits);
        let add_rules = (!directives.is_empty()).then(|| {
            vec![SessionRule {
                id: tab,
                action: RuleAction {
                    kind: RuleActionKind::ModifyHeaders,
                    request_headers: directives,
                },
                condition: RuleCondition::main_frame(tab),
            }]
        });

        Ok(RuleUpdate {
            remove_rule_ids: vec![tab],
            add_rules,
        })
    }

    /// Compute and activate. Replay must only be triggered after this
    /// returns Ok.
    pub async fn activate(
        &self,
        host: &dyn BrowserHost,
        tab: TabId,
        snapshot: &RequestSnapshot,
    ) -> Result<()> {
        let update = self.compute(tab, snapshot)?;
        host.update_session_rules(update).await
    }
}
