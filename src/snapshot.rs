use serde::{Deserialize, Serialize};

/// One header edit from the control surface.
///
/// `created` marks edits synthesized on this side (the rule engine's
/// content-type injection) rather than typed by the operator; the panel uses
/// it for display only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HeaderEdit {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub remove_if_empty: bool,
    #[serde(default)]
    pub created: bool,
}

impl HeaderEdit {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            enabled: true,
            remove_if_empty: false,
            created: false,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestBody {
    pub enctype: String,
    #[serde(default)]
    pub content: String,
}

/// Editable representation of a captured request.
///
/// Capture produces snapshots with an empty header list; `headers` is
/// populated only by the control surface when it submits an edit for replay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RequestSnapshot {
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub headers: Vec<HeaderEdit>,
    pub body: RequestBody,
}

impl RequestSnapshot {
    pub fn captured(
        url: impl Into<String>,
        method: &str,
        enctype: impl Into<String>,
        content: String,
    ) -> Self {
        Self {
            url: url.into(),
            method: method.to_ascii_uppercase(),
            headers: Vec::new(),
            body: RequestBody {
                enctype: enctype.into(),
                content,
            },
        }
    }
}
