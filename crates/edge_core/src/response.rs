//! The structured response contract returned to callers.
//!
//! ```text
//! {
//!   "message": "...",
//!   "steps": [ { "title": "...", "details": "..." } ],
//!   "proposed_changes": {
//!     "hmi": { "views": [ ... ], "general": { ... } },
//!     "tags_to_add": { "<tagName>": { ... } },
//!     "component_to_add": { ... } | [ ... ]
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tag definitions keyed by tag name.
pub type TagSet = Map<String, Value>;

/// One step of the explanation shown to the operator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentStep {
    pub title: String,
    pub details: String,
}

impl AgentStep {
    pub fn new(title: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            details: details.into(),
        }
    }
}

/// HMI part of a patch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HmiPatch {
    /// View objects to add or replace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub views: Option<Vec<Map<String, Value>>>,
    /// General HMI settings (viewsTree, defaultViewId, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub general: Option<Map<String, Value>>,
    /// Any other HMI keys the model produced
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HmiPatch {
    pub fn is_empty(&self) -> bool {
        self.views.is_none() && self.general.is_none() && self.extra.is_empty()
    }
}

/// The structured patch against the controller configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProposedChanges {
    #[serde(default)]
    pub hmi: HmiPatch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags_to_add: Option<TagSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_to_add: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components_to_add: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Canonical response emitted by `/agent/ask` and `/agent/build_view`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StructuredAgentResponse {
    pub message: String,
    pub steps: Vec<AgentStep>,
    pub proposed_changes: ProposedChanges,
}

impl StructuredAgentResponse {
    /// Placeholder used when the model omits `message`.
    pub const DEFAULT_MESSAGE: &'static str = "No message provided.";

    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            steps: Vec::new(),
            proposed_changes: ProposedChanges::default(),
        }
    }

    /// Compact JSON form, as stored in conversation history.
    pub fn to_compact_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
