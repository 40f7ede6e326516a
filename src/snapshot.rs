//! Raw accessibility snapshot wire types and the provider seam.
//!
//! The wire shapes follow the Chrome DevTools Protocol `Accessibility` domain:
//! node ids are strings, and role/name/value/description arrive as typed
//! `AXValue` wrappers. Some toolkits additionally flatten state booleans onto
//! the node itself; those fields are modeled as optional so both shapes
//! deserialize.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ax::BoundingBox;
use crate::error::AnalyzerError;

/// Typed value wrapper from the accessibility wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxValue {
    #[serde(rename = "type")]
    pub value_type: String,
    #[serde(default)]
    pub value: Option<Value>,
}

impl AxValue {
    /// Convenience constructor for a string-typed value.
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            value_type: "string".to_string(),
            value: Some(Value::String(value.into())),
        }
    }

    /// Convenience constructor for a boolean-typed value.
    pub fn boolean(value: bool) -> Self {
        Self {
            value_type: "boolean".to_string(),
            value: Some(Value::Bool(value)),
        }
    }

    /// Borrow the inner value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_ref().and_then(Value::as_str)
    }

    /// Render scalar values as text. Arrays and objects yield `None`.
    pub fn as_text(&self) -> Option<String> {
        match &self.value {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// One named property of a raw accessibility node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxPropertyEntry {
    pub name: String,
    pub value: AxValue,
}

/// A raw accessibility-tree node as supplied by the snapshot provider.
///
/// Every field except `node_id` is optional: a partially malformed node still
/// deserializes and is handled (or skipped) by the parser.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawNode {
    pub node_id: String,
    pub ignored: bool,
    pub role: Option<AxValue>,
    pub name: Option<AxValue>,
    pub value: Option<AxValue>,
    pub description: Option<AxValue>,
    pub properties: Option<Vec<AxPropertyEntry>>,
    pub child_ids: Option<Vec<String>>,
    pub parent_id: Option<String>,
    #[serde(rename = "backendDOMNodeId")]
    pub backend_dom_node_id: Option<i64>,
    /// Layout rectangle, when the provider merges one in.
    pub bounding_box: Option<BoundingBox>,
    // State booleans flattened onto the node by some providers.
    pub checked: Option<bool>,
    pub expanded: Option<bool>,
    pub selected: Option<bool>,
    pub disabled: Option<bool>,
    pub readonly: Option<bool>,
    pub required: Option<bool>,
    pub invalid: Option<bool>,
    pub focused: Option<bool>,
    pub hidden: Option<bool>,
}

/// A full accessibility snapshot with page metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSnapshot {
    pub nodes: Vec<RawNode>,
    pub url: String,
    pub title: String,
    /// Opaque page metrics (layout, timing), passed through to the result.
    pub metrics: Option<Value>,
}

/// Source of accessibility snapshots for a target.
///
/// This is the analyzer's only I/O boundary. Implementations typically sit on
/// a remote-debugging session; errors map to [`AnalyzerError::Provider`],
/// [`AnalyzerError::Timeout`] or [`AnalyzerError::TargetNotFound`].
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Fetch the current accessibility snapshot for `target_id`.
    async fn fetch_snapshot(&self, target_id: &str) -> Result<RawSnapshot, AnalyzerError>;
}
