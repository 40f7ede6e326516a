//! Accessibility-tree parser.
//!
//! Converts raw snapshot nodes into [`ParsedNode`]s: extracts role, name,
//! value and description, collects properties and state labels, and runs the
//! interactivity classification pass.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::AccessibilityConfig;
use crate::snapshot::{RawNode, RawSnapshot};

use super::types::{ElementState, NodeProperty, ParsedNode, PropertySource, is_truthy};

static WHITESPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static CONTROL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x00-\x1f\x7f-\u{9f}]").unwrap());
static HTML_TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// State booleans some providers flatten onto the node itself, in the order
/// they are checked.
fn flattened_states(raw: &RawNode) -> [(Option<bool>, ElementState); 8] {
    [
        (raw.checked, ElementState::Checked),
        (raw.expanded, ElementState::Expanded),
        (raw.selected, ElementState::Selected),
        (raw.disabled, ElementState::Disabled),
        (raw.readonly, ElementState::Readonly),
        (raw.required, ElementState::Required),
        (raw.invalid, ElementState::Invalid),
        (raw.focused, ElementState::Focused),
    ]
}

/// Parses accessibility snapshots into typed nodes.
pub struct AccessibilityParser {
    config: AccessibilityConfig,
}

impl AccessibilityParser {
    pub fn new(config: AccessibilityConfig) -> Self {
        Self { config }
    }

    /// Parse every node in the snapshot, then classify interactivity.
    ///
    /// A malformed node is skipped with a diagnostic; an empty snapshot yields
    /// an empty list. This never fails the caller.
    pub fn parse(&self, snapshot: &RawSnapshot) -> Vec<ParsedNode> {
        if snapshot.nodes.is_empty() {
            warn!("Accessibility snapshot contains no nodes");
            return Vec::new();
        }

        // First pass: parse all nodes.
        let mut nodes = Vec::with_capacity(snapshot.nodes.len());
        for raw in &snapshot.nodes {
            if let Some(node) = self.parse_node(raw) {
                nodes.push(node);
            }
        }

        // Second pass: classify interactivity. The rule is node-local today;
        // the separate pass is the seam for cross-node classification.
        for node in &mut nodes {
            let interactive = node.compute_interactive(&self.config);
            node.is_interactive = interactive;
        }

        info!("Parsed {} accessibility nodes", nodes.len());
        nodes
    }

    /// Parse a single raw node. Returns `None` for malformed nodes.
    fn parse_node(&self, raw: &RawNode) -> Option<ParsedNode> {
        if raw.node_id.is_empty() {
            warn!("Skipping accessibility node without an id");
            return None;
        }

        let role = raw
            .role
            .as_ref()
            .and_then(|v| v.as_str())
            .unwrap_or("generic")
            .to_string();
        let mut name = raw
            .name
            .as_ref()
            .and_then(|v| v.as_text())
            .unwrap_or_default();
        let value = raw.value.as_ref().and_then(|v| v.as_text());
        let description = raw.description.as_ref().and_then(|v| v.as_text());

        let properties = self.extract_properties(raw);
        let states = self.extract_states(raw);

        if !self.is_text_valid(&name) {
            debug!(node_id = %raw.node_id, "Discarding out-of-bounds node name");
            name.clear();
        }

        Some(ParsedNode {
            node_id: raw.node_id.clone(),
            role,
            name,
            value,
            description,
            properties,
            states,
            children: raw.child_ids.clone().unwrap_or_default(),
            parent_id: raw.parent_id.clone(),
            backend_dom_node_id: raw.backend_dom_node_id,
            bounding_box: raw.bounding_box.clone(),
            ignored: raw.ignored,
            is_interactive: false,
        })
    }

    /// Collect properties from the explicit list plus the well-known
    /// flattened booleans.
    fn extract_properties(&self, raw: &RawNode) -> Vec<NodeProperty> {
        let mut properties = Vec::new();

        if let Some(entries) = &raw.properties {
            for entry in entries {
                if entry.name.is_empty() {
                    continue;
                }
                if let Some(value) = &entry.value.value {
                    properties.push(NodeProperty {
                        name: entry.name.clone(),
                        value: value.clone(),
                        source: PropertySource::Accessibility,
                    });
                }
            }
        }

        for (name, flag) in [
            ("checked", raw.checked),
            ("expanded", raw.expanded),
            ("selected", raw.selected),
            ("disabled", raw.disabled),
        ] {
            if let Some(b) = flag {
                properties.push(NodeProperty {
                    name: name.to_string(),
                    value: Value::Bool(b),
                    source: PropertySource::Node,
                });
            }
        }

        properties
    }

    /// Extract state labels from the property list plus flattened booleans.
    ///
    /// Exactly one of `visible`/`hidden` is always present.
    fn extract_states(&self, raw: &RawNode) -> Vec<ElementState> {
        let mut states = Vec::new();

        if let Some(entries) = &raw.properties {
            for entry in entries {
                let Some(state) = ElementState::from_name(&entry.name) else {
                    continue;
                };
                // Visibility is resolved separately so the pair stays exclusive.
                if matches!(state, ElementState::Hidden | ElementState::Visible) {
                    continue;
                }
                let truthy = entry.value.value.as_ref().is_some_and(is_truthy);
                if truthy && !states.contains(&state) {
                    states.push(state);
                }
            }
        }

        for (flag, state) in flattened_states(raw) {
            if flag == Some(true) && !states.contains(&state) {
                states.push(state);
            }
        }

        if self.is_hidden(raw) {
            states.push(ElementState::Hidden);
        } else {
            states.push(ElementState::Visible);
        }

        states
    }

    fn is_hidden(&self, raw: &RawNode) -> bool {
        if raw.hidden == Some(true) {
            return true;
        }
        raw.properties.as_ref().is_some_and(|entries| {
            entries.iter().any(|entry| {
                entry.name == "hidden" && entry.value.value.as_ref().is_some_and(is_truthy)
            })
        })
    }

    /// A name is kept only if its trimmed length is within the configured
    /// bounds.
    pub fn is_text_valid(&self, text: &str) -> bool {
        let len = text.trim().chars().count();
        len >= self.config.min_text_length && len <= self.config.max_text_length
    }

    /// Diagnostic one-liner for a parsed node.
    pub fn node_summary(&self, node: &ParsedNode) -> String {
        let mut parts = vec![format!("role={}", node.role)];

        if !node.name.is_empty() {
            parts.push(format!("name='{}'", clean_text(&node.name)));
        }
        if let Some(value) = &node.value {
            parts.push(format!("value='{}'", clean_text(value)));
        }
        if !node.states.is_empty() {
            let labels: Vec<&str> = node.states.iter().map(ElementState::as_str).collect();
            parts.push(format!("states=[{}]", labels.join(", ")));
        }

        format!("ParsedNode({})", parts.join(", "))
    }
}

/// Clean surfaced text: collapse whitespace runs, strip control characters
/// and HTML-tag-like substrings. Stored names are never rewritten by this.
pub fn clean_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let cleaned = WHITESPACE_RUNS.replace_all(text.trim(), " ");
    let cleaned = CONTROL_CHARS.replace_all(&cleaned, "");
    let cleaned = HTML_TAGS.replace_all(&cleaned, "");
    cleaned.into_owned()
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
