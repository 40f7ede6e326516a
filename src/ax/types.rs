//! Semantic element model derived from accessibility snapshots.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::AccessibilityConfig;

/// Closed role vocabulary for indexed elements.
///
/// Raw roles outside this vocabulary degrade to [`ElementRole::Generic`]; the
/// original role string survives as the element's `tag_name` and `role`
/// attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementRole {
    Button,
    Link,
    Textbox,
    Checkbox,
    Radio,
    Combobox,
    Listbox,
    Menu,
    Menuitem,
    Tab,
    Tabpanel,
    Dialog,
    Alert,
    Status,
    Toolbar,
    Tooltip,
    Grid,
    Gridcell,
    Row,
    Column,
    Rowheader,
    Columnheader,
    Generic,
}

impl ElementRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementRole::Button => "button",
            ElementRole::Link => "link",
            ElementRole::Textbox => "textbox",
            ElementRole::Checkbox => "checkbox",
            ElementRole::Radio => "radio",
            ElementRole::Combobox => "combobox",
            ElementRole::Listbox => "listbox",
            ElementRole::Menu => "menu",
            ElementRole::Menuitem => "menuitem",
            ElementRole::Tab => "tab",
            ElementRole::Tabpanel => "tabpanel",
            ElementRole::Dialog => "dialog",
            ElementRole::Alert => "alert",
            ElementRole::Status => "status",
            ElementRole::Toolbar => "toolbar",
            ElementRole::Tooltip => "tooltip",
            ElementRole::Grid => "grid",
            ElementRole::Gridcell => "gridcell",
            ElementRole::Row => "row",
            ElementRole::Column => "column",
            ElementRole::Rowheader => "rowheader",
            ElementRole::Columnheader => "columnheader",
            ElementRole::Generic => "generic",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let role = match name {
            "button" => ElementRole::Button,
            "link" => ElementRole::Link,
            "textbox" => ElementRole::Textbox,
            "checkbox" => ElementRole::Checkbox,
            "radio" => ElementRole::Radio,
            "combobox" => ElementRole::Combobox,
            "listbox" => ElementRole::Listbox,
            "menu" => ElementRole::Menu,
            "menuitem" => ElementRole::Menuitem,
            "tab" => ElementRole::Tab,
            "tabpanel" => ElementRole::Tabpanel,
            "dialog" => ElementRole::Dialog,
            "alert" => ElementRole::Alert,
            "status" => ElementRole::Status,
            "toolbar" => ElementRole::Toolbar,
            "tooltip" => ElementRole::Tooltip,
            "grid" => ElementRole::Grid,
            "gridcell" => ElementRole::Gridcell,
            "row" => ElementRole::Row,
            "column" => ElementRole::Column,
            "rowheader" => ElementRole::Rowheader,
            "columnheader" => ElementRole::Columnheader,
            "generic" => ElementRole::Generic,
            _ => return None,
        };
        Some(role)
    }
}

/// Closed state vocabulary for parsed nodes and indexed elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementState {
    Visible,
    Hidden,
    Disabled,
    Readonly,
    Required,
    Invalid,
    Expanded,
    Collapsed,
    Selected,
    Checked,
    Focused,
}

impl ElementState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementState::Visible => "visible",
            ElementState::Hidden => "hidden",
            ElementState::Disabled => "disabled",
            ElementState::Readonly => "readonly",
            ElementState::Required => "required",
            ElementState::Invalid => "invalid",
            ElementState::Expanded => "expanded",
            ElementState::Collapsed => "collapsed",
            ElementState::Selected => "selected",
            ElementState::Checked => "checked",
            ElementState::Focused => "focused",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let state = match name {
            "visible" => ElementState::Visible,
            "hidden" => ElementState::Hidden,
            "disabled" => ElementState::Disabled,
            "readonly" => ElementState::Readonly,
            "required" => ElementState::Required,
            "invalid" => ElementState::Invalid,
            "expanded" => ElementState::Expanded,
            "collapsed" => ElementState::Collapsed,
            "selected" => ElementState::Selected,
            "checked" => ElementState::Checked,
            "focused" => ElementState::Focused,
            _ => return None,
        };
        Some(state)
    }
}

/// Where an extracted property came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertySource {
    /// The node's explicit accessibility property list.
    Accessibility,
    /// A boolean flattened onto the node itself.
    Node,
}

/// A named property extracted from a raw node, with provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeProperty {
    pub name: String,
    pub value: Value,
    pub source: PropertySource,
}

/// Bounding box for an element, in viewport coordinates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Check if a point is inside this bounding box.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }

    /// Get the center point of this bounding box.
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// A fully parsed accessibility node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedNode {
    pub node_id: String,
    /// Raw role string; may fall outside the closed vocabulary.
    pub role: String,
    /// Display name. Empty when absent or outside the configured bounds.
    pub name: String,
    pub value: Option<String>,
    pub description: Option<String>,
    pub properties: Vec<NodeProperty>,
    pub states: Vec<ElementState>,
    pub children: Vec<String>,
    pub parent_id: Option<String>,
    pub backend_dom_node_id: Option<i64>,
    pub bounding_box: Option<BoundingBox>,
    pub ignored: bool,
    /// Set by the parser's classification pass.
    pub is_interactive: bool,
}

/// Property names that encode role-like interactivity signals in some state
/// vocabularies.
const ROLE_LIKE_SIGNALS: [&str; 4] = ["button", "link", "menuitem", "tab"];

/// Property names that mark an element as actionable when truthy.
const ACTIONABLE_PROPERTIES: [&str; 3] = ["clickable", "pressable", "selectable"];

/// Event-handler markers; presence alone is the signal, regardless of value.
const EVENT_HANDLER_PROPERTIES: [&str; 4] = ["onclick", "onkeydown", "onkeyup", "onsubmit"];

impl ParsedNode {
    pub fn has_state(&self, state: ElementState) -> bool {
        self.states.contains(&state)
    }

    /// Classify interactivity from this node's own fields.
    ///
    /// The rule is shared between the parser's classification pass and the
    /// indexer, which re-evaluates it rather than trusting a precomputed flag.
    pub fn compute_interactive(&self, config: &AccessibilityConfig) -> bool {
        if config.interactive_roles.contains(self.role.as_str()) {
            return true;
        }

        for prop in &self.properties {
            let name = prop.name.as_str();
            if ROLE_LIKE_SIGNALS.contains(&name) && is_truthy(&prop.value) {
                return true;
            }
            if ACTIONABLE_PROPERTIES.contains(&name) && is_truthy(&prop.value) {
                return true;
            }
            if EVENT_HANDLER_PROPERTIES.contains(&name) {
                return true;
            }
        }

        false
    }
}

/// Scalar truthiness: `true`, non-zero numbers, and non-empty strings count.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// An indexed page element, the unit external actors reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedElement {
    /// Index unique within one analysis result. Values may repeat across
    /// passes; only identifier continuity is guaranteed.
    pub index: usize,
    pub role: ElementRole,
    /// Visible text (the node name).
    pub text: String,
    /// Raw role string as a tag-name stand-in.
    pub tag_name: String,
    /// States flattened to "true"/"false" strings plus role/name/value.
    pub attributes: HashMap<String, String>,
    pub states: Vec<ElementState>,
    /// Diagnostic locator. No uniqueness guarantee; never use for identity.
    pub path: String,
    pub bounding_box: Option<BoundingBox>,
    pub is_interactive: bool,
    pub parent_index: Option<usize>,
    pub children_indices: Vec<usize>,
}

impl IndexedElement {
    /// Compact one-line rendering for prompt assembly.
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("[{}]", self.index), format!("<{}>", self.tag_name)];

        if !self.text.is_empty() {
            let text: String = if self.text.chars().count() > 50 {
                let truncated: String = self.text.chars().take(47).collect();
                format!("{}...", truncated)
            } else {
                self.text.clone()
            };
            parts.push(format!("\"{}\"", text.replace('\n', " ")));
        }

        let shown_states: Vec<&str> = self
            .states
            .iter()
            .filter(|s| !matches!(s, ElementState::Visible))
            .map(ElementState::as_str)
            .collect();
        if !shown_states.is_empty() {
            parts.push(format!("states=[{}]", shown_states.join(", ")));
        }

        if self.is_interactive {
            parts.push("interactive".to_string());
        }

        parts.join(" ")
    }
}
