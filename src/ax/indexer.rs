//! Stable element indexer.
//!
//! Assigns compact integer indices to parsed nodes and keeps them stable
//! across consecutive passes: a node whose identifier survives from the
//! previous pass keeps its index, as long as it stayed in the same
//! interactive/non-interactive category. Indices are unique within a pass
//! only; values may repeat across passes.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::AnalyzerConfig;

use super::types::{ElementRole, ElementState, IndexedElement, ParsedNode};

/// Index carried over from the previous pass, with the category it was
/// assigned under.
#[derive(Debug, Clone, Copy)]
struct PreviousIndex {
    index: usize,
    interactive: bool,
}

/// An indexed element plus the per-pass metadata the indexer keeps for it.
#[derive(Debug, Clone)]
struct IndexedRecord {
    element: IndexedElement,
    is_new: bool,
    depth: usize,
}

/// Cumulative indexing statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexingStats {
    /// Elements indexed in the most recent pass.
    pub total_indexed: usize,
    /// Interactive elements in the most recent pass.
    pub interactive_indexed: usize,
    /// Elements first seen in the most recent pass.
    pub new_elements: usize,
    /// Cumulative index reuses across passes.
    pub cached_hits: u64,
    /// Cumulative fresh allocations across passes.
    pub cache_misses: u64,
}

impl IndexingStats {
    /// Fraction of index assignments served by reuse.
    pub fn cache_efficiency(&self) -> f64 {
        let total = self.cached_hits + self.cache_misses;
        if total == 0 {
            return 0.0;
        }
        self.cached_hits as f64 / total as f64
    }
}

/// Assigns stable indices to parsed nodes and answers point queries against
/// the most recent pass.
pub struct ElementIndexer {
    config: AnalyzerConfig,
    counter: usize,
    records: BTreeMap<usize, IndexedRecord>,
    id_to_index: HashMap<String, usize>,
    path_to_index: HashMap<String, usize>,
    // Continuity state. Replaced wholesale at the end of a successful pass.
    previous_indices: HashMap<String, PreviousIndex>,
    previous_paths: HashMap<String, usize>,
    stats: IndexingStats,
}

impl ElementIndexer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            config,
            counter: 0,
            records: BTreeMap::new(),
            id_to_index: HashMap::new(),
            path_to_index: HashMap::new(),
            previous_indices: HashMap::new(),
            previous_paths: HashMap::new(),
            stats: IndexingStats::default(),
        }
    }

    /// Index one pass of parsed nodes.
    ///
    /// Runs in two phases: eligibility plus index assignment for every node,
    /// then relationship resolution and element construction. The split lets
    /// a child appearing after its parent in snapshot order still resolve.
    pub fn index_elements(&mut self, nodes: &[ParsedNode]) -> Vec<IndexedElement> {
        self.counter = 0;
        self.records.clear();
        self.id_to_index.clear();
        self.path_to_index.clear();

        // Phase 1: eligibility and index assignment. Reuse decisions run
        // before fresh allocation so a surviving identifier can never lose
        // its index to a newly discovered element.
        let mut pending: Vec<Pending<'_>> = Vec::new();
        let mut used: HashSet<usize> = HashSet::new();
        let mut truncated = false;

        for node in nodes {
            if !self.should_index(node) {
                continue;
            }
            if pending.len() >= self.config.indexing.max_elements {
                truncated = true;
                break;
            }

            let interactive = node.compute_interactive(&self.config.accessibility);
            let reused = self.try_reuse(node, interactive, &mut used);
            pending.push(Pending {
                node,
                interactive,
                reused,
            });
        }

        if truncated {
            warn!(
                max_elements = self.config.indexing.max_elements,
                "Element limit reached, remaining nodes not indexed"
            );
        }

        let mut assigned: Vec<Assignment<'_>> = Vec::with_capacity(pending.len());
        for item in pending {
            let index = match item.reused {
                Some(index) => index,
                None => {
                    self.stats.cache_misses += 1;
                    while !used.insert(self.counter) {
                        self.counter += 1;
                    }
                    let index = self.counter;
                    self.counter += 1;
                    index
                }
            };

            let path = generate_path(item.node);
            let is_new = !self.previous_indices.contains_key(&item.node.node_id)
                && !self.previous_paths.contains_key(&path);

            self.id_to_index.insert(item.node.node_id.clone(), index);
            self.path_to_index.insert(path.clone(), index);
            assigned.push(Assignment {
                node: item.node,
                index,
                interactive: item.interactive,
                is_new,
                path,
            });
        }

        // Phase 2: resolve relationships and build elements.
        let by_id: HashMap<&str, &ParsedNode> = assigned
            .iter()
            .map(|a| (a.node.node_id.as_str(), a.node))
            .collect();

        let mut elements = Vec::with_capacity(assigned.len());
        for assignment in assigned {
            let element = self.build_element(&assignment, &by_id);
            let depth = self.compute_depth(assignment.node, &by_id);
            elements.push(element.clone());
            self.records.insert(
                assignment.index,
                IndexedRecord {
                    element,
                    is_new: assignment.is_new,
                    depth,
                },
            );
        }

        self.update_stats(&elements);
        self.commit_pass();

        info!(
            total = elements.len(),
            interactive = self.stats.interactive_indexed,
            "Indexing pass completed"
        );
        elements
    }

    /// Eligibility filter: hidden nodes, nameless generics, and over-long
    /// names are never indexed.
    fn should_index(&self, node: &ParsedNode) -> bool {
        if node.has_state(ElementState::Hidden) {
            return false;
        }
        if node.name.is_empty() && node.role == "generic" {
            return false;
        }
        if node.name.chars().count() > self.config.accessibility.max_text_length {
            return false;
        }
        true
    }

    /// Reuse the previous pass's index for this identifier when the category
    /// matches.
    ///
    /// `used` tracks indices claimed so far; a retired index (category
    /// switch) is also marked so the element cannot come back under its old
    /// index by coincidence of allocation order.
    fn try_reuse(
        &mut self,
        node: &ParsedNode,
        interactive: bool,
        used: &mut HashSet<usize>,
    ) -> Option<usize> {
        let prev = self.previous_indices.get(&node.node_id)?;
        if prev.interactive == interactive {
            if used.insert(prev.index) {
                self.stats.cached_hits += 1;
                debug!(node_id = %node.node_id, index = prev.index, "Reusing index");
                return Some(prev.index);
            }
        } else {
            used.insert(prev.index);
            debug!(node_id = %node.node_id, "Category changed, retiring previous index");
        }
        None
    }

    fn build_element(
        &self,
        assignment: &Assignment<'_>,
        by_id: &HashMap<&str, &ParsedNode>,
    ) -> IndexedElement {
        let node = assignment.node;

        let parent_index = node
            .parent_id
            .as_deref()
            .and_then(|id| self.id_to_index.get(id).copied());
        let children_indices = node
            .children
            .iter()
            .filter_map(|id| self.id_to_index.get(id.as_str()).copied())
            .collect();

        IndexedElement {
            index: assignment.index,
            role: ElementRole::from_name(&node.role).unwrap_or(ElementRole::Generic),
            text: node.name.clone(),
            tag_name: if node.role.is_empty() {
                "generic".to_string()
            } else {
                node.role.clone()
            },
            attributes: synthesize_attributes(node),
            states: node.states.clone(),
            path: assignment.path.clone(),
            // Layout data is externally supplied; absent is the common case.
            bounding_box: node.bounding_box.clone(),
            is_interactive: assignment.interactive,
            parent_index,
            children_indices,
        }
    }

    /// Depth of a node: hops up the parent chain through nodes indexed in
    /// this pass. Bounded by a visited set and `max_depth` so a cyclic or
    /// dangling chain always terminates.
    fn compute_depth(&self, node: &ParsedNode, by_id: &HashMap<&str, &ParsedNode>) -> usize {
        let mut depth = 0;
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = node.parent_id.as_deref();

        while let Some(parent_id) = current {
            if depth >= self.config.indexing.max_depth {
                break;
            }
            if !visited.insert(parent_id) {
                debug!(node_id = %node.node_id, "Cycle in parent chain, stopping depth walk");
                break;
            }
            depth += 1;
            if !self.id_to_index.contains_key(parent_id) {
                break;
            }
            current = by_id.get(parent_id).and_then(|p| p.parent_id.as_deref());
        }

        depth
    }

    fn update_stats(&mut self, elements: &[IndexedElement]) {
        self.stats.total_indexed = elements.len();
        self.stats.interactive_indexed = elements.iter().filter(|e| e.is_interactive).count();
        self.stats.new_elements = self.records.values().filter(|r| r.is_new).count();
    }

    /// Replace the continuity maps with this pass's assignments, wholesale.
    fn commit_pass(&mut self) {
        let mut next = HashMap::with_capacity(self.id_to_index.len());
        for (id, index) in &self.id_to_index {
            if let Some(record) = self.records.get(index) {
                next.insert(
                    id.clone(),
                    PreviousIndex {
                        index: *index,
                        interactive: record.element.is_interactive,
                    },
                );
            }
        }
        self.previous_indices = next;
        self.previous_paths = self.path_to_index.clone();
    }

    // ========================================================================
    // Point queries against the most recent pass
    // ========================================================================

    /// Element at `index`, if the most recent pass produced one.
    pub fn element_by_index(&self, index: usize) -> Option<IndexedElement> {
        self.records.get(&index).map(|r| r.element.clone())
    }

    /// All interactive elements from the most recent pass, ordered by index.
    pub fn interactive_elements(&self) -> Vec<IndexedElement> {
        self.records
            .values()
            .filter(|r| r.element.is_interactive)
            .map(|r| r.element.clone())
            .collect()
    }

    /// Elements with the given role from the most recent pass, ordered by
    /// index.
    pub fn elements_by_role(&self, role: ElementRole) -> Vec<IndexedElement> {
        self.records
            .values()
            .filter(|r| r.element.role == role)
            .map(|r| r.element.clone())
            .collect()
    }

    /// Whether the element at `index` was first seen in the most recent pass.
    pub fn is_new(&self, index: usize) -> Option<bool> {
        self.records.get(&index).map(|r| r.is_new)
    }

    /// Tree depth of the element at `index`.
    pub fn depth_of(&self, index: usize) -> Option<usize> {
        self.records.get(&index).map(|r| r.depth)
    }

    pub fn stats(&self) -> &IndexingStats {
        &self.stats
    }

    /// Drop cross-pass continuity state and reset reuse counters.
    ///
    /// The next pass will allocate every index fresh.
    pub fn clear(&mut self) {
        self.previous_indices.clear();
        self.previous_paths.clear();
        self.stats.cached_hits = 0;
        self.stats.cache_misses = 0;
    }
}

struct Pending<'a> {
    node: &'a ParsedNode,
    interactive: bool,
    reused: Option<usize>,
}

struct Assignment<'a> {
    node: &'a ParsedNode,
    index: usize,
    interactive: bool,
    is_new: bool,
    path: String,
}

/// Diagnostic path string: role plus attribute fragments for name and value,
/// `//generic` when nothing is available. No uniqueness guarantee.
pub fn generate_path(node: &ParsedNode) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !node.role.is_empty() && node.role != "generic" {
        parts.push(node.role.clone());
    }
    if !node.name.is_empty() {
        parts.push(format!("[@name=\"{}\"]", escape_quotes(&node.name)));
    }
    if let Some(value) = &node.value {
        if !value.is_empty() {
            parts.push(format!("[@value=\"{}\"]", escape_quotes(value)));
        }
    }
    if parts.is_empty() {
        parts.push("generic".to_string());
    }

    format!("//{}", parts.concat())
}

fn escape_quotes(text: &str) -> String {
    text.replace('"', "\\\"").replace('\'', "\\'")
}

/// Flatten states to "true"/"false" attribute strings and surface
/// role/name/value.
fn synthesize_attributes(node: &ParsedNode) -> HashMap<String, String> {
    let mut attributes = HashMap::new();

    for state in &node.states {
        attributes.insert(state.as_str().to_string(), "true".to_string());
    }
    // Explicit false-valued state properties surface as "false".
    for prop in &node.properties {
        if let Some(state) = ElementState::from_name(&prop.name) {
            if prop.value == serde_json::Value::Bool(false)
                && !node.states.contains(&state)
            {
                attributes.insert(state.as_str().to_string(), "false".to_string());
            }
        }
    }

    if !node.role.is_empty() {
        attributes.insert("role".to_string(), node.role.clone());
    }
    if !node.name.is_empty() {
        attributes.insert("name".to_string(), node.name.clone());
    }
    if let Some(value) = &node.value {
        if !value.is_empty() {
            attributes.insert("value".to_string(), value.clone());
        }
    }

    attributes
}

#[cfg(test)]
#[path = "indexer_tests.rs"]
mod tests;
