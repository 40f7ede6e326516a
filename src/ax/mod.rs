//! Accessibility-tree processing: typed node model, parser, and stable
//! element indexer.

mod indexer;
mod parser;
mod types;

pub use indexer::{ElementIndexer, IndexingStats, generate_path};
pub use parser::{AccessibilityParser, clean_text};
pub use types::{
    BoundingBox, ElementRole, ElementState, IndexedElement, NodeProperty, ParsedNode,
    PropertySource,
};
