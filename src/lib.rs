//! Stable element indexing over accessibility-tree snapshots.
//!
//! Turns a raw accessibility snapshot of a live web page into a typed,
//! indexed model of its elements so that an external actor (a script or an
//! LLM-driven agent) can reference elements by small integers instead of
//! fragile selectors.
//!
//! ## Architecture
//!
//! ```text
//! raw snapshot ──► AccessibilityParser ──► Vec<ParsedNode>
//!                                               │
//!                                               ▼
//!                    ElementIndexer ──► Vec<IndexedElement> (+ interactive subset)
//!                                               │
//!                                               ▼
//!                      PageAnalyzer ──► PageAnalysisResult (cached per target)
//! ```
//!
//! Indices stay stable across consecutive analyses for elements whose
//! underlying identifier is unchanged, as long as they stay in the same
//! interactive/non-interactive category. Index values are only unique within
//! one analysis result; consumers must re-fetch after every `analyze` call.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let analyzer = PageAnalyzer::new(AnalyzerConfig::default(), provider);
//! let result = analyzer.analyze("tab-1", false).await?;
//! for element in &result.interactive_elements {
//!     println!("{}", element.summary());
//! }
//! ```
//!
//! The snapshot provider (typically a remote-debugging session) is the only
//! I/O boundary; parsing and indexing are synchronous, CPU-bound passes.

mod analyzer;
pub mod ax;
mod config;
mod error;
mod snapshot;

pub use analyzer::{AnalysisStats, PageAnalysisResult, PageAnalyzer, PageSummary, fingerprint};
pub use ax::{
    AccessibilityParser, BoundingBox, ElementIndexer, ElementRole, ElementState, IndexedElement,
    IndexingStats, NodeProperty, ParsedNode, PropertySource, clean_text,
};
pub use config::{AccessibilityConfig, AnalyzerConfig, IndexingConfig};
pub use error::AnalyzerError;
pub use snapshot::{AxPropertyEntry, AxValue, RawNode, RawSnapshot, SnapshotProvider};
