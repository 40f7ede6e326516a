//! Analyzer error types.

use thiserror::Error;

/// Errors surfaced by the page analyzer.
///
/// Parsing and indexing never fail on their own; malformed input degrades to
/// fewer (or zero) results with a logged diagnostic. The variants here cover
/// the snapshot-provider boundary and wire decoding.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// The snapshot provider failed to produce a snapshot.
    #[error("Snapshot provider failed: {0}")]
    Provider(String),

    /// A provider fetch or element wait ran out of time.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The requested target does not exist at the provider.
    #[error("Target not found: {0}")]
    TargetNotFound(String),

    /// Wire decoding error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
