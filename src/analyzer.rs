//! Page-state analysis and caching.
//!
//! [`PageAnalyzer`] orchestrates one analysis pass (fetch snapshot, parse,
//! index, fingerprint) and serves cached results within a TTL window. Each
//! target owns one state cell holding both its last result and its indexer,
//! so invalidation drops cached output and index continuity together, and an
//! async mutex on the cell gives at most one in-flight fresh analysis per
//! target.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::ax::{
    AccessibilityParser, ElementIndexer, ElementRole, IndexedElement, ParsedNode,
};
use crate::config::AnalyzerConfig;
use crate::error::AnalyzerError;
use crate::snapshot::SnapshotProvider;

/// How often [`PageAnalyzer::wait_for_element`] re-analyzes the page.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// The result of one page analysis pass.
#[derive(Debug, Clone, Serialize)]
pub struct PageAnalysisResult {
    pub target_id: String,
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub title: String,
    pub nodes: Vec<ParsedNode>,
    pub elements: Vec<IndexedElement>,
    pub interactive_elements: Vec<IndexedElement>,
    pub page_metrics: Option<serde_json::Value>,
    /// Order-sensitive content fingerprint; see [`fingerprint`].
    pub dom_hash: String,
    pub analysis_time: Duration,
    pub total_elements: usize,
    pub interactive_count: usize,
}

/// Compact page description with a per-role element breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct PageSummary {
    pub url: String,
    pub title: String,
    pub total_elements: usize,
    pub interactive_count: usize,
    pub dom_hash: String,
    pub analysis_time: Duration,
    pub timestamp: DateTime<Utc>,
    pub role_distribution: HashMap<String, usize>,
}

/// Cumulative analysis statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisStats {
    pub total_analyses: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub total_analysis_time: Duration,
}

impl AnalysisStats {
    /// Fraction of `analyze` calls served from cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / total as f64
    }

    /// Mean duration of a fresh analysis pass.
    pub fn average_analysis_time(&self) -> Duration {
        if self.total_analyses == 0 {
            return Duration::ZERO;
        }
        self.total_analysis_time / self.total_analyses as u32
    }
}

struct CachedResult {
    result: PageAnalysisResult,
    fetched_at: Instant,
}

/// Per-target state: the last result and the indexer that produced it.
///
/// Keeping them in one cell makes invalidation atomic and lets the cell's
/// mutex double as the single-flight guard.
struct TargetState {
    indexer: ElementIndexer,
    cached: Option<CachedResult>,
}

/// Analyzes pages into stable, indexed element models with TTL caching.
pub struct PageAnalyzer<P> {
    config: AnalyzerConfig,
    provider: P,
    parser: AccessibilityParser,
    targets: Mutex<HashMap<String, Arc<tokio::sync::Mutex<TargetState>>>>,
    stats: Mutex<AnalysisStats>,
}

impl<P: SnapshotProvider> PageAnalyzer<P> {
    pub fn new(config: AnalyzerConfig, provider: P) -> Self {
        let parser = AccessibilityParser::new(config.accessibility.clone());
        Self {
            config,
            provider,
            parser,
            targets: Mutex::new(HashMap::new()),
            stats: Mutex::new(AnalysisStats::default()),
        }
    }

    /// Analyze the page behind `target_id`, serving a cached result when one
    /// is still within the TTL and `force_refresh` is false.
    ///
    /// Concurrent calls for the same target are serialized: the second caller
    /// waits on the first pass and then takes its result as a cache hit.
    pub async fn analyze(
        &self,
        target_id: &str,
        force_refresh: bool,
    ) -> Result<PageAnalysisResult, AnalyzerError> {
        let cell = self.target_cell(target_id);
        let mut state = cell.lock().await;

        if !force_refresh {
            if let Some(cached) = &state.cached {
                if cached.fetched_at.elapsed() < self.config.indexing.cache_ttl {
                    self.stats.lock().cache_hits += 1;
                    debug!(target_id, "Serving cached page analysis");
                    return Ok(cached.result.clone());
                }
            }
        }
        self.stats.lock().cache_misses += 1;

        // Fetch before touching any state: a failed or cancelled fetch leaves
        // the cached result and the indexer's continuity maps untouched.
        let started = Instant::now();
        let snapshot = self.provider.fetch_snapshot(target_id).await?;

        let nodes = self.parser.parse(&snapshot);
        let elements = state.indexer.index_elements(&nodes);
        let interactive_elements = state.indexer.interactive_elements();
        let dom_hash = fingerprint(&nodes, &elements);
        let analysis_time = started.elapsed();

        let result = PageAnalysisResult {
            target_id: target_id.to_string(),
            timestamp: Utc::now(),
            url: snapshot.url,
            title: snapshot.title,
            total_elements: elements.len(),
            interactive_count: interactive_elements.len(),
            nodes,
            elements,
            interactive_elements,
            page_metrics: snapshot.metrics,
            dom_hash,
            analysis_time,
        };

        state.cached = Some(CachedResult {
            result: result.clone(),
            fetched_at: started,
        });

        {
            let mut stats = self.stats.lock();
            stats.total_analyses += 1;
            stats.total_analysis_time += analysis_time;
        }

        info!(
            target_id,
            elements = result.total_elements,
            interactive = result.interactive_count,
            elapsed_ms = analysis_time.as_millis() as u64,
            "Page analysis completed"
        );
        Ok(result)
    }

    /// Element at `index` from the current analysis of `target_id`.
    pub async fn element_by_index(
        &self,
        target_id: &str,
        index: usize,
    ) -> Result<Option<IndexedElement>, AnalyzerError> {
        let result = self.analyze(target_id, false).await?;
        Ok(result.elements.into_iter().find(|e| e.index == index))
    }

    /// Interactive elements from the current analysis, ordered by index.
    pub async fn interactive_elements(
        &self,
        target_id: &str,
    ) -> Result<Vec<IndexedElement>, AnalyzerError> {
        let result = self.analyze(target_id, false).await?;
        Ok(result.interactive_elements)
    }

    /// Elements with the given role from the current analysis, ordered by
    /// index.
    pub async fn elements_by_role(
        &self,
        target_id: &str,
        role: ElementRole,
    ) -> Result<Vec<IndexedElement>, AnalyzerError> {
        let result = self.analyze(target_id, false).await?;
        Ok(result
            .elements
            .into_iter()
            .filter(|e| e.role == role)
            .collect())
    }

    /// First interactive element whose text contains `text`
    /// (case-insensitive), optionally restricted to a role.
    pub async fn find_element_by_text(
        &self,
        target_id: &str,
        text: &str,
        role: Option<ElementRole>,
    ) -> Result<Option<IndexedElement>, AnalyzerError> {
        let needle = text.to_lowercase();
        let result = self.analyze(target_id, false).await?;
        Ok(result.interactive_elements.into_iter().find(|e| {
            e.text.to_lowercase().contains(&needle) && role.is_none_or(|r| e.role == r)
        }))
    }

    /// Poll the page until an interactive element matching `text` appears.
    ///
    /// Each poll forces a fresh analysis. Returns `Ok(None)` when the timeout
    /// elapses without a match.
    pub async fn wait_for_element(
        &self,
        target_id: &str,
        text: &str,
        timeout: Duration,
    ) -> Result<Option<IndexedElement>, AnalyzerError> {
        let deadline = Instant::now() + timeout;

        loop {
            self.analyze(target_id, true).await?;
            if let Some(element) = self.find_element_by_text(target_id, text, None).await? {
                return Ok(Some(element));
            }
            if Instant::now() >= deadline {
                warn!(target_id, text, "Element did not appear before timeout");
                return Ok(None);
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    /// Compact description of the current page state.
    pub async fn page_summary(&self, target_id: &str) -> Result<PageSummary, AnalyzerError> {
        let result = self.analyze(target_id, false).await?;

        let mut role_distribution: HashMap<String, usize> = HashMap::new();
        for element in &result.elements {
            *role_distribution
                .entry(element.role.as_str().to_string())
                .or_insert(0) += 1;
        }

        Ok(PageSummary {
            url: result.url,
            title: result.title,
            total_elements: result.total_elements,
            interactive_count: result.interactive_count,
            dom_hash: result.dom_hash,
            analysis_time: result.analysis_time,
            timestamp: result.timestamp,
            role_distribution,
        })
    }

    /// Drop the cached result and index continuity for one target.
    pub fn invalidate(&self, target_id: &str) {
        if self.targets.lock().remove(target_id).is_some() {
            info!(target_id, "Invalidated page state");
        }
    }

    /// Drop cached results and index continuity for every target.
    pub fn invalidate_all(&self) {
        self.targets.lock().clear();
        info!("Invalidated all page state");
    }

    /// Snapshot of the cumulative analysis statistics.
    pub fn stats(&self) -> AnalysisStats {
        self.stats.lock().clone()
    }

    fn target_cell(&self, target_id: &str) -> Arc<tokio::sync::Mutex<TargetState>> {
        let mut targets = self.targets.lock();
        targets
            .entry(target_id.to_string())
            .or_insert_with(|| {
                Arc::new(tokio::sync::Mutex::new(TargetState {
                    indexer: ElementIndexer::new(self.config.clone()),
                    cached: None,
                }))
            })
            .clone()
    }
}

/// Content fingerprint: Sha256 over `(id, role, name, value)` per parsed node
/// and `(index, role, text)` per element, record-delimited, in iteration
/// order.
///
/// The digest is order-sensitive: the same content enumerated in a different
/// order hashes differently. It signals "the page changed" and is never used
/// for index-reuse decisions.
pub fn fingerprint(nodes: &[ParsedNode], elements: &[IndexedElement]) -> String {
    let mut hasher = Sha256::new();

    for node in nodes {
        hasher.update(node.node_id.as_bytes());
        hasher.update(b":");
        hasher.update(node.role.as_bytes());
        hasher.update(b":");
        hasher.update(node.name.as_bytes());
        hasher.update(b":");
        hasher.update(node.value.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"|");
    }
    for element in elements {
        hasher.update(element.index.to_string().as_bytes());
        hasher.update(b":");
        hasher.update(element.role.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(element.text.as_bytes());
        hasher.update(b"|");
    }

    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
#[path = "analyzer_tests.rs"]
mod tests;
