use std::sync::atomic::{AtomicU64, Ordering};

use super::*;
use crate::snapshot::{AxPropertyEntry, AxValue, RawNode, RawSnapshot};

const TARGET: &str = "tab-1";

fn raw(id: &str, role: &str, name: &str) -> RawNode {
    RawNode {
        node_id: id.to_string(),
        role: Some(AxValue::string(role)),
        name: Some(AxValue::string(name)),
        ..Default::default()
    }
}

fn clickable(id: &str, name: &str) -> RawNode {
    let mut node = raw(id, "generic", name);
    node.properties = Some(vec![AxPropertyEntry {
        name: "clickable".to_string(),
        value: AxValue::boolean(true),
    }]);
    node
}

fn two_button_snapshot() -> RawSnapshot {
    RawSnapshot {
        nodes: vec![raw("n1", "button", "Submit"), raw("n2", "button", "Cancel")],
        url: "https://example.com/form".to_string(),
        title: "Form".to_string(),
        metrics: None,
    }
}

/// Serves a configurable snapshot and counts fetches. Knows only [`TARGET`].
#[derive(Default)]
struct FakeProvider {
    snapshot: Mutex<RawSnapshot>,
    fetches: AtomicU64,
    fail: Mutex<bool>,
    delay: Mutex<Option<Duration>>,
}

impl FakeProvider {
    fn with_snapshot(snapshot: RawSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            ..Default::default()
        }
    }

    fn set_snapshot(&self, snapshot: RawSnapshot) {
        *self.snapshot.lock() = snapshot;
    }

    fn fetches(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SnapshotProvider for FakeProvider {
    async fn fetch_snapshot(&self, target_id: &str) -> Result<RawSnapshot, AnalyzerError> {
        if target_id != TARGET {
            return Err(AnalyzerError::TargetNotFound(target_id.to_string()));
        }
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.fail.lock() {
            return Err(AnalyzerError::Provider("snapshot fetch failed".to_string()));
        }
        Ok(self.snapshot.lock().clone())
    }
}

#[async_trait::async_trait]
impl SnapshotProvider for Arc<FakeProvider> {
    async fn fetch_snapshot(&self, target_id: &str) -> Result<RawSnapshot, AnalyzerError> {
        self.as_ref().fetch_snapshot(target_id).await
    }
}

fn analyzer(provider: FakeProvider) -> PageAnalyzer<FakeProvider> {
    PageAnalyzer::new(AnalyzerConfig::default(), provider)
}

fn analyzer_with_ttl(provider: FakeProvider, ttl: Duration) -> PageAnalyzer<FakeProvider> {
    let mut config = AnalyzerConfig::default();
    config.indexing.cache_ttl = ttl;
    PageAnalyzer::new(config, provider)
}

#[tokio::test]
async fn test_analyze_single_button_scenario() {
    let snapshot = RawSnapshot {
        nodes: vec![raw("1", "button", "Submit"), raw("2", "generic", "")],
        url: "https://example.com".to_string(),
        title: "Example".to_string(),
        metrics: None,
    };
    let analyzer = analyzer(FakeProvider::with_snapshot(snapshot));

    let result = analyzer.analyze(TARGET, false).await.unwrap();
    assert_eq!(result.total_elements, 1);
    assert_eq!(result.interactive_count, 1);
    let element = &result.elements[0];
    assert_eq!(element.index, 0);
    assert_eq!(element.role, ElementRole::Button);
    assert!(element.is_interactive);
    assert_eq!(result.url, "https://example.com");
    assert_eq!(result.title, "Example");
    assert_eq!(result.nodes.len(), 2);
}

#[tokio::test]
async fn test_cache_hit_within_ttl() {
    let analyzer = analyzer(FakeProvider::with_snapshot(two_button_snapshot()));

    let first = analyzer.analyze(TARGET, false).await.unwrap();
    let second = analyzer.analyze(TARGET, false).await.unwrap();

    assert_eq!(first.dom_hash, second.dom_hash);
    assert_eq!(first.timestamp, second.timestamp);
    assert_eq!(analyzer.provider.fetches(), 1);

    let stats = analyzer.stats();
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.cache_misses, 1);
    assert_eq!(stats.total_analyses, 1);
}

#[tokio::test]
async fn test_cache_expires_after_ttl() {
    let analyzer = analyzer_with_ttl(
        FakeProvider::with_snapshot(two_button_snapshot()),
        Duration::from_millis(50),
    );

    analyzer.analyze(TARGET, false).await.unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    analyzer.analyze(TARGET, false).await.unwrap();

    assert_eq!(analyzer.provider.fetches(), 2);
    let stats = analyzer.stats();
    assert_eq!(stats.cache_misses, 2);
    assert_eq!(stats.total_analyses, 2);
}

#[tokio::test]
async fn test_force_refresh_bypasses_cache() {
    let analyzer = analyzer(FakeProvider::with_snapshot(two_button_snapshot()));

    analyzer.analyze(TARGET, false).await.unwrap();
    analyzer.analyze(TARGET, true).await.unwrap();

    assert_eq!(analyzer.provider.fetches(), 2);
    assert_eq!(analyzer.stats().cache_hits, 0);
}

#[tokio::test]
async fn test_repeated_analysis_is_idempotent() {
    let analyzer = analyzer(FakeProvider::with_snapshot(two_button_snapshot()));

    let first = analyzer.analyze(TARGET, true).await.unwrap();
    let second = analyzer.analyze(TARGET, true).await.unwrap();

    assert_eq!(first.dom_hash, second.dom_hash);
    let first_indices: Vec<(usize, String)> = first
        .elements
        .iter()
        .map(|e| (e.index, e.text.clone()))
        .collect();
    let second_indices: Vec<(usize, String)> = second
        .elements
        .iter()
        .map(|e| (e.index, e.text.clone()))
        .collect();
    assert_eq!(first_indices, second_indices);
}

#[tokio::test]
async fn test_fingerprint_is_order_sensitive() {
    let analyzer = analyzer(FakeProvider::with_snapshot(two_button_snapshot()));
    let first = analyzer.analyze(TARGET, true).await.unwrap();

    let mut reordered = two_button_snapshot();
    reordered.nodes.reverse();
    analyzer.provider.set_snapshot(reordered);
    let second = analyzer.analyze(TARGET, true).await.unwrap();

    assert_ne!(first.dom_hash, second.dom_hash);
}

#[tokio::test]
async fn test_index_stability_across_analyses() {
    let analyzer = analyzer(FakeProvider::with_snapshot(two_button_snapshot()));
    let first = analyzer.analyze(TARGET, true).await.unwrap();
    let cancel_index = first
        .elements
        .iter()
        .find(|e| e.text == "Cancel")
        .unwrap()
        .index;

    // Remove the unrelated first button; Cancel keeps its index.
    let mut shrunk = two_button_snapshot();
    shrunk.nodes.remove(0);
    analyzer.provider.set_snapshot(shrunk);
    let second = analyzer.analyze(TARGET, true).await.unwrap();

    assert_eq!(second.elements.len(), 1);
    assert_eq!(second.elements[0].index, cancel_index);
}

#[tokio::test]
async fn test_provider_failure_leaves_state_untouched() {
    let provider = FakeProvider::with_snapshot(two_button_snapshot());
    let analyzer = analyzer(provider);

    let first = analyzer.analyze(TARGET, true).await.unwrap();

    *analyzer.provider.fail.lock() = true;
    let err = analyzer.analyze(TARGET, true).await.unwrap_err();
    assert!(matches!(err, AnalyzerError::Provider(_)));

    // Continuity survived the failed pass: the same snapshot reindexes onto
    // the same indices.
    *analyzer.provider.fail.lock() = false;
    let third = analyzer.analyze(TARGET, true).await.unwrap();
    let first_indices: Vec<usize> = first.elements.iter().map(|e| e.index).collect();
    let third_indices: Vec<usize> = third.elements.iter().map(|e| e.index).collect();
    assert_eq!(first_indices, third_indices);
    assert_eq!(first.dom_hash, third.dom_hash);
}

#[tokio::test]
async fn test_unknown_target_propagates() {
    let analyzer = analyzer(FakeProvider::with_snapshot(two_button_snapshot()));
    let err = analyzer.analyze("no-such-tab", false).await.unwrap_err();
    assert!(matches!(err, AnalyzerError::TargetNotFound(_)));
}

#[tokio::test]
async fn test_invalidate_clears_index_continuity() {
    let analyzer = analyzer(FakeProvider::with_snapshot(two_button_snapshot()));
    analyzer.analyze(TARGET, false).await.unwrap();

    analyzer.invalidate(TARGET);

    // Without continuity the surviving node allocates fresh from zero.
    let mut shrunk = two_button_snapshot();
    shrunk.nodes.remove(0);
    analyzer.provider.set_snapshot(shrunk);
    let result = analyzer.analyze(TARGET, false).await.unwrap();
    assert_eq!(result.elements[0].index, 0);
    assert_eq!(analyzer.provider.fetches(), 2);
}

#[tokio::test]
async fn test_invalidate_all() {
    let analyzer = analyzer(FakeProvider::with_snapshot(two_button_snapshot()));
    analyzer.analyze(TARGET, false).await.unwrap();
    analyzer.invalidate_all();

    analyzer.analyze(TARGET, false).await.unwrap();
    assert_eq!(analyzer.provider.fetches(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_analyses_single_flight() {
    let provider = Arc::new(FakeProvider::with_snapshot(two_button_snapshot()));
    *provider.delay.lock() = Some(Duration::from_millis(50));
    let analyzer = Arc::new(PageAnalyzer::new(AnalyzerConfig::default(), provider.clone()));

    let a = {
        let analyzer = analyzer.clone();
        tokio::spawn(async move { analyzer.analyze(TARGET, false).await })
    };
    let b = {
        let analyzer = analyzer.clone();
        tokio::spawn(async move { analyzer.analyze(TARGET, false).await })
    };

    let first = a.await.unwrap().unwrap();
    let second = b.await.unwrap().unwrap();

    // The second caller waited for the first pass and took its result.
    assert_eq!(provider.fetches(), 1);
    assert_eq!(first.dom_hash, second.dom_hash);
    assert_eq!(first.timestamp, second.timestamp);
}

#[tokio::test]
async fn test_stats_arithmetic() {
    let analyzer = analyzer(FakeProvider::with_snapshot(two_button_snapshot()));
    analyzer.analyze(TARGET, false).await.unwrap();
    analyzer.analyze(TARGET, false).await.unwrap();
    analyzer.analyze(TARGET, false).await.unwrap();

    let stats = analyzer.stats();
    assert_eq!(stats.cache_hits, 2);
    assert_eq!(stats.cache_misses, 1);
    assert!((stats.hit_rate() - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(stats.total_analyses, 1);
    assert_eq!(stats.average_analysis_time(), stats.total_analysis_time);
}

#[tokio::test]
async fn test_element_queries() {
    let snapshot = RawSnapshot {
        nodes: vec![
            raw("n1", "button", "Submit"),
            raw("n2", "link", "Help"),
            clickable("n3", "Banner"),
        ],
        ..Default::default()
    };
    let analyzer = analyzer(FakeProvider::with_snapshot(snapshot));

    let element = analyzer.element_by_index(TARGET, 1).await.unwrap().unwrap();
    assert_eq!(element.text, "Help");

    let interactive = analyzer.interactive_elements(TARGET).await.unwrap();
    assert_eq!(interactive.len(), 3);

    let links = analyzer
        .elements_by_role(TARGET, ElementRole::Link)
        .await
        .unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].text, "Help");

    // One provider fetch serves all the queries above.
    assert_eq!(analyzer.provider.fetches(), 1);
}

#[tokio::test]
async fn test_find_element_by_text() {
    let analyzer = analyzer(FakeProvider::with_snapshot(two_button_snapshot()));

    let found = analyzer
        .find_element_by_text(TARGET, "subm", None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.text, "Submit");

    let wrong_role = analyzer
        .find_element_by_text(TARGET, "subm", Some(ElementRole::Link))
        .await
        .unwrap();
    assert!(wrong_role.is_none());

    let missing = analyzer
        .find_element_by_text(TARGET, "nothing here", None)
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_wait_for_element() {
    let analyzer = analyzer(FakeProvider::with_snapshot(two_button_snapshot()));

    let present = analyzer
        .wait_for_element(TARGET, "Cancel", Duration::from_millis(200))
        .await
        .unwrap();
    assert!(present.is_some());

    let absent = analyzer
        .wait_for_element(TARGET, "Confirm", Duration::from_millis(50))
        .await
        .unwrap();
    assert!(absent.is_none());
}

#[tokio::test]
async fn test_page_summary() {
    let snapshot = RawSnapshot {
        nodes: vec![
            raw("n1", "button", "Submit"),
            raw("n2", "button", "Cancel"),
            raw("n3", "link", "Help"),
        ],
        url: "https://example.com".to_string(),
        title: "Example".to_string(),
        metrics: None,
    };
    let analyzer = analyzer(FakeProvider::with_snapshot(snapshot));

    let summary = analyzer.page_summary(TARGET).await.unwrap();
    assert_eq!(summary.url, "https://example.com");
    assert_eq!(summary.total_elements, 3);
    assert_eq!(summary.interactive_count, 3);
    assert_eq!(summary.role_distribution.get("button"), Some(&2));
    assert_eq!(summary.role_distribution.get("link"), Some(&1));
}
