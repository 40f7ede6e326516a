//! Analyzer configuration.
//!
//! Defaults match the values the analyzer was tuned with; every knob can be
//! overridden programmatically or from the environment via
//! [`AnalyzerConfig::from_env`].

use std::collections::HashSet;
use std::time::Duration;

use tracing::warn;

/// Accessibility-tree parsing configuration.
#[derive(Debug, Clone)]
pub struct AccessibilityConfig {
    /// Minimum trimmed length for a node name to be kept.
    pub min_text_length: usize,
    /// Maximum trimmed length for a node name to be kept.
    pub max_text_length: usize,
    /// Roles that make an element interactive on their own.
    pub interactive_roles: HashSet<String>,
}

impl Default for AccessibilityConfig {
    fn default() -> Self {
        let interactive_roles = [
            "button", "link", "textbox", "checkbox", "radio", "combobox", "listbox", "menu",
            "menuitem", "tab", "dialog", "alert", "toolbar", "grid", "gridcell",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        Self {
            min_text_length: 1,
            max_text_length: 500,
            interactive_roles,
        }
    }
}

/// Element indexing and caching configuration.
#[derive(Debug, Clone)]
pub struct IndexingConfig {
    /// How long a cached analysis result stays valid.
    pub cache_ttl: Duration,
    /// Maximum number of elements indexed per pass.
    pub max_elements: usize,
    /// Upper bound for the parent-chain depth walk.
    pub max_depth: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(30),
            max_elements: 1000,
            max_depth: 10,
        }
    }
}

/// Top-level analyzer configuration.
#[derive(Debug, Clone, Default)]
pub struct AnalyzerConfig {
    pub accessibility: AccessibilityConfig,
    pub indexing: IndexingConfig,
}

impl AnalyzerConfig {
    /// Build a configuration from defaults plus environment overrides.
    ///
    /// Recognized variables: `MIN_TEXT_LENGTH`, `MAX_TEXT_LENGTH`,
    /// `CACHE_TTL_SECS`, `MAX_ELEMENTS`, `MAX_DEPTH`. Unparseable values are
    /// ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = read_env_usize("MIN_TEXT_LENGTH") {
            config.accessibility.min_text_length = v;
        }
        if let Some(v) = read_env_usize("MAX_TEXT_LENGTH") {
            config.accessibility.max_text_length = v;
        }
        if let Some(v) = read_env_usize("CACHE_TTL_SECS") {
            config.indexing.cache_ttl = Duration::from_secs(v as u64);
        }
        if let Some(v) = read_env_usize("MAX_ELEMENTS") {
            config.indexing.max_elements = v;
        }
        if let Some(v) = read_env_usize("MAX_DEPTH") {
            config.indexing.max_depth = v;
        }

        config
    }
}

fn read_env_usize(name: &str) -> Option<usize> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring unparseable {}={}", name, raw);
            None
        }
    }
}
