//! Discovery and watcher configuration
//!
//! Which elements count as compose regions, when the discovery loop runs, and
//! how the per-root watcher batches notifications.

use serde::Deserialize;
use std::time::Duration;

/// Compose/edit-region selectors
pub const DEFAULT_SELECTORS: &[&str] = &[
    r#"div[contenteditable="true"]"#,
    r#"div[role="textbox"]"#,
    "div.Am.Al.editable",
];

// ─────────────────────────────────────────────────────────────────────────────
// Discovery
// ─────────────────────────────────────────────────────────────────────────────

/// Discovery loop settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Candidate-root selectors, queried in order
    pub selectors: Vec<String>,
    /// Delay before the first scheduled run (lets the host finish booting)
    pub initial_delay_ms: u64,
    /// Interval of the fallback run that catches missed notifications
    pub poll_interval_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            selectors: DEFAULT_SELECTORS.iter().map(|s| s.to_string()).collect(),
            initial_delay_ms: 2000,
            poll_interval_ms: 3000,
        }
    }
}

impl DiscoveryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Never zero: `tokio::time::interval` rejects a zero period
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Discovery settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileDiscovery {
    pub selectors: Option<Vec<String>>,
    pub initial_delay_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
}

impl DiscoveryConfig {
    /// Create from file config with defaults
    pub fn from_file(file: Option<FileDiscovery>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        Self {
            selectors: file.selectors.unwrap_or(defaults.selectors),
            initial_delay_ms: file.initial_delay_ms.unwrap_or(defaults.initial_delay_ms),
            poll_interval_ms: file.poll_interval_ms.unwrap_or(defaults.poll_interval_ms),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Watcher
// ─────────────────────────────────────────────────────────────────────────────

/// Change-watcher settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatcherConfig {
    /// Wait this long after the first notification of a batch before sweeping
    /// (0 = sweep immediately)
    pub debounce_ms: u64,
}

impl WatcherConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Watcher settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileWatcher {
    pub debounce_ms: Option<u64>,
}

impl WatcherConfig {
    /// Create from file config with defaults
    pub fn from_file(file: Option<FileWatcher>) -> Self {
        let file = file.unwrap_or_default();

        Self {
            debounce_ms: file.debounce_ms.unwrap_or_default(),
        }
    }
}
