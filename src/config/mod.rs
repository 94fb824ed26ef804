//! Configuration for the reply-chain cleaner
//!
//! Configuration is loaded in order of precedence:
//! 1. Environment variables (highest priority)
//! 2. Config file (~/.config/replysweep/config.toml, or `--config <path>`)
//! 3. Built-in defaults (lowest priority)
//!
//! The built-in defaults are the canonical heuristic set, selector list and
//! timings. The file only extends or retunes them.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

// ─────────────────────────────────────────────────────────────────────────────
// Submodules
// ─────────────────────────────────────────────────────────────────────────────

mod discovery;
mod heuristics;
mod observability;
mod serialization;

#[cfg(test)]
mod tests;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (maintain public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use discovery::{DiscoveryConfig, FileDiscovery, FileWatcher, WatcherConfig};
pub use heuristics::{FileHeuristics, HeuristicsConfig, PatternConfig};
pub use observability::{FileJournal, FileLogging, JournalConfig, LogRotation, LoggingConfig};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ─────────────────────────────────────────────────────────────────────────────
// Application Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Application configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Heuristic set: locales, extra patterns, marker classes, quote tags
    pub heuristics: HeuristicsConfig,

    /// Candidate-root selectors and discovery timings
    pub discovery: DiscoveryConfig,

    /// Change-watcher settings
    pub watcher: WatcherConfig,

    /// JSONL journal of sweep events
    pub journal: JournalConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

// ─────────────────────────────────────────────────────────────────────────────
// File Configuration (deserialization layer)
// ─────────────────────────────────────────────────────────────────────────────

/// Config file structure
#[derive(Debug, Deserialize, Default)]
pub(crate) struct FileConfig {
    /// Optional [heuristics] section
    pub heuristics: Option<FileHeuristics>,

    /// Optional [discovery] section
    pub discovery: Option<FileDiscovery>,

    /// Optional [watcher] section
    pub watcher: Option<FileWatcher>,

    /// Optional [journal] section
    pub journal: Option<FileJournal>,

    /// Optional [logging] section
    pub logging: Option<FileLogging>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration Loading
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    /// Get the config file path: ~/.config/replysweep/config.toml
    /// Uses Unix-style ~/.config on all platforms for consistency
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join("replysweep").join("config.toml"))
    }

    /// Read the config file if it exists.
    ///
    /// A missing file means defaults. A file that exists but cannot be read or
    /// parsed is an error: silently falling back would hide the user's mistake.
    fn load_file_config(path: &Path) -> Result<FileConfig> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).with_context(|| {
                format!(
                    "Failed to parse configuration file {} (check quoting and section names)",
                    path.display()
                )
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
            Err(e) => Err(e)
                .with_context(|| format!("Cannot read configuration file {}", path.display())),
        }
    }

    /// Merge a parsed file over the defaults
    pub(crate) fn from_file_config(file: FileConfig) -> Self {
        Self {
            heuristics: HeuristicsConfig::from_file(file.heuristics),
            discovery: DiscoveryConfig::from_file(file.discovery),
            watcher: WatcherConfig::from_file(file.watcher),
            journal: JournalConfig::from_file(file.journal),
            logging: LoggingConfig::from_file(file.logging),
        }
    }

    /// Load configuration: file -> env vars -> defaults
    ///
    /// `path` overrides the default config location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let default_path = Self::config_path();
        let file = match path.or(default_path.as_deref()) {
            Some(path) => Self::load_file_config(path)?,
            None => FileConfig::default(),
        };

        let mut config = Self::from_file_config(file);
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides. `lookup` is injectable for tests.
    pub(crate) fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(ms) = lookup("REPLYSWEEP_INITIAL_DELAY_MS").and_then(|v| v.parse().ok()) {
            self.discovery.initial_delay_ms = ms;
        }
        if let Some(ms) = lookup("REPLYSWEEP_POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.discovery.poll_interval_ms = ms;
        }
        if let Some(level) = lookup("REPLYSWEEP_LOG_LEVEL") {
            self.logging.level = level;
        }
        // Setting a journal directory implies wanting the journal
        if let Some(dir) = lookup("REPLYSWEEP_JOURNAL_DIR") {
            self.journal.enabled = true;
            self.journal.dir = PathBuf::from(dir);
        }
    }
}
