//! Heuristic set configuration
//!
//! Text patterns come from built-in locale packs plus any extra patterns listed
//! in the file. Marker classes and quote tags drive the two structural rules.

use crate::heuristics::locales::DEFAULT_LOCALES;
use serde::Deserialize;

/// Canonical quoted-content marker placed by the mail client
pub const DEFAULT_MARKER_CLASSES: &[&str] = &["gmail_quote"];

/// Tags treated as quotation containers
pub const DEFAULT_QUOTE_TAGS: &[&str] = &["blockquote"];

/// An extra text-pattern heuristic from the config file
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PatternConfig {
    /// Name shown in traces and `classify` output
    pub name: String,
    /// Free-form locale label (defaults to "custom")
    #[serde(default)]
    pub locale: Option<String>,
    /// Regular expression; compiled in multi-line mode
    pub pattern: String,
}

/// Heuristic settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeuristicsConfig {
    /// Built-in locale packs to enable, in evaluation order
    pub locales: Vec<String>,
    /// Additional patterns evaluated after the locale packs
    pub patterns: Vec<PatternConfig>,
    /// Classes marking quoted-content wrappers (removed unconditionally)
    pub marker_classes: Vec<String>,
    /// Tags whose own text is classified by the structural strategy
    pub quote_tags: Vec<String>,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            locales: DEFAULT_LOCALES.iter().map(|s| s.to_string()).collect(),
            patterns: Vec::new(),
            marker_classes: DEFAULT_MARKER_CLASSES.iter().map(|s| s.to_string()).collect(),
            quote_tags: DEFAULT_QUOTE_TAGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Heuristic settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileHeuristics {
    pub locales: Option<Vec<String>>,
    #[serde(default)]
    pub patterns: Vec<PatternConfig>,
    pub marker_classes: Option<Vec<String>>,
    pub quote_tags: Option<Vec<String>>,
}

impl HeuristicsConfig {
    /// Create from file config with defaults
    pub fn from_file(file: Option<FileHeuristics>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        Self {
            locales: file.locales.unwrap_or(defaults.locales),
            patterns: file.patterns,
            marker_classes: file.marker_classes.unwrap_or(defaults.marker_classes),
            quote_tags: file.quote_tags.unwrap_or(defaults.quote_tags),
        }
    }
}
