//! Config serialization to TOML
//!
//! Single source of truth for config file format.

use super::Config;

/// Quote a string as a TOML basic string
fn toml_str(s: &str) -> String {
    toml::Value::String(s.to_string()).to_string()
}

/// Render a list of strings as an inline TOML array
fn toml_str_array(items: &[String]) -> String {
    let values = items
        .iter()
        .map(|s| toml::Value::String(s.clone()))
        .collect();
    toml::Value::Array(values).to_string()
}

impl Config {
    /// Serialize extra heuristic patterns as array-of-tables entries
    pub(super) fn patterns_to_toml(&self) -> String {
        if self.heuristics.patterns.is_empty() {
            // Show an example when no extra patterns are configured
            return r#"
# Extra text patterns (multi-line mode: ^ and $ match per line)
# [[heuristics.patterns]]
# name = "original-message"
# locale = "en"
# pattern = '^-+ ?Original Message ?-+$'
"#
            .to_string();
        }

        let mut output = String::from("\n");
        for pattern in &self.heuristics.patterns {
            output.push_str("[[heuristics.patterns]]\n");
            output.push_str(&format!("name = {}\n", toml_str(&pattern.name)));
            if let Some(locale) = &pattern.locale {
                output.push_str(&format!("locale = {}\n", toml_str(locale)));
            }
            output.push_str(&format!("pattern = {}\n", toml_str(&pattern.pattern)));
            output.push('\n');
        }
        output
    }

    /// Render the full config file
    pub fn to_toml(&self) -> String {
        format!(
            r#"# replysweep configuration

# Reply-chain heuristics
[heuristics]
# Built-in locale packs: en, fr, de, es
locales = {locales}
# Classes the mail client puts on quoted-content wrappers (always removed)
marker_classes = {markers}
# Quotation tags; removed only when their own text matches a pattern
quote_tags = {tags}
{patterns}
# Compose-region discovery
[discovery]
selectors = {selectors}
initial_delay_ms = {initial_delay}
poll_interval_ms = {poll_interval}

# Per-root change watcher
[watcher]
debounce_ms = {debounce}

# JSONL journal of sweep events (one file per session)
[journal]
enabled = {journal_enabled}
dir = {journal_dir}

# Logging configuration (RUST_LOG env var overrides)
[logging]
level = {log_level}
# File logging (in addition to stderr)
file_enabled = {log_file_enabled}
file_dir = {log_file_dir}
file_rotation = "{log_file_rotation}"  # hourly, daily, never
file_prefix = {log_file_prefix}
"#,
            locales = toml_str_array(&self.heuristics.locales),
            markers = toml_str_array(&self.heuristics.marker_classes),
            tags = toml_str_array(&self.heuristics.quote_tags),
            patterns = self.patterns_to_toml(),
            selectors = toml_str_array(&self.discovery.selectors),
            initial_delay = self.discovery.initial_delay_ms,
            poll_interval = self.discovery.poll_interval_ms,
            debounce = self.watcher.debounce_ms,
            journal_enabled = self.journal.enabled,
            journal_dir = toml_str(&self.journal.dir.display().to_string()),
            log_level = toml_str(&self.logging.level),
            log_file_enabled = self.logging.file_enabled,
            log_file_dir = toml_str(&self.logging.file_dir.display().to_string()),
            log_file_rotation = self.logging.file_rotation.as_str(),
            log_file_prefix = toml_str(&self.logging.file_prefix),
        )
    }
}
