//! Configuration tests
//!
//! These tests guard the file format: everything `to_toml` writes must parse
//! back into the same values, and every section must survive the trip.

use super::*;
use std::collections::HashMap;

// ─────────────────────────────────────────────────────────────────────────────
// Round-trip tests
// ─────────────────────────────────────────────────────────────────────────────

/// Verify that serialized config can be parsed back.
#[test]
fn test_config_roundtrip_default() {
    let config = Config::default();
    let toml_str = config.to_toml();

    let parsed: Result<FileConfig, _> = toml::from_str(&toml_str);
    assert!(
        parsed.is_ok(),
        "Default config should round-trip.\nTOML:\n{}\nError: {:?}",
        toml_str,
        parsed.err()
    );

    let restored = Config::from_file_config(parsed.unwrap());
    assert_eq!(restored.heuristics, config.heuristics);
    assert_eq!(restored.discovery, config.discovery);
    assert_eq!(restored.watcher, config.watcher);
    assert_eq!(restored.journal, config.journal);
    assert_eq!(restored.logging, config.logging);
}

/// Patterns contain backslashes, quotes and non-ASCII text; all must survive.
#[test]
fn test_config_roundtrip_with_patterns() {
    let mut config = Config::default();
    config.heuristics.locales = vec!["en".into(), "fr".into(), "de".into()];
    config.heuristics.patterns = vec![
        PatternConfig {
            name: "original-message".into(),
            locale: Some("en".into()),
            pattern: r#"^-+ ?Original "Message" ?-+$"#.into(),
        },
        PatternConfig {
            name: "escribio".into(),
            locale: None,
            pattern: r"^El \d+ .+ escribió:$".into(),
        },
    ];
    config.discovery.selectors = vec![r#"div[aria-label="Message Body"]"#.into()];
    config.watcher.debounce_ms = 50;
    config.journal.enabled = true;
    config.logging.file_rotation = LogRotation::Hourly;

    let toml_str = config.to_toml();
    let parsed: FileConfig = toml::from_str(&toml_str)
        .unwrap_or_else(|e| panic!("should parse:\n{}\n{:?}", toml_str, e));
    let restored = Config::from_file_config(parsed);

    assert_eq!(restored.heuristics, config.heuristics);
    assert_eq!(restored.discovery, config.discovery);
    assert_eq!(restored.watcher.debounce_ms, 50);
    assert!(restored.journal.enabled);
    assert_eq!(restored.logging.file_rotation, LogRotation::Hourly);
}

// ─────────────────────────────────────────────────────────────────────────────
// Partial files and defaults
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_empty_file_yields_defaults() {
    let parsed: FileConfig = toml::from_str("").unwrap();
    let config = Config::from_file_config(parsed);

    assert_eq!(config.heuristics.locales, vec!["en", "fr"]);
    assert_eq!(config.heuristics.marker_classes, vec!["gmail_quote"]);
    assert_eq!(config.heuristics.quote_tags, vec!["blockquote"]);
    assert_eq!(config.discovery.selectors.len(), 3);
    assert_eq!(config.discovery.initial_delay_ms, 2000);
    assert_eq!(config.discovery.poll_interval_ms, 3000);
    assert_eq!(config.watcher.debounce_ms, 0);
    assert!(!config.journal.enabled);
}

#[test]
fn test_partial_section_keeps_other_defaults() {
    let parsed: FileConfig = toml::from_str(
        r#"
[discovery]
poll_interval_ms = 500

[[heuristics.patterns]]
name = "wrote-nl"
locale = "nl"
pattern = '^Op .+ schreef .+:$'
"#,
    )
    .unwrap();
    let config = Config::from_file_config(parsed);

    assert_eq!(config.discovery.poll_interval_ms, 500);
    assert_eq!(config.discovery.initial_delay_ms, 2000);
    assert_eq!(config.heuristics.locales, vec!["en", "fr"]);
    assert_eq!(config.heuristics.patterns.len(), 1);
    assert_eq!(config.heuristics.patterns[0].locale.as_deref(), Some("nl"));
}

#[test]
fn test_unknown_rotation_falls_back_to_daily() {
    assert_eq!(LogRotation::parse("weekly"), LogRotation::Daily);
    assert_eq!(LogRotation::parse("HOURLY"), LogRotation::Hourly);
}

#[test]
fn test_invalid_file_is_an_error() {
    let dir = std::env::temp_dir().join(format!("replysweep-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("broken.toml");
    std::fs::write(&path, "[discovery\npoll_interval_ms = ").unwrap();

    let result = Config::load_file_config(&path);
    std::fs::remove_dir_all(&dir).ok();

    assert!(result.is_err());
}

#[test]
fn test_missing_file_yields_defaults() {
    let path = std::env::temp_dir().join("replysweep-definitely-missing.toml");
    let file = Config::load_file_config(&path).unwrap();
    assert!(file.discovery.is_none());
}

// ─────────────────────────────────────────────────────────────────────────────
// Environment overrides
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_env_overrides_file_values() {
    let env: HashMap<&str, &str> = [
        ("REPLYSWEEP_INITIAL_DELAY_MS", "10"),
        ("REPLYSWEEP_POLL_INTERVAL_MS", "not-a-number"),
        ("REPLYSWEEP_LOG_LEVEL", "debug"),
        ("REPLYSWEEP_JOURNAL_DIR", "/tmp/sweeps"),
    ]
    .into_iter()
    .collect();

    let mut config = Config::default();
    config.apply_env(|key| env.get(key).map(|v| v.to_string()));

    assert_eq!(config.discovery.initial_delay_ms, 10);
    // Unparseable values are ignored
    assert_eq!(config.discovery.poll_interval_ms, 3000);
    assert_eq!(config.logging.level, "debug");
    assert!(config.journal.enabled);
    assert_eq!(config.journal.dir, PathBuf::from("/tmp/sweeps"));
}

#[test]
fn test_poll_interval_is_never_zero() {
    let discovery = DiscoveryConfig {
        poll_interval_ms: 0,
        ..DiscoveryConfig::default()
    };
    assert!(!discovery.poll_interval().is_zero());
}
