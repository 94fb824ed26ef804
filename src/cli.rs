// CLI module - command-line argument parsing and handlers
//
// Subcommands:
// - clean: sweep the compose regions of an HTML file (or its whole body)
// - classify: run the text heuristics on one block of text
// - demo: scripted live session through discovery and watchers
// - config --show / --path / --reset: configuration management

use crate::config::{Config, VERSION};
use crate::discovery::{compile_selectors, find_candidates};
use crate::dom::{Document, NodeId};
use crate::events::{SweepEvent, SweepTrigger};
use crate::heuristics::{HeuristicSet, Verdict};
use crate::journal::Journal;
use crate::sweeper::{SweepReport, TreeSweeper};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// replysweep - removes quoted reply chains from message compose regions
#[derive(Parser)]
#[command(name = "replysweep")]
#[command(version = VERSION)]
#[command(about = "Removes quoted reply chains from message compose regions", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.config/replysweep/config.toml
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Remove reply chains from an HTML file
    Clean {
        /// HTML file to clean ("-" reads stdin)
        input: PathBuf,

        /// Write the cleaned HTML here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Sweep the whole body instead of only compose regions
        #[arg(long)]
        all: bool,

        /// Print removal events as JSON lines on stderr
        #[arg(long)]
        events: bool,
    },

    /// Classify text as reply-chain or not (exit 0 when it is)
    Classify {
        /// Text to classify (reads stdin when omitted)
        text: Option<String>,
    },

    /// Run a scripted live session: compose windows open, replies get pasted
    Demo {
        /// Pause between scripted host actions, in milliseconds
        #[arg(long, default_value_t = 400)]
        step_ms: u64,
    },

    /// Manage configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Reset config file to defaults
        #[arg(long)]
        reset: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// clean
// ─────────────────────────────────────────────────────────────────────────────

/// Sweep every candidate root (or the whole body) of a loaded document
pub fn clean_document(
    doc: &mut Document,
    sweeper: &TreeSweeper,
    selectors: &[String],
    all: bool,
) -> Vec<SweepReport> {
    let roots: Vec<NodeId> = if all {
        vec![doc.body()]
    } else {
        let selectors = compile_selectors(selectors);
        find_candidates(doc, &selectors)
            .into_iter()
            .map(|(root, _)| root)
            .collect()
    };

    let mut reports = Vec::with_capacity(roots.len());
    for root in roots {
        // an earlier root's sweep may have removed a nested candidate
        if doc.contains(root) {
            reports.push(sweeper.sweep(doc, root));
        }
    }
    reports
}

fn read_input(input: &Path) -> Result<String> {
    if input == Path::new("-") {
        let mut source = String::new();
        std::io::stdin()
            .read_to_string(&mut source)
            .context("Failed to read HTML from stdin")?;
        return Ok(source);
    }
    std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input.display()))
}

pub fn handle_clean(
    config: &Config,
    session_id: &str,
    input: &Path,
    output: Option<&Path>,
    all: bool,
    print_events: bool,
) -> Result<()> {
    let source = read_input(input)?;
    let mut doc = Document::parse_html(&source);

    let heuristics = Arc::new(HeuristicSet::from_config(&config.heuristics));
    let sweeper = TreeSweeper::new(heuristics);
    let reports = clean_document(&mut doc, &sweeper, &config.discovery.selectors, all);

    if reports.is_empty() {
        tracing::warn!("No compose regions matched; use --all to sweep the whole body");
    }

    let journal = if config.journal.enabled {
        Some(Journal::new(config.journal.dir.clone(), session_id.to_string())?)
    } else {
        None
    };

    let events: Vec<SweepEvent> = reports
        .iter()
        .flat_map(|report| SweepEvent::from_report(report, SweepTrigger::Manual, 0))
        .collect();
    for event in &events {
        if print_events {
            eprintln!(
                "{}",
                serde_json::to_string(event).context("Failed to serialize event")?
            );
        }
        if let Some(journal) = &journal {
            journal.write_event(event)?;
        }
    }

    let removed: usize = reports.iter().map(SweepReport::removed_count).sum();
    tracing::info!(
        roots = reports.len(),
        removed,
        nodes_left = doc.node_count(),
        "Cleaned {}",
        input.display()
    );

    let cleaned = doc.to_html();
    match output {
        Some(path) => std::fs::write(path, cleaned)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", cleaned).context("Failed to write to stdout")?;
        }
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// classify
// ─────────────────────────────────────────────────────────────────────────────

/// Print the verdict; returns it so the caller can pick the exit status
pub fn handle_classify(config: &Config, text: Option<String>) -> Result<Verdict> {
    let text = match text {
        Some(text) => text,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read text from stdin")?;
            text
        }
    };

    let heuristics = HeuristicSet::from_config(&config.heuristics);
    let verdict = heuristics.classify(&text);
    match heuristics.matcher().explain(&text) {
        Some(pattern) if verdict.is_reply_chain() => println!(
            "{} (matched {} [{}])",
            verdict,
            pattern.name(),
            pattern.locale()
        ),
        _ => println!("{}", verdict),
    }
    Ok(verdict)
}

// ─────────────────────────────────────────────────────────────────────────────
// config
// ─────────────────────────────────────────────────────────────────────────────

/// Handle `config`. Runs before the config is loaded so a broken file can
/// still be located and reset.
pub fn handle_config(
    config_path: Option<&Path>,
    show: bool,
    reset: bool,
    path: bool,
) -> Result<()> {
    let target = match config_path {
        Some(p) => p.to_path_buf(),
        None => Config::config_path().context("Could not determine config path")?,
    };

    if path {
        println!("{}", target.display());
    } else if show {
        handle_config_show(&target)?;
    } else if reset {
        handle_config_reset(&target)?;
    } else {
        // No flag provided, show help
        println!("Usage: replysweep config [--show|--reset|--path]");
        println!();
        println!("Options:");
        println!("  --show    Display effective configuration");
        println!("  --reset   Reset config file to defaults");
        println!("  --path    Show config file path");
    }
    Ok(())
}

fn handle_config_show(path: &Path) -> Result<()> {
    let config = Config::load(Some(path))?;

    println!("# Effective configuration (env > file > defaults)");
    if path.exists() {
        println!("# Source: {}", path.display());
    } else {
        println!("# Source: defaults (no config file)");
    }
    print!("{}", config.to_toml());
    Ok(())
}

fn handle_config_reset(path: &Path) -> Result<()> {
    // Confirm if file exists
    if path.exists() {
        eprint!(
            "Config file exists at {}. Overwrite? [y/N] ",
            path.display()
        );
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Error creating directory {}", parent.display()))?;
    }

    // Write the default config (using Config's single source of truth)
    std::fs::write(path, Config::default().to_toml())
        .with_context(|| format!("Error writing config {}", path.display()))?;

    println!("Config reset to defaults: {}", path.display());
    Ok(())
}

/// Longest accepted pause between demo steps
pub const MAX_STEP_MS: u64 = 60_000;

/// Reject step durations that would make the demo unreadable or spin
pub fn validate_step(step_ms: u64) -> Result<u64> {
    if step_ms == 0 {
        bail!("--step-ms must be greater than zero");
    }
    if step_ms > MAX_STEP_MS {
        bail!("--step-ms must be at most {} (got {})", MAX_STEP_MS, step_ms);
    }
    Ok(step_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
<div class="thread"><blockquote>On Mon, Jan 1, 2024 at 9:00 AM, Ana wrote:</blockquote></div>
<div class="compose"><div contenteditable="true" role="textbox"><div>Sounds good!</div><div class="gmail_quote"><div>On Mon, Jan 1, 2024 at 10:00 AM, Bob &lt;bob@example.com&gt; wrote:</div><blockquote>earlier</blockquote></div></div></div>
</body></html>"#;

    fn sweeper() -> TreeSweeper {
        TreeSweeper::new(Arc::new(HeuristicSet::default()))
    }

    #[test]
    fn test_clean_only_touches_compose_regions() {
        let mut doc = Document::parse_html(PAGE);
        let selectors = Config::default().discovery.selectors;

        let reports = clean_document(&mut doc, &sweeper(), &selectors, false);
        let html = doc.inner_html(doc.body());

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].removed_count(), 1);
        assert!(html.contains("Sounds good!"));
        assert!(!html.contains("gmail_quote"));
        // read view outside any compose region is left alone
        assert!(html.contains("Ana wrote:"));
    }

    #[test]
    fn test_clean_all_sweeps_whole_body() {
        let mut doc = Document::parse_html(PAGE);
        let selectors = Config::default().discovery.selectors;

        clean_document(&mut doc, &sweeper(), &selectors, true);
        let html = doc.inner_html(doc.body());

        assert!(!html.contains("Ana wrote:"));
        assert!(html.contains("Sounds good!"));
    }

    #[test]
    fn test_clean_keeps_page_outside_body() {
        let page = format!(
            "<html><head><title>Re: plans</title><style>p > b {{ margin: 0 }}</style></head>\
             <body>{}</body></html>",
            r#"<div role="textbox"><p>ok</p><div class="gmail_quote">old</div></div>"#
        );
        let mut doc = Document::parse_html(&page);
        let selectors = Config::default().discovery.selectors;

        clean_document(&mut doc, &sweeper(), &selectors, false);

        assert_eq!(
            doc.to_html(),
            "<html><head><title>Re: plans</title><style>p > b { margin: 0 }</style></head>\
             <body><div role=\"textbox\"><p>ok</p></div></body></html>"
        );
    }

    #[test]
    fn test_clean_without_candidates_changes_nothing() {
        let mut doc = Document::parse_html("<p>From: nobody</p>");
        let before = doc.inner_html(doc.body());

        let reports = clean_document(&mut doc, &sweeper(), &[], false);

        assert!(reports.is_empty());
        assert_eq!(doc.inner_html(doc.body()), before);
    }

    #[test]
    fn test_cli_parses_clean_flags() {
        let cli = Cli::try_parse_from([
            "replysweep",
            "clean",
            "in.html",
            "-o",
            "out.html",
            "--events",
            "--config",
            "custom.toml",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        match cli.command {
            Commands::Clean {
                input,
                output,
                all,
                events,
            } => {
                assert_eq!(input, PathBuf::from("in.html"));
                assert_eq!(output, Some(PathBuf::from("out.html")));
                assert!(!all);
                assert!(events);
            }
            _ => panic!("expected clean"),
        }
    }

    #[test]
    fn test_step_bounds() {
        assert!(validate_step(0).is_err());
        assert!(validate_step(MAX_STEP_MS + 1).is_err());
        assert!(validate_step(u64::MAX).is_err());
        assert_eq!(validate_step(250).unwrap(), 250);
        assert_eq!(validate_step(MAX_STEP_MS).unwrap(), MAX_STEP_MS);
    }
}
