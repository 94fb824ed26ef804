// replysweep - quoted reply-chain cleaner for message compose regions
//
// Finds compose regions in a live document, removes quoted reply chains from
// them once, and keeps them clean as they are edited.
//
// Architecture:
// - Heuristics: text patterns, marker classes and quote tags (built once)
// - Sweeper: applies marker → structural → generic strategies to one subtree
// - Watcher: one task per compose root, sweeps on every change batch
// - Discovery: finds compose roots, attaches watchers exactly once
// - Event system: SweepEvents flow over mpsc channels to the CLI, demo and journal

mod cli;
mod config;
mod demo;
mod discovery;
mod dom;
mod events;
mod heuristics;
mod journal;
mod logging;
mod startup;
mod sweeper;
mod watcher;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use heuristics::HeuristicSet;
use std::process::ExitCode;

/// Generate a unique session ID for journal file naming
/// Format: YYYYMMDD-HHMMSS-XXXX (timestamp + 4 random hex chars)
fn generate_session_id() -> String {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let timestamp = Utc::now().format("%Y%m%d-%H%M%S");
    // Use RandomState to get a random value without adding a dependency
    let random = RandomState::new().build_hasher().finish();
    let short_hash = format!("{:04x}", random & 0xFFFF);

    format!("{}-{}", timestamp, short_hash)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Config commands run before loading so a broken file can be reset
    if let Commands::Config { show, reset, path } = &cli.command {
        cli::handle_config(cli.config.as_deref(), *show, *reset, *path)?;
        return Ok(ExitCode::SUCCESS);
    }

    let config = Config::load(cli.config.as_deref())?;

    // Keep the guard alive for the whole process so file logs flush
    let _file_guard = logging::init(&config.logging);

    let session_id = generate_session_id();
    tracing::debug!("Session ID: {}", session_id);

    match cli.command {
        Commands::Clean {
            input,
            output,
            all,
            events,
        } => {
            cli::handle_clean(&config, &session_id, &input, output.as_deref(), all, events)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Classify { text } => {
            let verdict = cli::handle_classify(&config, text)?;
            Ok(if verdict.is_reply_chain() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
        Commands::Demo { step_ms } => {
            let step_ms = cli::validate_step(step_ms)?;
            let heuristics = HeuristicSet::from_config(&config.heuristics);
            let config_path = cli.config.clone().or_else(Config::config_path);
            startup::print_startup(&config, &heuristics, config_path.as_deref());
            startup::log_startup(&config, &heuristics);

            demo::run_demo(config, &session_id, step_ms).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { .. } => Ok(ExitCode::SUCCESS),
    }
}
