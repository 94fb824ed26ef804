// Startup module - displays banner and module status for live sessions
//
// Shows:
// - Version info
// - Configuration file in use
// - Which heuristics, selectors and optional sinks are active

use crate::config::{Config, VERSION};
use crate::heuristics::HeuristicSet;
use std::path::Path;

/// ANSI color codes for terminal output
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GREEN: &str = "\x1b[32m";
    pub const MAGENTA: &str = "\x1b[35m";
}

/// Module status for display
pub struct ModuleStatus {
    pub name: &'static str,
    pub enabled: bool,
    pub description: String,
}

/// Status of all modules based on config and the built heuristic set
fn get_module_status(config: &Config, heuristics: &HeuristicSet) -> Vec<ModuleStatus> {
    vec![
        ModuleStatus {
            name: "matcher",
            enabled: true, // Core, always on
            description: format!(
                "{} text patterns ({})",
                heuristics.matcher().len(),
                config.heuristics.locales.join(", ")
            ),
        },
        ModuleStatus {
            name: "sweeper",
            enabled: true,
            description: format!(
                "marker [{}] → structural [{}] → generic",
                config.heuristics.marker_classes.join(", "),
                config.heuristics.quote_tags.join(", ")
            ),
        },
        ModuleStatus {
            name: "discovery",
            enabled: true,
            description: format!(
                "{} selectors, first run after {} ms, poll every {} ms",
                config.discovery.selectors.len(),
                config.discovery.initial_delay_ms,
                config.discovery.poll_interval_ms
            ),
        },
        ModuleStatus {
            name: "watcher",
            enabled: true,
            description: if config.watcher.debounce_ms == 0 {
                "sweep on every change batch".to_string()
            } else {
                format!("debounce {} ms", config.watcher.debounce_ms)
            },
        },
        ModuleStatus {
            name: "journal",
            enabled: config.journal.enabled,
            description: format!("JSONL events in {}", config.journal.dir.display()),
        },
        ModuleStatus {
            name: "file-log",
            enabled: config.logging.file_enabled,
            description: format!("rotating log in {}", config.logging.file_dir.display()),
        },
    ]
}

/// Print the startup banner and module status
pub fn print_startup(config: &Config, heuristics: &HeuristicSet, config_path: Option<&Path>) {
    use colors::*;

    println!();
    println!("  {BOLD}{CYAN}replysweep{RESET} {DIM}v{VERSION}{RESET}");
    println!("  {DIM}Quoted reply-chain cleaner{RESET}");
    println!();

    match config_path {
        Some(path) if path.exists() => {
            println!("  {DIM}Config:{RESET} {GREEN}✓{RESET} {}", path.display());
        }
        _ => println!("  {DIM}Config:{RESET} {DIM}(using defaults){RESET}"),
    }
    println!();

    println!("  {DIM}Loading modules...{RESET}");
    for module in &get_module_status(config, heuristics) {
        print_module_status(module);
    }
    println!();
    println!("  {MAGENTA}▸{RESET} Monitoring for compose regions");
    println!();
}

fn print_module_status(module: &ModuleStatus) {
    use colors::*;

    let (icon, style) = if module.enabled {
        (format!("{GREEN}✓{RESET}"), "")
    } else {
        (format!("{DIM}○{RESET}"), DIM)
    };

    println!(
        "    {icon} {style}{:<10}{RESET} {DIM}{}{RESET}",
        module.name, module.description
    );
}

/// Log the same status through tracing (ends up in the log file when enabled)
pub fn log_startup(config: &Config, heuristics: &HeuristicSet) {
    tracing::info!("replysweep v{} starting", VERSION);
    for module in get_module_status(config, heuristics) {
        let icon = if module.enabled { "✓" } else { "○" };
        tracing::info!("  {} {} - {}", icon, module.name, module.description);
    }
    for rule in heuristics.heuristics() {
        tracing::debug!("  rule: {}", rule);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_status_reflects_config() {
        let mut config = Config::default();
        config.journal.enabled = true;
        let heuristics = HeuristicSet::from_config(&config.heuristics);

        let modules = get_module_status(&config, &heuristics);
        let journal = modules.iter().find(|m| m.name == "journal").unwrap();
        let file_log = modules.iter().find(|m| m.name == "file-log").unwrap();
        let matcher = modules.iter().find(|m| m.name == "matcher").unwrap();

        assert!(journal.enabled);
        assert!(!file_log.enabled);
        assert_eq!(matcher.description, "9 text patterns (en, fr)");
    }
}
