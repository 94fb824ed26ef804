// Demo mode: a scripted host session driving the live loop end to end
//
// The "host" here is a tiny mail client built on the in-memory document:
// - a read view with an earlier message (must never be touched)
// - reply windows that open with quoted history pre-filled
// - a user who types, pastes forwarded headers and quotes a proverb
// - a compose window in French, and a window being closed
//
// The discovery loop and per-root watchers run as tasks alongside the script;
// every sweep event they publish is narrated as it happens.
//
// Run with: replysweep demo --step-ms 400

use crate::config::Config;
use crate::discovery::DiscoveryLoop;
use crate::dom::{lock_document, Document, NodeId, SharedDocument};
use crate::events::{Stats, SweepEvent};
use crate::heuristics::HeuristicSet;
use crate::journal::Journal;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

/// One scripted host action
#[derive(Debug, Clone)]
enum HostAction {
    /// Reply window whose client pre-fills a marked quote of the thread
    OpenReply {
        attribution: &'static str,
        quoted: &'static str,
    },
    /// Compose window whose initial lines come from elsewhere (no marker)
    OpenCompose { lines: &'static [&'static str] },
    /// The user types one line into a compose window
    TypeLine {
        compose: usize,
        text: &'static str,
    },
    /// The user pastes a block of lines wrapped in one container
    Paste {
        compose: usize,
        lines: &'static [&'static str],
    },
    /// The user inserts a blockquote
    Quote {
        compose: usize,
        text: &'static str,
    },
    /// The host closes a compose window
    Close { compose: usize },
}

impl HostAction {
    fn describe(&self) -> String {
        match self {
            HostAction::OpenReply { .. } => {
                "Host opens a reply window (quoted thread pre-filled)".to_string()
            }
            HostAction::OpenCompose { .. } => {
                "Host opens a compose window with a French reply header".to_string()
            }
            HostAction::TypeLine { compose, text } => {
                format!("User types in #{}: {:?}", compose + 1, text)
            }
            HostAction::Paste { compose, lines } => {
                format!("User pastes {} header lines into #{}", lines.len(), compose + 1)
            }
            HostAction::Quote { compose, text } => {
                format!("User quotes in #{}: {:?}", compose + 1, text)
            }
            HostAction::Close { compose } => format!("Host closes compose window #{}", compose + 1),
        }
    }
}

fn script() -> Vec<HostAction> {
    vec![
        HostAction::OpenReply {
            attribution: "On Mon, Mar 3, 2025 at 9:12 AM, Dana Ortiz <dana@example.com> wrote:",
            quoted: "Can you send the slides before Thursday?",
        },
        HostAction::TypeLine {
            compose: 0,
            text: "Hi Dana, slides attached.",
        },
        HostAction::Paste {
            compose: 0,
            lines: &[
                "From: Sam Lee <sam@example.com>",
                "Sent: Friday, February 28, 2025 4:40 PM",
                "Subject: Q1 slides",
            ],
        },
        HostAction::Quote {
            compose: 0,
            text: "Measure twice, cut once.",
        },
        HostAction::OpenCompose {
            lines: &[
                "Merci pour les chiffres.",
                "Le lun. 3 mars 2025 à 10:00, Camille Roux <camille@example.fr> a écrit :",
            ],
        },
        HostAction::Close { compose: 0 },
    ]
}

/// Host-side state: the document and the compose windows it opened
struct Host {
    document: SharedDocument,
    /// (window shell, editable root) per opened compose window
    windows: Vec<(NodeId, NodeId)>,
    read_view: NodeId,
}

impl Host {
    fn new() -> Self {
        let mut doc = Document::new();
        let body = doc.body();
        let read_view = doc.append_element(body, "div", &[("class", "message-view")]);
        let message = doc.append_element(read_view, "div", &[("class", "message")]);
        doc.append_text(message, "Thanks all, see the notes below.");
        let quote = doc.append_element(message, "blockquote", &[]);
        doc.append_text(quote, "On Sun, Mar 2, 2025 at 8:00 PM, Ana <ana@example.com> wrote:");

        Self {
            document: doc.into_shared(),
            windows: Vec::new(),
            read_view,
        }
    }

    fn open_window(doc: &mut Document) -> (NodeId, NodeId) {
        let body = doc.body();
        let shell = doc.append_element(body, "div", &[("class", "compose-window")]);
        let root = doc.append_element(
            shell,
            "div",
            &[("contenteditable", "true"), ("role", "textbox"), ("class", "Am Al editable")],
        );
        (shell, root)
    }

    fn root(&self, compose: usize) -> Option<NodeId> {
        self.windows.get(compose).map(|(_, root)| *root)
    }

    fn apply(&mut self, action: &HostAction) {
        let document = self.document.clone();
        let mut doc = lock_document(&document);

        match action {
            HostAction::OpenReply {
                attribution,
                quoted,
            } => {
                let (shell, root) = Self::open_window(&mut doc);
                doc.append_element(root, "br", &[]);
                let marker = doc.append_element(root, "div", &[("class", "gmail_quote")]);
                let header = doc.append_element(marker, "div", &[("class", "gmail_attr")]);
                doc.append_text(header, attribution);
                let quote = doc.append_element(marker, "blockquote", &[]);
                doc.append_text(quote, quoted);
                self.windows.push((shell, root));
            }
            HostAction::OpenCompose { lines } => {
                let (shell, root) = Self::open_window(&mut doc);
                for line in *lines {
                    let div = doc.append_element(root, "div", &[]);
                    doc.append_text(div, line);
                }
                self.windows.push((shell, root));
            }
            HostAction::TypeLine { compose, text } => {
                if let Some(root) = self.root(*compose) {
                    let div = doc.append_element(root, "div", &[]);
                    doc.append_text(div, text);
                }
            }
            HostAction::Paste { compose, lines } => {
                if let Some(root) = self.root(*compose) {
                    let wrapper = doc.append_element(root, "div", &[]);
                    for line in *lines {
                        let div = doc.append_element(wrapper, "div", &[]);
                        doc.append_text(div, line);
                    }
                }
            }
            HostAction::Quote { compose, text } => {
                if let Some(root) = self.root(*compose) {
                    let quote = doc.append_element(root, "blockquote", &[]);
                    doc.append_text(quote, text);
                }
            }
            HostAction::Close { compose } => {
                if let Some((shell, _)) = self.windows.get(*compose) {
                    doc.remove(*shell);
                }
            }
        }
    }
}

/// Narrates events and forwards them to the journal
struct Narrator {
    started: Instant,
    stats: Stats,
    journal: Option<Journal>,
}

impl Narrator {
    fn record(&mut self, event: SweepEvent) {
        let elapsed = self.started.elapsed().as_secs_f64();
        // No-op sweeps are the expected echo of a removal; keep them quiet
        let quiet = matches!(event, SweepEvent::SweepCompleted { removed: 0, .. });
        if !quiet {
            println!("      [+{:>5.2}s] {}", elapsed, event.describe());
        }
        self.stats.record(&event);

        if let Some(journal) = &self.journal {
            if let Err(e) = journal.write_event(&event) {
                tracing::error!("Failed to journal event: {:?}", e);
            }
        }
    }

    /// Narrate whatever arrives until `wait` has passed
    async fn settle(&mut self, events: &mut mpsc::UnboundedReceiver<SweepEvent>, wait: Duration) {
        let deadline = Instant::now() + wait;
        loop {
            tokio::select! {
                Some(event) = events.recv() => self.record(event),
                _ = sleep_until(deadline) => break,
            }
        }
    }
}

/// Run the scripted session
pub async fn run_demo(mut config: Config, session_id: &str, step_ms: u64) -> Result<()> {
    let step = Duration::from_millis(step_ms);

    // Scale the discovery timings to the script's pace
    config.discovery.initial_delay_ms = step_ms;
    config.discovery.poll_interval_ms = step_ms.saturating_mul(3);

    let journal = if config.journal.enabled {
        let journal = Journal::new(config.journal.dir.clone(), session_id.to_string())?;
        println!("  Journal: {}", journal.path().display());
        Some(journal)
    } else {
        None
    };

    let mut host = Host::new();
    let heuristics = Arc::new(HeuristicSet::from_config(&config.heuristics));
    let (tx, mut events) = mpsc::unbounded_channel();
    let discovery = DiscoveryLoop::new(host.document.clone(), heuristics, &config).with_events(tx);
    let discovery_task = tokio::spawn(discovery.serve());

    let mut narrator = Narrator {
        started: Instant::now(),
        stats: Stats::default(),
        journal,
    };

    for action in script() {
        println!("  ▸ {}", action.describe());
        host.apply(&action);
        // Long enough for the first discovery run and a poll tick to land
        narrator.settle(&mut events, step.saturating_mul(2)).await;
    }
    narrator.settle(&mut events, step.saturating_mul(4)).await;

    discovery_task.abort();

    let doc = lock_document(&host.document);
    let read_view_intact = doc
        .text_content(host.read_view)
        .contains("Ana <ana@example.com> wrote:");

    println!();
    println!("  Final document:");
    for (i, (shell, _)) in host.windows.iter().enumerate() {
        if doc.is_connected(*shell) {
            println!("    compose #{}: {}", i + 1, doc.outer_html(*shell));
        } else {
            println!("    compose #{}: (closed)", i + 1);
        }
    }
    println!("    read view: {}", doc.outer_html(host.read_view));
    println!();

    let Stats {
        roots_attached,
        roots_released,
        sweeps,
        noop_sweeps,
        nodes_removed,
    } = narrator.stats;
    println!(
        "  {} roots attached, {} released, {} nodes removed, {} sweeps ({} no-op)",
        roots_attached, roots_released, nodes_removed, sweeps, noop_sweeps
    );
    println!("  {} observers still registered", doc.observer_count());
    println!(
        "  Read view untouched: {}",
        if read_view_intact { "yes" } else { "NO" }
    );

    tracing::info!(
        roots_attached,
        nodes_removed,
        sweeps,
        "Demo finished"
    );
    Ok(())
}
