// Events that flow from the watchers and the discovery loop to the sinks
//
// Every decision the cleaner makes (a root attached, a node removed, a sweep
// finished, a root released) becomes one SweepEvent. The CLI prints them, the
// demo narrates them and the journal writes them to disk as JSON Lines.

use crate::dom::NodeId;
use crate::sweeper::{SweepReport, SweepStrategy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Sender half handed to watchers and the discovery loop
pub type EventSink = mpsc::UnboundedSender<SweepEvent>;

/// What caused a sweep to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepTrigger {
    /// First pass when discovery found the root
    Discovery,
    /// A batch of change notifications under the root
    Mutation,
    /// One-shot run from the CLI
    Manual,
}

/// Main event type that flows through the application
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")] // Creates JSON like {"type": "NodeRemoved", ...}
pub enum SweepEvent {
    /// Discovery found a new compose root and attached a watcher
    RootAttached {
        timestamp: DateTime<Utc>,
        root: NodeId,
        selector: String,
    },

    /// A reply-chain node was removed
    NodeRemoved {
        timestamp: DateTime<Utc>,
        root: NodeId,
        node: NodeId,
        tag: String,
        strategy: SweepStrategy,
        heuristic: String,
        trigger: SweepTrigger,
    },

    /// A sweep finished (emitted for no-op sweeps too)
    SweepCompleted {
        timestamp: DateTime<Utc>,
        root: NodeId,
        removed: usize,
        examined: usize,
        trigger: SweepTrigger,
        /// Notification records folded into this sweep (0 outside the watcher)
        batch_size: usize,
    },

    /// A processed root left the document; its mark was pruned
    RootReleased {
        timestamp: DateTime<Utc>,
        root: NodeId,
    },
}

impl SweepEvent {
    /// Expand a sweep report into one event per removal plus a summary
    pub fn from_report(
        report: &SweepReport,
        trigger: SweepTrigger,
        batch_size: usize,
    ) -> Vec<Self> {
        let timestamp = Utc::now();
        let mut events: Vec<Self> = report
            .removals
            .iter()
            .map(|removal| SweepEvent::NodeRemoved {
                timestamp,
                root: report.root,
                node: removal.node,
                tag: removal.tag.clone(),
                strategy: removal.strategy,
                heuristic: removal.heuristic.clone(),
                trigger,
            })
            .collect();

        events.push(SweepEvent::SweepCompleted {
            timestamp,
            root: report.root,
            removed: report.removed_count(),
            examined: report.examined,
            trigger,
            batch_size,
        });
        events
    }

    /// One-line human description for terminal output
    pub fn describe(&self) -> String {
        match self {
            SweepEvent::RootAttached { root, selector, .. } => {
                format!("attached {} (matched {})", root, selector)
            }
            SweepEvent::NodeRemoved {
                root,
                node,
                tag,
                strategy,
                heuristic,
                ..
            } => format!(
                "removed <{}> {} under {} [{} / {}]",
                tag,
                node,
                root,
                strategy.as_str(),
                heuristic
            ),
            SweepEvent::SweepCompleted {
                root,
                removed,
                examined,
                trigger,
                batch_size,
                ..
            } => format!(
                "swept {} ({:?}, batch {}): {} removed, {} examined",
                root, trigger, batch_size, removed, examined
            ),
            SweepEvent::RootReleased { root, .. } => format!("released {}", root),
        }
    }
}

/// Send events, ignoring a closed sink
pub fn publish(sink: Option<&EventSink>, events: impl IntoIterator<Item = SweepEvent>) {
    let Some(sink) = sink else {
        return;
    };
    for event in events {
        // Receiver dropped means nobody is listening anymore
        if sink.send(event).is_err() {
            break;
        }
    }
}

/// Totals over a stream of events
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    pub roots_attached: usize,
    pub roots_released: usize,
    pub sweeps: usize,
    pub noop_sweeps: usize,
    pub nodes_removed: usize,
}

impl Stats {
    pub fn record(&mut self, event: &SweepEvent) {
        match event {
            SweepEvent::RootAttached { .. } => self.roots_attached += 1,
            SweepEvent::RootReleased { .. } => self.roots_released += 1,
            SweepEvent::NodeRemoved { .. } => self.nodes_removed += 1,
            SweepEvent::SweepCompleted { removed, .. } => {
                self.sweeps += 1;
                if *removed == 0 {
                    self.noop_sweeps += 1;
                }
            }
        }
    }
}
