//! Discovery loop - finds compose roots and attaches one watcher to each
//!
//! # Architecture
//!
//! ```text
//!   initial delay ──┐
//!   body changes  ──┼──▶ run() ──▶ candidates ──▶ sweep ──▶ attach watcher
//!   poll interval ──┘              (selectors)      (once per root)
//! ```
//!
//! All triggers converge on `run()` inside the single `serve()` task, so runs
//! never overlap. The processed map owned by the loop is the only record of
//! which roots already have a watcher; nothing is written onto host nodes.
//! Entries whose root left the document are pruned at the start of each run.

use crate::config::Config;
use crate::dom::{lock_document, Document, NodeId, Selector, SharedDocument};
use crate::events::{self, EventSink, SweepEvent, SweepTrigger};
use crate::heuristics::HeuristicSet;
use crate::sweeper::{SweepReport, TreeSweeper};
use crate::watcher::{ChangeWatcher, WatcherHandle};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

/// Parse selector strings, skipping (and warning about) invalid ones
pub fn compile_selectors(sources: &[String]) -> Vec<Selector> {
    sources
        .iter()
        .filter_map(|source| match Selector::parse(source) {
            Ok(selector) => Some(selector),
            Err(e) => {
                tracing::warn!("Skipping invalid selector '{}': {}", source, e);
                None
            }
        })
        .collect()
}

/// Every connected element matching any selector, each reported once with
/// the first selector that found it
pub fn find_candidates<'s>(doc: &Document, selectors: &'s [Selector]) -> Vec<(NodeId, &'s str)> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for selector in selectors {
        for id in doc.query_selector_all(selector) {
            if seen.insert(id) {
                candidates.push((id, selector.as_str()));
            }
        }
    }
    candidates
}

pub struct DiscoveryLoop {
    document: SharedDocument,
    selectors: Vec<Selector>,
    sweeper: Arc<TreeSweeper>,
    watcher: ChangeWatcher,
    events: Option<EventSink>,
    /// Processed marks: root → its running watcher
    processed: HashMap<NodeId, WatcherHandle>,
    initial_delay: Duration,
    poll_interval: Duration,
}

impl DiscoveryLoop {
    pub fn new(document: SharedDocument, heuristics: Arc<HeuristicSet>, config: &Config) -> Self {
        let sweeper = Arc::new(TreeSweeper::new(heuristics));
        let watcher = ChangeWatcher::new(document.clone(), sweeper.clone(), &config.watcher);

        Self {
            document,
            selectors: compile_selectors(&config.discovery.selectors),
            sweeper,
            watcher,
            events: None,
            processed: HashMap::new(),
            initial_delay: config.discovery.initial_delay(),
            poll_interval: config.discovery.poll_interval(),
        }
    }

    /// Publish discovery and watcher events on `sink`
    pub fn with_events(mut self, sink: EventSink) -> Self {
        self.watcher = self.watcher.with_events(sink.clone());
        self.events = Some(sink);
        self
    }

    #[cfg(test)]
    pub fn is_processed(&self, root: NodeId) -> bool {
        self.processed.contains_key(&root)
    }

    #[cfg(test)]
    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    /// One discovery pass. Returns how many roots were newly attached.
    ///
    /// Roots already in the processed map are skipped, so any number of runs
    /// leaves at most one watcher per root. Must be called from within a tokio
    /// runtime.
    pub fn run(&mut self) -> usize {
        let swept: Vec<(NodeId, &str, SweepReport)> = {
            let document = self.document.clone();
            let mut doc = lock_document(&document);

            self.prune(&mut doc);

            let mut swept = Vec::new();
            for (root, selector) in find_candidates(&doc, &self.selectors) {
                // an earlier candidate's sweep may have removed this one
                if self.processed.contains_key(&root) || !doc.contains(root) {
                    continue;
                }
                let report = self.sweeper.sweep(&mut doc, root);
                swept.push((root, selector, report));
            }
            swept
        };

        let attached = swept.len();
        for (root, selector, report) in swept {
            let handle = self.watcher.attach(root);
            self.processed.insert(root, handle);

            tracing::info!(
                root = %root,
                selector,
                removed = report.removed_count(),
                "Attached to compose root"
            );
            events::publish(
                self.events.as_ref(),
                std::iter::once(SweepEvent::RootAttached {
                    timestamp: Utc::now(),
                    root,
                    selector: selector.to_string(),
                })
                .chain(SweepEvent::from_report(&report, SweepTrigger::Discovery, 0)),
            );
        }

        if attached > 0 {
            tracing::debug!(
                attached,
                processed = self.processed.len(),
                "Discovery run complete"
            );
        }
        attached
    }

    /// Drop marks (and watchers) whose root is no longer in the document
    fn prune(&mut self, doc: &mut Document) {
        let gone: Vec<NodeId> = self
            .processed
            .keys()
            .filter(|root| !doc.is_connected(**root))
            .copied()
            .collect();

        for root in gone {
            if let Some(handle) = self.processed.remove(&root) {
                handle.detach(doc);
            }
            tracing::info!(root = %root, "Compose root closed, releasing");
            events::publish(
                self.events.as_ref(),
                [SweepEvent::RootReleased {
                    timestamp: Utc::now(),
                    root,
                }],
            );
        }
    }

    /// Run until the document stops delivering change notifications.
    ///
    /// Triggers a run after the initial delay, on every batch of whole-document
    /// changes, and on each poll tick.
    pub async fn serve(mut self) {
        let (_observer, mut changes) = {
            let mut doc = lock_document(&self.document);
            let body = doc.body();
            doc.observe(body)
        };

        let initial = tokio::time::sleep(self.initial_delay);
        tokio::pin!(initial);
        let mut initial_done = false;

        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            selectors = self.selectors.len(),
            initial_delay_ms = self.initial_delay.as_millis() as u64,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Monitoring for compose roots"
        );

        loop {
            tokio::select! {
                _ = &mut initial, if !initial_done => {
                    initial_done = true;
                    self.run();
                }
                record = changes.recv() => {
                    if record.is_none() {
                        break;
                    }
                    while changes.try_recv().is_ok() {}
                    self.run();
                }
                _ = ticker.tick() => {
                    self.run();
                }
            }
        }

        tracing::debug!("Discovery loop stopped");
    }
}
