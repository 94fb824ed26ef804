//! Change watcher - keeps one compose root clean as it is edited
//!
//! # Architecture
//!
//! ```text
//! Document::observe(root) ──records──▶ watch task ──▶ TreeSweeper::sweep(root)
//!        ▲                                                   │
//!        └──────────── removal records (self-trigger) ◀──────┘
//! ```
//!
//! The task wakes on the first queued record, optionally waits `debounce`, then
//! drains everything queued and runs one sweep for the whole batch. A sweep that
//! removes nodes notifies its own observer, which yields exactly one follow-up
//! batch; that sweep finds a clean subtree, removes nothing, and the loop idles.
//!
//! The task ends when the observer channel closes, which happens when the host
//! removes the root, or when the handle is detached.

use crate::config::WatcherConfig;
use crate::dom::{lock_document, Document, MutationRecord, NodeId, ObserverId, SharedDocument};
use crate::events::{self, EventSink, SweepEvent, SweepTrigger};
use crate::sweeper::TreeSweeper;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Attaches per-root watch tasks
#[derive(Clone)]
pub struct ChangeWatcher {
    document: SharedDocument,
    sweeper: Arc<TreeSweeper>,
    events: Option<EventSink>,
    debounce: Duration,
}

impl ChangeWatcher {
    pub fn new(
        document: SharedDocument,
        sweeper: Arc<TreeSweeper>,
        config: &WatcherConfig,
    ) -> Self {
        Self {
            document,
            sweeper,
            events: None,
            debounce: config.debounce(),
        }
    }

    /// Publish every sweep of every watched root on `sink`
    pub fn with_events(mut self, sink: EventSink) -> Self {
        self.events = Some(sink);
        self
    }

    /// Observe `root` and spawn its watch task.
    ///
    /// Takes the document lock; must be called from within a tokio runtime.
    /// Attaching to a removed root yields a task that ends immediately.
    pub fn attach(&self, root: NodeId) -> WatcherHandle {
        let (observer, rx) = lock_document(&self.document).observe(root);
        let task = tokio::spawn(watch_loop(
            root,
            rx,
            self.document.clone(),
            self.sweeper.clone(),
            self.events.clone(),
            self.debounce,
        ));
        tracing::debug!(root = %root, "Watcher attached");

        WatcherHandle {
            root,
            observer,
            task,
        }
    }
}

/// A running watch task
#[derive(Debug)]
pub struct WatcherHandle {
    root: NodeId,
    observer: ObserverId,
    task: JoinHandle<()>,
}

impl WatcherHandle {
    /// Stop the task; its observer is pruned on the next notification
    #[cfg(test)]
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Disconnect the observer and stop the task
    pub fn detach(self, doc: &mut Document) {
        doc.disconnect(self.observer);
        self.task.abort();
        tracing::debug!(root = %self.root, "Watcher detached");
    }

    /// Wait for the task to end on its own
    #[cfg(test)]
    pub async fn finished(self) {
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                tracing::error!(root = %self.root, "Watcher task failed: {:?}", e);
            }
        }
    }
}

async fn watch_loop(
    root: NodeId,
    mut rx: mpsc::UnboundedReceiver<MutationRecord>,
    document: SharedDocument,
    sweeper: Arc<TreeSweeper>,
    events: Option<EventSink>,
    debounce: Duration,
) {
    while let Some(first) = rx.recv().await {
        if !debounce.is_zero() {
            tokio::time::sleep(debounce).await;
        }

        let mut batch_size = 1;
        while rx.try_recv().is_ok() {
            batch_size += 1;
        }
        tracing::trace!(
            root = %root,
            target = %first.target,
            batch_size,
            "Change batch received"
        );

        let report = {
            let mut doc = lock_document(&document);
            if !doc.contains(root) {
                break;
            }
            sweeper.sweep(&mut doc, root)
        };

        if !report.is_clean() {
            tracing::info!(
                root = %root,
                removed = report.removed_count(),
                batch_size,
                "Cleaned edited root"
            );
        }
        events::publish(
            events.as_ref(),
            SweepEvent::from_report(&report, SweepTrigger::Mutation, batch_size),
        );
    }

    tracing::debug!(root = %root, "Watcher stopped");
}
