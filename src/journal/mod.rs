// Journal module - writes sweep events to disk in JSON Lines format
//
// One JSON object per line, so a session can be inspected with standard tools:
//   jq 'select(.type == "NodeRemoved") | .heuristic' logs/replysweep-20251127-143022-a7b3.jsonl
//
// Each session gets its own file: replysweep-YYYYMMDD-HHMMSS-XXXX.jsonl

use crate::events::SweepEvent;
use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Appends sweep events to this session's journal file
pub struct Journal {
    dir: PathBuf,
    session_id: String,
}

impl Journal {
    /// Create the journal directory if needed
    pub fn new(dir: PathBuf, session_id: String) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create journal directory {}", dir.display()))?;

        Ok(Self { dir, session_id })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("replysweep-{}.jsonl", self.session_id))
    }

    /// Append a single event
    pub fn write_event(&self, event: &SweepEvent) -> Result<()> {
        let path = self.path();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open journal {}", path.display()))?;

        let json = serde_json::to_string(event).context("Failed to serialize event")?;
        writeln!(file, "{}", json).context("Failed to write to journal")?;

        // Visible on disk even if the process dies mid-session
        file.flush().context("Failed to flush journal")?;

        Ok(())
    }

    /// Write events as they arrive until every sender is gone
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<SweepEvent>) {
        tracing::info!("Journal started: {}", self.path().display());

        while let Some(event) = events.recv().await {
            if let Err(e) = self.write_event(&event) {
                tracing::error!("Failed to journal event: {:?}", e);
            }
        }

        tracing::debug!("Journal closed");
    }
}
