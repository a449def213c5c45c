// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Append-only structured event log (C1).
//!
//! The journal is distinct from the user-visible chat history (C2): it is a
//! diagnostic stream meant for post-hoc evaluation tooling, not for driving
//! conversation state. `write` never blocks the caller on file I/O — a
//! background task owns the file handle and failures are swallowed after
//! being logged, per §4.1: "Failures to write ... never propagated to the
//! engine."

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::error;

/// `ui.render` is a reserved, significant action tag: downstream evaluation
/// tooling scans the trace file for the *last* event carrying this tag.
pub const ACTION_UI_RENDER: &str = "ui.render";

/// One line of the journal / trace file (§3 JournalEvent, §6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEvent {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub payload: serde_json::Value,
}

impl JournalEvent {
    pub fn new(action: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            timestamp: Utc::now(),
            action: action.into(),
            payload,
        }
    }

    pub fn render(text: impl Into<String>) -> Self {
        Self::new(ACTION_UI_RENDER, serde_json::json!({ "text": text.into() }))
    }
}

/// Sink with a single hot-path operation, `write`, plus `close` to flush
/// (§4.1). Implementations must make `write` non-blocking.
pub trait Journal: Send + Sync {
    fn write(&self, event: JournalEvent);
}

/// File-backed journal. Every event is appended as one JSON line
/// (newline-terminated) — the "stable structured-text document stream with
/// explicit record separators" the spec calls for.
pub struct FileJournal {
    tx: mpsc::UnboundedSender<JournalEvent>,
    task: tokio::task::JoinHandle<()>,
}

impl FileJournal {
    /// Open (creating if necessary) the trace file at `path` and spawn the
    /// background writer task.
    pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        let mut file = tokio::fs::File::from_std(file);

        let (tx, mut rx) = mpsc::unbounded_channel::<JournalEvent>();
        let task = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            while let Some(event) = rx.recv().await {
                match serde_json::to_string(&event) {
                    Ok(mut line) => {
                        line.push('\n');
                        if let Err(e) = file.write_all(line.as_bytes()).await {
                            error!(error = %e, "journal write failed");
                        }
                    }
                    Err(e) => error!(error = %e, "journal event serialization failed"),
                }
            }
            use tokio::io::AsyncWriteExt as _;
            let _ = file.flush().await;
        });

        Ok(Self { tx, task })
    }

    /// Flush and shut down the background writer, waiting for every queued
    /// event to be durably appended.
    pub async fn close(self) {
        drop(self.tx);
        let _ = self.task.await;
    }
}

impl Journal for FileJournal {
    fn write(&self, event: JournalEvent) {
        // An unbounded channel never blocks the hot path; a send failure
        // means the background task already exited (e.g. after `close`),
        // which we treat the same as any other write failure: log, don't
        // propagate.
        if self.tx.send(event).is_err() {
            error!("journal writer task is no longer running; event dropped");
        }
    }
}

/// Journal that discards every event. Useful when no `trace-path` is
/// configured or for tests that don't care about diagnostics.
#[derive(Debug, Default)]
pub struct NullJournal;

impl Journal for NullJournal {
    fn write(&self, _event: JournalEvent) {}
}

/// Read every JournalEvent back out of a trace file written by
/// [`FileJournal`] (§6.3). One malformed line is skipped with a warning
/// rather than failing the whole read.
pub fn read_trace(path: &Path) -> std::io::Result<Vec<JournalEvent>> {
    let text = std::fs::read_to_string(path)?;
    let mut events = Vec::new();
    for (n, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<JournalEvent>(line) {
            Ok(event) => events.push(event),
            Err(e) => tracing::warn!(line = n, error = %e, "skipping malformed trace line"),
        }
    }
    Ok(events)
}

/// Find the *last* `ui.render` event, per §6.3 ("benchmark tooling reads the
/// last such event").
pub fn last_render_event(events: &[JournalEvent]) -> Option<&JournalEvent> {
    events.iter().rev().find(|e| e.action == ACTION_UI_RENDER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_close_flushes_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let journal = FileJournal::open(&path).unwrap();
        journal.write(JournalEvent::new("llm-chat", serde_json::json!({"n": 1})));
        journal.write(JournalEvent::render("final answer"));
        journal.close().await;

        let events = read_trace(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, "llm-chat");
    }

    #[tokio::test]
    async fn last_render_event_finds_most_recent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let journal = FileJournal::open(&path).unwrap();
        journal.write(JournalEvent::render("first"));
        journal.write(JournalEvent::new("tool-request", serde_json::json!({})));
        journal.write(JournalEvent::render("second"));
        journal.close().await;

        let events = read_trace(&path).unwrap();
        let last = last_render_event(&events).unwrap();
        assert_eq!(last.payload["text"], "second");
    }

    #[tokio::test]
    async fn null_journal_discards_silently() {
        let journal = NullJournal;
        journal.write(JournalEvent::new("anything", serde_json::json!(null)));
    }

    #[tokio::test]
    async fn malformed_line_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        std::fs::write(&path, "not json\n{\"timestamp\":\"2024-01-01T00:00:00Z\",\"action\":\"x\",\"payload\":null}\n").unwrap();
        let events = read_trace(&path).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, "x");
    }

    #[tokio::test]
    async fn append_is_atomic_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        {
            let journal = FileJournal::open(&path).unwrap();
            for i in 0..50 {
                journal.write(JournalEvent::new("n", serde_json::json!(i)));
            }
            journal.close().await;
        }
        let events = read_trace(&path).unwrap();
        assert_eq!(events.len(), 50);
        for (i, e) in events.iter().enumerate() {
            assert_eq!(e.payload, serde_json::json!(i));
        }
    }
}
