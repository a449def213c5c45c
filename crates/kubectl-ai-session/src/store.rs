// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::message::Message;
use crate::session::SessionMetadata;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown session {0}")]
    UnknownSession(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("metadata error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Summary entry returned by [`SessionStore::list_sessions`] (§6.2).
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: String,
    pub metadata: SessionMetadata,
}

/// Capability set shared by every store implementation (§4.2): `append`,
/// `replace`, `list-snapshot`, `clear`. The store is content-oblivious — it
/// never interprets message semantics.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, id: &str, metadata: SessionMetadata) -> Result<(), StoreError>;

    /// Atomic append of a single record (one write of a terminated line).
    async fn append(&self, session_id: &str, message: Message) -> Result<(), StoreError>;

    /// Truncate then rewrite the full history.
    async fn replace(&self, session_id: &str, messages: Vec<Message>) -> Result<(), StoreError>;

    /// A defensive snapshot — callers never observe the internal container.
    async fn list_snapshot(&self, session_id: &str) -> Result<Vec<Message>, StoreError>;

    async fn clear(&self, session_id: &str) -> Result<(), StoreError>;

    /// Persisted sessions, newest first (§6.2: IDs sortable, lexicographic
    /// reverse sort).
    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, StoreError>;
}

/// In-memory store: a multiple-reader/single-writer lock per session,
/// returning defensive copies on read (§4.2).
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, (SessionMetadata, Vec<Message>)>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(&self, id: &str, metadata: SessionMetadata) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(id.to_string(), (metadata, Vec::new()));
        Ok(())
    }

    async fn append(&self, session_id: &str, message: Message) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::UnknownSession(session_id.to_string()))?;
        entry.1.push(message);
        Ok(())
    }

    async fn replace(&self, session_id: &str, messages: Vec<Message>) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::UnknownSession(session_id.to_string()))?;
        entry.1 = messages;
        Ok(())
    }

    async fn list_snapshot(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .map(|(_, msgs)| msgs.clone())
            .ok_or_else(|| StoreError::UnknownSession(session_id.to_string()))
    }

    async fn clear(&self, session_id: &str) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::UnknownSession(session_id.to_string()))?;
        entry.1.clear();
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, StoreError> {
        let sessions = self.sessions.read().await;
        let mut out: Vec<SessionSummary> = sessions
            .iter()
            .map(|(id, (meta, _))| SessionSummary {
                id: id.clone(),
                metadata: meta.clone(),
            })
            .collect();
        out.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(out)
    }
}

/// Generate the next sortable session ID under `{HOME}/.kubectl-ai/sessions`
/// (§6.2): `<date>-<NNNN>`, e.g. `2026-07-26-0001`. Sequential within a day
/// so lexicographic order matches chronological order.
pub fn next_session_id(sessions_dir: &Path, counter: &AtomicU32) -> String {
    let date = Utc::now().format("%Y-%m-%d").to_string();
    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
    let _ = sessions_dir; // directory existence is ensured by the caller
    format!("{date}-{n:04}")
}

/// Filesystem-backed store: `{root}/<id>/metadata.yaml` + `.../history.jsonl`
/// (one Message per line), per §4.2 and §6.2.
pub struct FilesystemSessionStore {
    root: PathBuf,
    counter: AtomicU32,
}

impl FilesystemSessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            counter: AtomicU32::new(0),
        }
    }

    pub fn default_root() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".kubectl-ai")
            .join("sessions")
    }

    pub fn allocate_id(&self) -> String {
        next_session_id(&self.root, &self.counter)
    }

    fn session_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    fn metadata_path(&self, id: &str) -> PathBuf {
        self.session_dir(id).join("metadata.yaml")
    }

    fn history_path(&self, id: &str) -> PathBuf {
        self.session_dir(id).join("history.jsonl")
    }
}

#[async_trait]
impl SessionStore for FilesystemSessionStore {
    async fn create_session(&self, id: &str, metadata: SessionMetadata) -> Result<(), StoreError> {
        let dir = self.session_dir(id);
        tokio::fs::create_dir_all(&dir).await?;
        let yaml = serde_yaml::to_string(&metadata)?;
        tokio::fs::write(self.metadata_path(id), yaml).await?;
        if !tokio::fs::try_exists(self.history_path(id)).await? {
            tokio::fs::write(self.history_path(id), b"").await?;
        }
        Ok(())
    }

    async fn append(&self, session_id: &str, message: Message) -> Result<(), StoreError> {
        use tokio::io::AsyncWriteExt;
        let mut line = serde_json::to_string(&message)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.history_path(session_id))
            .await?;
        file.write_all(line.as_bytes()).await?;
        self.touch_metadata(session_id).await?;
        Ok(())
    }

    async fn replace(&self, session_id: &str, messages: Vec<Message>) -> Result<(), StoreError> {
        let mut body = String::new();
        for m in &messages {
            body.push_str(&serde_json::to_string(m)?);
            body.push('\n');
        }
        tokio::fs::write(self.history_path(session_id), body).await?;
        self.touch_metadata(session_id).await?;
        Ok(())
    }

    async fn list_snapshot(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
        let path = self.history_path(session_id);
        if !tokio::fs::try_exists(&path).await? {
            return Err(StoreError::UnknownSession(session_id.to_string()));
        }
        let text = tokio::fs::read_to_string(&path).await?;
        let mut messages = Vec::new();
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            messages.push(serde_json::from_str(line)?);
        }
        Ok(messages)
    }

    async fn clear(&self, session_id: &str) -> Result<(), StoreError> {
        tokio::fs::write(self.history_path(session_id), b"").await?;
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, StoreError> {
        if !tokio::fs::try_exists(&self.root).await? {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                ids.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        ids.sort();
        ids.reverse(); // newest-first: lexicographic reverse sort (§6.2)

        let mut summaries = Vec::with_capacity(ids.len());
        for id in ids {
            let yaml = tokio::fs::read_to_string(self.metadata_path(&id)).await?;
            let metadata: SessionMetadata = serde_yaml::from_str(&yaml)?;
            summaries.push(SessionSummary { id, metadata });
        }
        Ok(summaries)
    }
}

impl FilesystemSessionStore {
    async fn touch_metadata(&self, session_id: &str) -> Result<(), StoreError> {
        let path = self.metadata_path(session_id);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(());
        }
        let yaml = tokio::fs::read_to_string(&path).await?;
        let mut metadata: SessionMetadata = serde_yaml::from_str(&yaml)?;
        metadata.last_accessed = Utc::now();
        tokio::fs::write(&path, serde_yaml::to_string(&metadata)?).await?;
        Ok(())
    }
}
