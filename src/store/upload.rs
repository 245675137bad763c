use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::files::{FileHandle, SummaryPayload};

/// Lifecycle of an upload. Terminal states carry their result, so a processed
/// file always has content and an errored file always has a message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FileState {
    Pending,
    Processing,
    Processed { content: SummaryPayload },
    Error { error: String },
}

impl FileState {
    pub fn label(&self) -> &'static str {
        match self {
            FileState::Pending => "pending",
            FileState::Processing => "processing",
            FileState::Processed { .. } => "processed",
            FileState::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub id: Uuid,
    pub file: FileHandle,
    #[serde(flatten)]
    pub state: FileState,
    pub added_at: DateTime<Utc>,
    #[serde(skip)]
    seq: u64,
}

impl UploadedFile {
    pub fn content(&self) -> Option<&SummaryPayload> {
        match &self.state {
            FileState::Processed { content } => Some(content),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            FileState::Error { error } => Some(error),
            _ => None,
        }
    }
}

/// Outcome handed to [`UploadStore::complete_processing`]
pub type ProcessingResult = Result<SummaryPayload, String>;

#[derive(Clone, Default)]
pub struct UploadStore {
    inner: Arc<RwLock<HashMap<Uuid, UploadedFile>>>,
    next_seq: Arc<AtomicU64>,
}

impl UploadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_file(&self, file: FileHandle) -> Uuid {
        let id = Uuid::new_v4();
        info!(file_id = %id, name = %file.name, size = file.size, "File added");
        let entry = UploadedFile {
            id,
            file,
            state: FileState::Pending,
            added_at: Utc::now(),
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        };
        self.inner.write().await.insert(id, entry);
        id
    }

    /// pending -> processing. Returns false (and changes nothing) from any other state.
    pub async fn start_processing(&self, id: Uuid) -> bool {
        let mut guard = self.inner.write().await;
        match guard.get_mut(&id) {
            Some(entry) if entry.state == FileState::Pending => {
                entry.state = FileState::Processing;
                debug!(file_id = %id, "Processing started");
                true
            }
            _ => false,
        }
    }

    /// processing -> processed | error. Returns false (and changes nothing) from any other state.
    pub async fn complete_processing(&self, id: Uuid, result: ProcessingResult) -> bool {
        let mut guard = self.inner.write().await;
        match guard.get_mut(&id) {
            Some(entry) if entry.state == FileState::Processing => {
                entry.state = match result {
                    Ok(content) => FileState::Processed { content },
                    Err(error) => FileState::Error { error },
                };
                info!(file_id = %id, status = entry.state.label(), "Processing completed");
                true
            }
            _ => false,
        }
    }

    pub async fn remove_file(&self, id: Uuid) -> Option<UploadedFile> {
        self.inner.write().await.remove(&id)
    }

    pub async fn get(&self, id: Uuid) -> Option<UploadedFile> {
        self.inner.read().await.get(&id).cloned()
    }

    /// All uploads, oldest first
    pub async fn list(&self) -> Vec<UploadedFile> {
        let mut files: Vec<UploadedFile> = self.inner.read().await.values().cloned().collect();
        files.sort_by_key(|f| f.seq);
        files
    }

    pub async fn pending_files(&self) -> Vec<UploadedFile> {
        self.list()
            .await
            .into_iter()
            .filter(|f| f.state == FileState::Pending)
            .collect()
    }

    pub async fn processed_content(&self, id: Uuid) -> Option<SummaryPayload> {
        self.inner.read().await.get(&id).and_then(|f| f.content().cloned())
    }
}
