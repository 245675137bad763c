//! Forwarding Station
//!
//! Stages processed file summaries until the next chat turn picks them up.
//! Staging is a last-write-wins map keyed by file id that remembers
//! the order files were first staged in. Reading collapses
//! several staged files into one aggregate record; that aggregate keeps only
//! names, sizes and a summary line, so per-file content and previews are not
//! forwarded when more than one file is staged.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::files::SummaryPayload;
use crate::store::upload::UploadedFile;

pub const MULTI_FILE_ID: &str = "multi-file";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedFileSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl StagedFileSummary {
    pub fn from_upload(upload: &UploadedFile, payload: &SummaryPayload) -> Self {
        Self {
            id: upload.id.to_string(),
            name: upload.file.name.clone(),
            mime_type: upload.file.mime_type.clone(),
            size: upload.file.size,
            content: payload.content().map(str::to_string),
            preview: payload.preview().map(str::to_string),
            summary: Some(payload.summary().to_string()),
        }
    }

    fn aggregate(files: &[&StagedFileSummary]) -> Self {
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        Self {
            id: MULTI_FILE_ID.to_string(),
            name: format!("{} files", files.len()),
            mime_type: MULTI_FILE_ID.to_string(),
            size: files.iter().map(|f| f.size).sum(),
            content: None,
            preview: None,
            summary: Some(format!(
                "Collection of {} files: {}",
                files.len(),
                names.join(", ")
            )),
        }
    }
}

/// Staged record plus the sequence number of its first staging
#[derive(Debug)]
struct StagedEntry {
    seq: u64,
    file: StagedFileSummary,
}

#[derive(Debug, Default)]
struct Staging {
    files: HashMap<String, StagedEntry>,
    next_seq: u64,
}

impl Staging {
    /// Records in the order they were first staged
    fn ordered(&self) -> Vec<&StagedFileSummary> {
        let mut entries: Vec<&StagedEntry> = self.files.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| &e.file).collect()
    }
}

#[derive(Clone, Default)]
pub struct ForwardingStation {
    staged: Arc<RwLock<Staging>>,
}

impl ForwardingStation {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_processed_file(&self, file: StagedFileSummary) {
        debug!(file_id = %file.id, name = %file.name, "Staging file for chat");
        let mut staging = self.staged.write().await;
        // Re-staging an id replaces the record but keeps its position
        if let Some(entry) = staging.files.get_mut(&file.id) {
            entry.file = file;
            return;
        }
        let seq = staging.next_seq;
        staging.next_seq += 1;
        staging.files.insert(file.id.clone(), StagedEntry { seq, file });
    }

    pub async fn remove_processed_file(&self, id: Uuid) -> bool {
        self.staged.write().await.files.remove(&id.to_string()).is_some()
    }

    pub async fn clear_processed_files(&self) {
        self.staged.write().await.files.clear();
    }

    pub async fn len(&self) -> usize {
        self.staged.read().await.files.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// None when nothing is staged, the record itself for a single file,
    /// and a synthesized aggregate otherwise.
    pub async fn processed_data_for_chat(&self) -> Option<StagedFileSummary> {
        let staging = self.staged.read().await;
        let files = staging.ordered();
        match files.as_slice() {
            [] => None,
            [only] => Some((*only).clone()),
            _ => Some(StagedFileSummary::aggregate(&files)),
        }
    }
}
