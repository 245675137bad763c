//! File intake pipeline
//!
//! ```text
//! FileHandle ─► UploadStore (pending ─► processing)
//!                   │
//!                   ▼
//!              summarize()
//!                   │
//!        ┌──────────┴──────────┐
//!        ▼                     ▼
//!   processed              error
//!        │
//!        ▼
//!  ForwardingStation (staged for the next chat turn)
//! ```

use tracing::info;
use uuid::Uuid;

use crate::files::{summarize, FileHandle, SummaryOutcome};
use crate::store::{ForwardingStation, StagedFileSummary, UploadStore};

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub id: Uuid,
    pub outcome: SummaryOutcome,
}

/// Run one file through the store lifecycle and stage it when it processed cleanly
pub async fn ingest(uploads: &UploadStore, station: &ForwardingStation, file: FileHandle) -> IngestReport {
    // FileHandle clones share the underlying buffer
    let id = uploads.add_file(file.clone()).await;
    uploads.start_processing(id).await;
    let outcome = summarize(&file);

    let result = match &outcome.failure {
        None => Ok(outcome.payload.clone()),
        Some(reason) => Err(reason.clone()),
    };
    uploads.complete_processing(id, result).await;

    if let Some(entry) = uploads.get(id).await {
        if let Some(payload) = entry.content() {
            station
                .add_processed_file(StagedFileSummary::from_upload(&entry, payload))
                .await;
        }
    }

    info!(
        file_id = %id,
        degraded = outcome.is_degraded(),
        summary = %outcome.payload.summary(),
        "File ingested"
    );
    IngestReport { id, outcome }
}

/// Drop a file from both stores. Returns false if the upload was unknown.
pub async fn discard(uploads: &UploadStore, station: &ForwardingStation, id: Uuid) -> bool {
    let removed = uploads.remove_file(id).await.is_some();
    station.remove_processed_file(id).await;
    removed
}
