//! File Summarizer
//!
//! Routes a file to a lightweight extractor based on its MIME type and
//! extension and produces a bounded [`SummaryPayload`]. Extraction never
//! fails outright: unreadable content turns into a stand-in payload that
//! describes the problem, and the outcome is flagged as degraded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::reader::FileHandle;

/// Maximum characters kept in a payload's `content`
pub const TEXT_CONTENT_LIMIT: usize = 10_000;
/// Maximum characters kept in a payload's `preview`
pub const PREVIEW_LIMIT: usize = 500;
/// Lines of a CSV shown in its preview
pub const CSV_PREVIEW_LINES: usize = 10;

pub const TRUNCATION_MARKER: &str = "\n...[truncated]";
pub const ELLIPSIS: &str = "...";
/// Summary line of every payload whose content could not be read
pub const READ_FAILURE_SUMMARY: &str = "Failed to read file content";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Text,
    Csv,
    Spreadsheet,
    Image,
    Pdf,
    Generic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SummaryPayload {
    Text {
        name: String,
        size: u64,
        characters: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        preview: Option<String>,
        summary: String,
    },
    Spreadsheet {
        name: String,
        size: u64,
        format: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rows: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        columns: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        preview: Option<String>,
        summary: String,
    },
    Image {
        name: String,
        size: u64,
        format: String,
        #[serde(rename = "lastModified")]
        last_modified: DateTime<Utc>,
        summary: String,
    },
    Pdf {
        name: String,
        size: u64,
        summary: String,
    },
    File {
        name: String,
        size: u64,
        #[serde(rename = "mimeType")]
        mime_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        preview: Option<String>,
        summary: String,
    },
}

impl SummaryPayload {
    pub fn name(&self) -> &str {
        match self {
            SummaryPayload::Text { name, .. }
            | SummaryPayload::Spreadsheet { name, .. }
            | SummaryPayload::Image { name, .. }
            | SummaryPayload::Pdf { name, .. }
            | SummaryPayload::File { name, .. } => name,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            SummaryPayload::Text { size, .. }
            | SummaryPayload::Spreadsheet { size, .. }
            | SummaryPayload::Image { size, .. }
            | SummaryPayload::Pdf { size, .. }
            | SummaryPayload::File { size, .. } => *size,
        }
    }

    pub fn summary(&self) -> &str {
        match self {
            SummaryPayload::Text { summary, .. }
            | SummaryPayload::Spreadsheet { summary, .. }
            | SummaryPayload::Image { summary, .. }
            | SummaryPayload::Pdf { summary, .. }
            | SummaryPayload::File { summary, .. } => summary,
        }
    }

    pub fn preview(&self) -> Option<&str> {
        match self {
            SummaryPayload::Text { preview, .. }
            | SummaryPayload::Spreadsheet { preview, .. }
            | SummaryPayload::File { preview, .. } => preview.as_deref(),
            SummaryPayload::Image { .. } | SummaryPayload::Pdf { .. } => None,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            SummaryPayload::Text { content, .. }
            | SummaryPayload::Spreadsheet { content, .. }
            | SummaryPayload::File { content, .. } => content.as_deref(),
            SummaryPayload::Image { .. } | SummaryPayload::Pdf { .. } => None,
        }
    }
}

/// Result of summarizing one file. `failure` is set when the payload is a
/// stand-in for content that could not be read.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryOutcome {
    pub payload: SummaryPayload,
    pub failure: Option<String>,
}

impl SummaryOutcome {
    fn ok(payload: SummaryPayload) -> Self {
        Self { payload, failure: None }
    }

    fn degraded(payload: SummaryPayload, failure: String) -> Self {
        Self {
            payload,
            failure: Some(failure),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.failure.is_some()
    }
}

pub fn classify(file: &FileHandle) -> FileKind {
    let parsed: Option<mime::Mime> = file.mime_type.parse().ok();
    let ext = file.extension();
    let ext = ext.as_deref();
    let mime_lower = file.mime_type.to_ascii_lowercase();

    let is_text_mime = parsed.as_ref().is_some_and(|m| m.type_() == mime::TEXT);
    if is_text_mime || matches!(ext, Some("txt") | Some("csv")) {
        let is_csv_mime = parsed
            .as_ref()
            .is_some_and(|m| m.type_() == mime::TEXT && m.subtype().as_str() == "csv");
        return if is_csv_mime || ext == Some("csv") {
            FileKind::Csv
        } else {
            FileKind::Text
        };
    }

    if mime_lower.contains("spreadsheet")
        || mime_lower.contains("excel")
        || matches!(ext, Some("xlsx") | Some("xls"))
    {
        return FileKind::Spreadsheet;
    }

    match parsed {
        Some(m) if m.type_() == mime::IMAGE => FileKind::Image,
        Some(m) if m.essence_str() == mime::APPLICATION_PDF.essence_str() => FileKind::Pdf,
        _ => FileKind::Generic,
    }
}

pub fn summarize(file: &FileHandle) -> SummaryOutcome {
    let kind = classify(file);
    debug!(file = %file.name, mime = %file.mime_type, kind = ?kind, "Summarizing file");

    let outcome = match kind {
        FileKind::Text => summarize_text(file),
        FileKind::Csv => summarize_csv(file),
        FileKind::Spreadsheet => summarize_spreadsheet(file),
        FileKind::Image => summarize_image(file),
        FileKind::Pdf => summarize_pdf(file),
        FileKind::Generic => summarize_generic(file),
    };

    if let Some(reason) = &outcome.failure {
        warn!(file = %file.name, kind = ?kind, reason = %reason, "File summarized with degraded content");
    }
    outcome
}

fn summarize_text(file: &FileHandle) -> SummaryOutcome {
    match file.read_text() {
        Ok(text) => {
            let characters = text.chars().count();
            SummaryOutcome::ok(SummaryPayload::Text {
                name: file.name.clone(),
                size: file.size,
                characters,
                content: Some(truncate_chars(text, TEXT_CONTENT_LIMIT, TRUNCATION_MARKER)),
                preview: Some(truncate_chars(text, PREVIEW_LIMIT, ELLIPSIS)),
                summary: format!("Text file with {} characters", characters),
            })
        }
        Err(e) => {
            let reason = e.to_string();
            SummaryOutcome::degraded(
                SummaryPayload::Text {
                    name: file.name.clone(),
                    size: file.size,
                    characters: 0,
                    content: None,
                    preview: Some(format!("Text could not be decoded: {}", reason)),
                    summary: READ_FAILURE_SUMMARY.to_string(),
                },
                reason,
            )
        }
    }
}

fn summarize_csv(file: &FileHandle) -> SummaryOutcome {
    match file.read_text() {
        Ok(text) => {
            let lines: Vec<&str> = text.lines().collect();
            let rows = lines.len();
            // Header split on bare commas; quoted fields are not recognised.
            let columns = lines.first().map(|h| h.split(',').count()).unwrap_or(0);
            let head = lines
                .iter()
                .take(CSV_PREVIEW_LINES)
                .copied()
                .collect::<Vec<_>>()
                .join("\n");

            SummaryOutcome::ok(SummaryPayload::Spreadsheet {
                name: file.name.clone(),
                size: file.size,
                format: "csv".to_string(),
                rows: Some(rows),
                columns: Some(columns),
                content: Some(truncate_chars(text, TEXT_CONTENT_LIMIT, TRUNCATION_MARKER)),
                preview: Some(truncate_chars(&head, PREVIEW_LIMIT, ELLIPSIS)),
                summary: format!("CSV file with {} rows, {} columns", rows, columns),
            })
        }
        Err(e) => {
            let reason = e.to_string();
            SummaryOutcome::degraded(
                SummaryPayload::Spreadsheet {
                    name: file.name.clone(),
                    size: file.size,
                    format: "csv".to_string(),
                    rows: None,
                    columns: None,
                    content: None,
                    preview: Some(format!("Failed to extract spreadsheet data: {}", reason)),
                    summary: READ_FAILURE_SUMMARY.to_string(),
                },
                reason,
            )
        }
    }
}

fn summarize_spreadsheet(file: &FileHandle) -> SummaryOutcome {
    // Workbook parsing is a stub: only metadata is reported
    SummaryOutcome::ok(SummaryPayload::Spreadsheet {
        name: file.name.clone(),
        size: file.size,
        format: file.extension().unwrap_or_else(|| "xlsx".to_string()),
        rows: None,
        columns: None,
        content: None,
        preview: Some("Excel data would be extracted here".to_string()),
        summary: "Excel spreadsheet processed".to_string(),
    })
}

fn summarize_image(file: &FileHandle) -> SummaryOutcome {
    let format = file
        .mime_type
        .split_once('/')
        .map(|(_, sub)| sub.to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| file.extension())
        .unwrap_or_default();

    SummaryOutcome::ok(SummaryPayload::Image {
        name: file.name.clone(),
        size: file.size,
        format,
        last_modified: file.last_modified,
        summary: "Image processed for visualization and analysis".to_string(),
    })
}

fn summarize_pdf(file: &FileHandle) -> SummaryOutcome {
    SummaryOutcome::ok(SummaryPayload::Pdf {
        name: file.name.clone(),
        size: file.size,
        summary: "PDF document processed - text extraction would happen here".to_string(),
    })
}

fn summarize_generic(file: &FileHandle) -> SummaryOutcome {
    match file.read_text() {
        Ok(text) => {
            let characters = text.chars().count();
            SummaryOutcome::ok(SummaryPayload::File {
                name: file.name.clone(),
                size: file.size,
                mime_type: file.mime_type.clone(),
                content: Some(truncate_chars(text, TEXT_CONTENT_LIMIT, TRUNCATION_MARKER)),
                preview: Some(truncate_chars(text, PREVIEW_LIMIT, ELLIPSIS)),
                summary: format!("File with {} characters", characters),
            })
        }
        Err(e) => {
            let reason = e.to_string();
            SummaryOutcome::degraded(
                SummaryPayload::File {
                    name: file.name.clone(),
                    size: file.size,
                    mime_type: file.mime_type.clone(),
                    content: None,
                    preview: Some(format!("Binary content ({} bytes) could not be read as text: {}", file.size, reason)),
                    summary: READ_FAILURE_SUMMARY.to_string(),
                },
                reason,
            )
        }
    }
}

/// Keep the first `limit` characters, appending `suffix` only when something was cut
pub fn truncate_chars(text: &str, limit: usize, suffix: &str) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => {
            let mut out = String::with_capacity(byte_idx + suffix.len());
            out.push_str(&text[..byte_idx]);
            out.push_str(suffix);
            out
        }
        None => text.to_string(),
    }
}
