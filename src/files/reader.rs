//! File Reader
//!
//! Holds an uploaded file's bytes plus the metadata the browser reports for it,
//! and reads it back either as text or as a base64 data URL.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("file is not valid UTF-8 text: {0}")]
    NotText(#[from] std::str::Utf8Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileHandle {
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    #[serde(skip)]
    data: Bytes,
}

impl FileHandle {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<Bytes>,
        last_modified: DateTime<Utc>,
    ) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size: data.len() as u64,
            last_modified,
            data,
        }
    }

    /// Load a file from disk, guessing its MIME type from the extension
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ReadError> {
        let path = path.as_ref();
        let io_err = |source| ReadError::Io {
            path: path.display().to_string(),
            source,
        };

        let data = tokio::fs::read(path).await.map_err(io_err)?;
        let last_modified = tokio::fs::metadata(path)
            .await
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        let mime_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or(OCTET_STREAM)
            .to_string();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self::new(name, mime_type, data, last_modified))
    }

    /// Lowercased extension without the dot, if the name has one
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }

    pub fn read_text(&self) -> Result<&str, ReadError> {
        Ok(std::str::from_utf8(&self.data)?)
    }

    pub fn read_data_url(&self) -> String {
        let mime_type = if self.mime_type.is_empty() {
            OCTET_STREAM
        } else {
            self.mime_type.as_str()
        };
        format!("data:{};base64,{}", mime_type, BASE64.encode(&self.data))
    }
}
