//! Uploaded files and their wire encoding.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Media types offered by the file picker. Others are accepted with a warning.
pub const ACCEPTED_MEDIA_TYPES: [&str; 3] = ["image/jpeg", "image/png", "application/pdf"];

pub const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

static NEXT_FILE_ID: AtomicU64 = AtomicU64::new(1);

/// Synthetic identity of a selected file.
///
/// Two selections with the same name stay distinct entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(u64);

impl FileId {
    pub fn next() -> Self {
        Self(NEXT_FILE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where the bytes of an uploaded file live.
#[derive(Debug, Clone)]
pub enum FileContent {
    /// Read lazily when the file is encoded.
    Path(PathBuf),
    Memory(Arc<[u8]>),
}

/// A file selected for analysis.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    id: FileId,
    name: String,
    mime_type: String,
    content: FileContent,
}

impl UploadedFile {
    /// Select a file on disk. The media type is guessed from the extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        let mime_type = guess_media_type(&path);
        Self {
            id: FileId::next(),
            name,
            mime_type,
            content: FileContent::Path(path),
        }
    }

    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            id: FileId::next(),
            name: name.into(),
            mime_type: mime_type.into(),
            content: FileContent::Memory(bytes.into()),
        }
    }

    /// Override the declared media type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn content(&self) -> &FileContent {
        &self.content
    }

    pub fn is_accepted_type(&self) -> bool {
        is_accepted_media_type(&self.mime_type)
    }
}

/// Base64 document plus its declared media type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedPayload {
    pub data: String,
    pub mime_type: String,
}

pub fn guess_media_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(FALLBACK_MEDIA_TYPE)
        .to_string()
}

pub fn is_accepted_media_type(mime_type: &str) -> bool {
    ACCEPTED_MEDIA_TYPES
        .iter()
        .any(|t| t.eq_ignore_ascii_case(mime_type))
}
