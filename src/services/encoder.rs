//! Encodes uploaded files for transport.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use walkdir::WalkDir;

use crate::error::EncodeError;
use crate::models::{
    EncodedPayload, FileContent, UploadedFile, guess_media_type, is_accepted_media_type,
};

/// Read the whole file and encode it as base64, keeping the declared media type.
pub async fn encode(file: &UploadedFile) -> Result<EncodedPayload, EncodeError> {
    let data = match file.content() {
        FileContent::Path(path) => {
            let bytes = tokio::fs::read(path).await.map_err(|source| EncodeError::Io {
                name: file.name().to_string(),
                source,
            })?;
            STANDARD.encode(bytes)
        }
        FileContent::Memory(bytes) => STANDARD.encode(bytes),
    };

    Ok(EncodedPayload {
        data,
        mime_type: file.mime_type().to_string(),
    })
}

/// Expand CLI arguments into selectable files.
///
/// Plain files are kept as given regardless of type, even when they cannot be
/// stat'ed: the read then fails inside the batch as that file's error.
/// Directories contribute only files whose guessed media type is accepted,
/// sorted by path. Only a failing directory scan is an error here.
pub fn collect_uploads(paths: &[PathBuf], recursive: bool) -> std::io::Result<Vec<UploadedFile>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut found = scan_directory(path, recursive)?;
            found.sort();
            files.extend(found.into_iter().map(UploadedFile::from_path));
        } else {
            files.push(UploadedFile::from_path(path.clone()));
        }
    }

    Ok(files)
}

fn scan_directory(dir: &Path, recursive: bool) -> std::io::Result<Vec<PathBuf>> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut found = Vec::new();

    for entry in WalkDir::new(dir).max_depth(max_depth).follow_links(false) {
        let entry = entry.map_err(std::io::Error::other)?;
        let path = entry.path();
        if path.is_file() && is_accepted_media_type(&guess_media_type(path)) {
            found.push(path.to_path_buf());
        }
    }

    Ok(found)
}
