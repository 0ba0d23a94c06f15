//! Fan-out of a file batch over the extraction service.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;

use crate::error::{EncodeError, ExtractionError, FileError};
use crate::models::{BillingRow, ExtractedTable, FileId, UploadedFile};
use crate::services::encoder::encode;
use crate::services::extraction::TableExtractor;

pub const TABLE_NOT_FOUND_MESSAGE: &str =
    "The expected table was not found in this document.";
pub const PROCESSING_FAILED_PREFIX: &str = "Failed to process file.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Io,
    Extraction,
    InvalidResponse,
    NotFound,
}

/// How one file of a batch settled.
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Extracted(ExtractedTable),
    NotFound,
    Failed { kind: FailureKind, message: String },
}

impl FileOutcome {
    fn from_result(file_name: &str, result: Result<Vec<BillingRow>, FileError>) -> Self {
        match result {
            Ok(rows) if rows.is_empty() => FileOutcome::NotFound,
            Ok(rows) => FileOutcome::Extracted(ExtractedTable::new(file_name, rows)),
            Err(e) => {
                let kind = match &e {
                    FileError::Encode(EncodeError::Io { .. }) => FailureKind::Io,
                    FileError::Extraction(ExtractionError::InvalidResponseFormat(_)) => {
                        FailureKind::InvalidResponse
                    }
                    FileError::Extraction(_) => FailureKind::Extraction,
                };
                FileOutcome::Failed {
                    kind,
                    message: format!("{} {}", PROCESSING_FAILED_PREFIX, e),
                }
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FileOutcome::Extracted(_))
    }
}

/// A file that did not produce a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFailure {
    pub file_name: String,
    pub kind: FailureKind,
    pub message: String,
}

/// A file that produced a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableResult {
    pub file_id: FileId,
    pub table: ExtractedTable,
}

/// Outcome of one analysis run: every file lands in exactly one of the two collections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    tables: Vec<TableResult>,
    errors: BTreeMap<FileId, FileFailure>,
}

impl BatchResult {
    /// Record one file's outcome, replacing any earlier outcome for the same id.
    pub fn record(&mut self, file_id: FileId, file_name: &str, outcome: FileOutcome) {
        self.tables.retain(|t| t.file_id != file_id);
        self.errors.remove(&file_id);

        match outcome {
            FileOutcome::Extracted(table) => {
                // Byte order on name; ties fall back to selection order.
                let pos = self.tables.partition_point(|t| {
                    (t.table.file_name.as_str(), t.file_id) < (table.file_name.as_str(), file_id)
                });
                self.tables.insert(pos, TableResult { file_id, table });
            }
            FileOutcome::NotFound => {
                self.errors.insert(
                    file_id,
                    FileFailure {
                        file_name: file_name.to_string(),
                        kind: FailureKind::NotFound,
                        message: TABLE_NOT_FOUND_MESSAGE.to_string(),
                    },
                );
            }
            FileOutcome::Failed { kind, message } => {
                self.errors.insert(
                    file_id,
                    FileFailure {
                        file_name: file_name.to_string(),
                        kind,
                        message,
                    },
                );
            }
        }
    }

    /// Successful tables, ascending by file name.
    pub fn tables(&self) -> &[TableResult] {
        &self.tables
    }

    pub fn errors(&self) -> &BTreeMap<FileId, FileFailure> {
        &self.errors
    }

    pub fn table_for(&self, file_id: FileId) -> Option<&ExtractedTable> {
        self.tables
            .iter()
            .find(|t| t.file_id == file_id)
            .map(|t| &t.table)
    }

    pub fn error_for(&self, file_id: FileId) -> Option<&FileFailure> {
        self.errors.get(&file_id)
    }

    pub fn contains(&self, file_id: FileId) -> bool {
        self.errors.contains_key(&file_id) || self.tables.iter().any(|t| t.file_id == file_id)
    }

    /// Number of files with a recorded outcome.
    pub fn len(&self) -> usize {
        self.tables.len() + self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn succeeded(&self) -> usize {
        self.tables.len()
    }

    pub fn failed(&self) -> usize {
        self.errors.len()
    }
}

/// Encode, extract and classify a single file. Never fails: errors become outcomes.
pub async fn process_file(extractor: &dyn TableExtractor, file: &UploadedFile) -> FileOutcome {
    tracing::debug!(file = %file.name(), id = %file.id(), mime_type = %file.mime_type(), "processing file");

    let result = async {
        let payload = encode(file).await?;
        let rows = extractor.extract(&payload).await?;
        Ok::<_, FileError>(rows)
    }
    .await;

    let outcome = FileOutcome::from_result(file.name(), result);
    match &outcome {
        FileOutcome::Extracted(table) => {
            tracing::info!(file = %file.name(), rows = table.len(), "table extracted")
        }
        FileOutcome::NotFound => tracing::info!(file = %file.name(), "no billing table found"),
        FileOutcome::Failed { message, .. } => {
            tracing::warn!(file = %file.name(), error = %message, "file failed")
        }
    }
    outcome
}

/// Runs every file of a batch concurrently and collects isolated outcomes.
pub struct BatchOrchestrator {
    extractor: Arc<dyn TableExtractor>,
    max_concurrency: usize,
}

impl BatchOrchestrator {
    pub fn new(extractor: Arc<dyn TableExtractor>) -> Self {
        Self {
            extractor,
            max_concurrency: 0,
        }
    }

    /// Limit in-flight files; 0 means unlimited.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub async fn analyze(&self, files: &[UploadedFile]) -> BatchResult {
        self.analyze_with(files, |_, _| {}).await
    }

    /// Like [`analyze`](Self::analyze), calling `on_complete` as each file settles.
    pub async fn analyze_with<F>(&self, files: &[UploadedFile], on_complete: F) -> BatchResult
    where
        F: Fn(&UploadedFile, &FileOutcome),
    {
        let mut result = BatchResult::default();
        if files.is_empty() {
            return result;
        }

        tracing::info!(
            files = files.len(),
            extractor = %self.extractor.describe(),
            "starting analysis"
        );

        let semaphore = (self.max_concurrency > 0).then(|| Semaphore::new(self.max_concurrency));
        let on_complete = &on_complete;

        let tasks = files.iter().map(|file| {
            let semaphore = semaphore.as_ref();
            async move {
                let _permit = match semaphore {
                    Some(s) => s.acquire().await.ok(),
                    None => None,
                };
                let outcome = process_file(self.extractor.as_ref(), file).await;
                on_complete(file, &outcome);
                (file, outcome)
            }
        });

        for (file, outcome) in join_all(tasks).await {
            result.record(file.id(), file.name(), outcome);
        }

        tracing::info!(
            succeeded = result.succeeded(),
            failed = result.failed(),
            "analysis finished"
        );
        result
    }
}
