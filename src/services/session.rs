//! Working set and per-run state of an analysis session.
//!
//! All mutation goes through the transition methods below. While a run is in
//! flight every submitted file is flagged as loading; outcomes collected with
//! [`AnalysisSession::complete_file`] stay hidden until the whole run settles
//! and are then published at once.

use std::collections::BTreeSet;

use crate::error::SessionError;
use crate::models::{ExtractedTable, FileId, UploadedFile};
use crate::services::batch::{BatchResult, FileFailure, FileOutcome};

/// What a result card shows for one file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CardState<'a> {
    /// Selected but not part of any finished run yet.
    Idle,
    Loading,
    Failed(&'a FileFailure),
    Table(&'a ExtractedTable),
}

#[derive(Debug, Default)]
pub struct AnalysisSession {
    files: Vec<UploadedFile>,
    loading: BTreeSet<FileId>,
    pending: BatchResult,
    result: BatchResult,
}

impl AnalysisSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append files to the working set; returns how many were added.
    pub fn select_files(&mut self, files: impl IntoIterator<Item = UploadedFile>) -> usize {
        let before = self.files.len();
        self.files.extend(files);
        self.files.len() - before
    }

    /// Remove exactly one entry by id. Not allowed while a run is in flight.
    pub fn remove_file(&mut self, id: FileId) -> Result<Option<UploadedFile>, SessionError> {
        if self.is_analyzing() {
            return Err(SessionError::AnalysisInProgress);
        }
        let removed = self
            .files
            .iter()
            .position(|f| f.id() == id)
            .map(|pos| self.files.remove(pos));
        Ok(removed)
    }

    /// Remove the first entry with this name.
    pub fn remove_file_named(&mut self, name: &str) -> Result<Option<UploadedFile>, SessionError> {
        let id = self.files.iter().find(|f| f.name() == name).map(UploadedFile::id);
        match id {
            Some(id) => self.remove_file(id),
            None => Ok(None),
        }
    }

    /// Drop the working set and every result.
    pub fn clear(&mut self) -> Result<(), SessionError> {
        if self.is_analyzing() {
            return Err(SessionError::AnalysisInProgress);
        }
        self.files.clear();
        self.reset_for_new_run();
        Ok(())
    }

    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    pub fn is_analyzing(&self) -> bool {
        !self.loading.is_empty()
    }

    pub fn is_loading(&self, id: FileId) -> bool {
        self.loading.contains(&id)
    }

    /// Whether the "analyze" action is available.
    pub fn can_analyze(&self) -> bool {
        !self.files.is_empty() && !self.is_analyzing()
    }

    /// Forget all results and loading flags.
    pub fn reset_for_new_run(&mut self) {
        self.loading.clear();
        self.pending = BatchResult::default();
        self.result = BatchResult::default();
    }

    /// Begin a run over the current working set.
    ///
    /// Prior results are discarded and every file is flagged loading. The
    /// returned snapshot is the run's file list.
    pub fn start_analysis(&mut self) -> Result<Vec<UploadedFile>, SessionError> {
        if self.is_analyzing() {
            return Err(SessionError::AnalysisInProgress);
        }
        if self.files.is_empty() {
            return Err(SessionError::EmptySelection);
        }

        self.reset_for_new_run();
        self.loading = self.files.iter().map(UploadedFile::id).collect();
        Ok(self.files.clone())
    }

    /// Record one file of the current run. Returns `true` once the run is
    /// complete and its results have been published.
    pub fn complete_file(
        &mut self,
        id: FileId,
        file_name: &str,
        outcome: FileOutcome,
    ) -> Result<bool, SessionError> {
        if !self.loading.contains(&id) {
            return Err(SessionError::NoAnalysisInProgress);
        }

        self.pending.record(id, file_name, outcome);
        if self.loading.iter().all(|id| self.pending.contains(*id)) {
            self.publish();
            return Ok(true);
        }
        Ok(false)
    }

    /// Publish a whole run at once.
    pub fn finish_analysis(&mut self, result: BatchResult) -> Result<(), SessionError> {
        if !self.is_analyzing() {
            return Err(SessionError::NoAnalysisInProgress);
        }
        self.pending = result;
        self.publish();
        Ok(())
    }

    fn publish(&mut self) {
        self.result = std::mem::take(&mut self.pending);
        self.loading.clear();
    }

    pub fn result(&self) -> &BatchResult {
        &self.result
    }

    pub fn card(&self, id: FileId) -> CardState<'_> {
        if self.loading.contains(&id) {
            CardState::Loading
        } else if let Some(failure) = self.result.error_for(id) {
            CardState::Failed(failure)
        } else if let Some(table) = self.result.table_for(id) {
            CardState::Table(table)
        } else {
            CardState::Idle
        }
    }

    /// One card per selected file.
    ///
    /// Idle, loading and error cards come first in selection order, then the
    /// table cards in the order of [`BatchResult::tables`] (by file name).
    pub fn cards(&self) -> Vec<(&UploadedFile, CardState<'_>)> {
        let mut cards: Vec<_> = self
            .files
            .iter()
            .map(|f| (f, self.card(f.id())))
            .filter(|(_, state)| !matches!(state, CardState::Table(_)))
            .collect();

        for entry in self.result.tables() {
            if let Some(file) = self.files.iter().find(|f| f.id() == entry.file_id) {
                cards.push((file, CardState::Table(&entry.table)));
            }
        }
        cards
    }
}
