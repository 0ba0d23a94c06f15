//! CSV export and clipboard copy of extracted tables.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::ExportError;
use crate::models::{BILLING_COLUMNS, BillingRow, ExtractedTable};

/// How long a copy action reports "copied".
pub const COPY_CONFIRMATION: Duration = Duration::from_secs(2);

/// Serialize rows as CSV: bare header line, then one line of quoted values per row.
///
/// Embedded double quotes are doubled; lines are joined with `\n` and there is
/// no trailing newline. No rows yields an empty string.
pub fn to_csv(rows: &[BillingRow]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(BILLING_COLUMNS.join(","));
    for row in rows {
        let values: Vec<String> = row.values().iter().map(|v| quote(v)).collect();
        lines.push(values.join(","));
    }
    lines.join("\n")
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// The export file name: the last extension replaced by `.csv`.
pub fn csv_file_name(file_name: &str) -> String {
    let stem = match file_name.rfind('.') {
        Some(pos) if pos > 0 => &file_name[..pos],
        _ => file_name,
    };
    format!("{}.csv", stem)
}

/// Write the table as `<dir>/<csv_file_name>` and return the path.
pub fn export_csv(table: &ExtractedTable, dir: &Path) -> Result<PathBuf, ExportError> {
    export_csv_named(table, dir, &csv_file_name(&table.file_name))
}

fn export_csv_named(
    table: &ExtractedTable,
    dir: &Path,
    file_name: &str,
) -> Result<PathBuf, ExportError> {
    if table.is_empty() {
        return Err(ExportError::Empty);
    }

    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    std::fs::write(&path, to_csv(&table.rows))?;
    tracing::debug!(path = %path.display(), rows = table.len(), "exported csv");
    Ok(path)
}

/// Export every non-empty table into `dir`.
///
/// Tables whose export names collide get a numeric suffix (`recibo-2.csv`)
/// instead of overwriting each other.
pub fn export_tables<'a>(
    tables: impl IntoIterator<Item = &'a ExtractedTable>,
    dir: &Path,
) -> Result<Vec<PathBuf>, ExportError> {
    let mut used = HashSet::new();
    let mut written = Vec::new();

    for table in tables.into_iter().filter(|t| !t.is_empty()) {
        let base = csv_file_name(&table.file_name);
        let mut name = base.clone();
        let mut n = 2;
        while !used.insert(name.clone()) {
            let stem = base.trim_end_matches(".csv");
            name = format!("{}-{}.csv", stem, n);
            n += 1;
        }
        written.push(export_csv_named(table, dir, &name)?);
    }
    Ok(written)
}

/// Place `text` on the system clipboard.
///
/// On X11 and Wayland the content is served by this process, so keep the
/// returned handle alive for as long as it should stay pasteable.
pub fn copy_to_clipboard(text: &str) -> Result<arboard::Clipboard, ExportError> {
    let mut clipboard =
        arboard::Clipboard::new().map_err(|e| ExportError::Clipboard(e.to_string()))?;
    clipboard
        .set_text(text.to_string())
        .map_err(|e| ExportError::Clipboard(e.to_string()))?;
    tracing::debug!(chars = text.len(), "copied to clipboard");
    Ok(clipboard)
}

/// CSV of several tables, separated by a blank line.
pub fn tables_to_csv<'a>(tables: impl IntoIterator<Item = &'a ExtractedTable>) -> String {
    tables
        .into_iter()
        .filter(|t| !t.is_empty())
        .map(|t| to_csv(&t.rows))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Transient "copied" state of a card's copy action.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyConfirmation {
    copied_at: Option<Instant>,
}

impl CopyConfirmation {
    pub fn mark_copied(&mut self, now: Instant) {
        self.copied_at = Some(now);
    }

    pub fn is_copied(&self, now: Instant) -> bool {
        self.copied_at
            .is_some_and(|at| now.saturating_duration_since(at) < COPY_CONFIRMATION)
    }

    /// Time left before the confirmation lapses.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.copied_at
            .map(|at| COPY_CONFIRMATION.saturating_sub(now.saturating_duration_since(at)))
            .unwrap_or_default()
    }
}
