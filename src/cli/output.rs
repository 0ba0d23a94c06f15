use std::fmt::Write as FmtWrite;

use crate::models::{BILLING_COLUMNS, ExtractedTable, OutputFormat, UploadedFile};
use crate::services::{CardState, tables_to_csv, to_csv};

pub trait Formatter {
    fn format_cards(&self, cards: &[(&UploadedFile, CardState<'_>)]) -> String;
    fn format_table(&self, table: &ExtractedTable) -> String;
    fn format_summary(&self, summary: &RunSummary) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub files: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct StatusInfo {
    pub bridge_url: String,
    pub bridge_reachable: bool,
    pub bridge_model: Option<String>,
    pub bridge_credential: Option<bool>,
    pub model: String,
    pub api_key_env: String,
    pub api_key_configured: bool,
}

fn card_label(state: &CardState<'_>) -> &'static str {
    match state {
        CardState::Idle => "idle",
        CardState::Loading => "loading",
        CardState::Failed(_) => "error",
        CardState::Table(_) => "table",
    }
}

pub struct TextFormatter;

impl TextFormatter {
    fn column_widths(table: &ExtractedTable) -> [usize; 6] {
        let mut widths = BILLING_COLUMNS.map(|c| c.chars().count());
        for row in &table.rows {
            for (width, value) in widths.iter_mut().zip(row.values()) {
                *width = (*width).max(value.chars().count());
            }
        }
        widths
    }
}

impl Formatter for TextFormatter {
    fn format_cards(&self, cards: &[(&UploadedFile, CardState<'_>)]) -> String {
        if cards.is_empty() {
            return "No files selected.\n".to_string();
        }

        let mut output = String::new();
        for (file, state) in cards {
            writeln!(output, "== {} ==", file.name()).unwrap();
            match state {
                CardState::Idle => writeln!(output, "Not analyzed yet.").unwrap(),
                CardState::Loading => writeln!(output, "Analyzing...").unwrap(),
                CardState::Failed(failure) => {
                    writeln!(output, "Error: {}", failure.message).unwrap()
                }
                CardState::Table(table) => output.push_str(&self.format_table(table)),
            }
            writeln!(output).unwrap();
        }
        output
    }

    fn format_table(&self, table: &ExtractedTable) -> String {
        let widths = Self::column_widths(table);
        let render = |values: [&str; 6]| -> String {
            let cells: Vec<String> = values
                .iter()
                .zip(widths)
                .map(|(v, w)| format!("{:<w$}", v, w = w))
                .collect();
            cells.join(" | ").trim_end().to_string()
        };

        let mut output = String::new();
        writeln!(output, "{}", render(BILLING_COLUMNS)).unwrap();
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(output, "{}", rule.join("-+-")).unwrap();
        for row in &table.rows {
            writeln!(output, "{}", render(row.values())).unwrap();
        }
        output
    }

    fn format_summary(&self, summary: &RunSummary) -> String {
        format!(
            "Processed {} files in {}ms: {} succeeded, {} failed\n",
            summary.files, summary.duration_ms, summary.succeeded, summary.failed
        )
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();

        let bridge_status = if status.bridge_reachable {
            "[REACHABLE]"
        } else {
            "[UNREACHABLE]"
        };
        writeln!(output, "Bridge:        {}", bridge_status).unwrap();
        writeln!(output, "  URL:         {}", status.bridge_url).unwrap();
        if let Some(ref model) = status.bridge_model {
            writeln!(output, "  Model:       {}", model).unwrap();
        }
        if let Some(configured) = status.bridge_credential {
            let key = if configured { "configured" } else { "missing" };
            writeln!(output, "  API key:     {}", key).unwrap();
        }
        writeln!(output).unwrap();

        let key_status = if status.api_key_configured {
            "[CONFIGURED]"
        } else {
            "[MISSING]"
        };
        writeln!(output, "Direct mode:   {}", key_status).unwrap();
        writeln!(output, "  Model:       {}", status.model).unwrap();
        writeln!(output, "  Key env:     {}", status.api_key_env).unwrap();

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render(&self, value: &serde_json::Value) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| serde_json::json!({"error": e.to_string()}).to_string())
    }
}

impl Formatter for JsonFormatter {
    fn format_cards(&self, cards: &[(&UploadedFile, CardState<'_>)]) -> String {
        let items: Vec<serde_json::Value> = cards
            .iter()
            .map(|(file, state)| {
                let mut item = serde_json::json!({
                    "fileName": file.name(),
                    "mimeType": file.mime_type(),
                    "state": card_label(state),
                });
                match state {
                    CardState::Failed(failure) => {
                        item["error"] = serde_json::json!(failure.message);
                    }
                    CardState::Table(table) => {
                        item["data"] = serde_json::json!(table.rows);
                    }
                    CardState::Idle | CardState::Loading => {}
                }
                item
            })
            .collect();
        self.render(&serde_json::json!({ "files": items }))
    }

    fn format_table(&self, table: &ExtractedTable) -> String {
        self.render(&serde_json::json!(table))
    }

    fn format_summary(&self, summary: &RunSummary) -> String {
        self.render(&serde_json::json!({
            "files": summary.files,
            "succeeded": summary.succeeded,
            "failed": summary.failed,
            "duration_ms": summary.duration_ms,
        }))
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        self.render(&serde_json::json!({
            "bridge": {
                "url": status.bridge_url,
                "reachable": status.bridge_reachable,
                "model": status.bridge_model,
                "credential_configured": status.bridge_credential,
            },
            "direct": {
                "model": status.model,
                "api_key_env": status.api_key_env,
                "api_key_configured": status.api_key_configured,
            }
        }))
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub struct MarkdownFormatter;

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|")
}

impl Formatter for MarkdownFormatter {
    fn format_cards(&self, cards: &[(&UploadedFile, CardState<'_>)]) -> String {
        if cards.is_empty() {
            return "## No files selected\n".to_string();
        }

        let mut output = String::new();
        for (file, state) in cards {
            writeln!(output, "### {}\n", file.name()).unwrap();
            match state {
                CardState::Idle => writeln!(output, "*Not analyzed yet.*\n").unwrap(),
                CardState::Loading => writeln!(output, "*Analyzing...*\n").unwrap(),
                CardState::Failed(failure) => {
                    writeln!(output, "> ⚠️ **Error:** {}\n", failure.message).unwrap()
                }
                CardState::Table(table) => {
                    output.push_str(&self.format_table(table));
                    writeln!(output).unwrap();
                }
            }
        }
        output
    }

    fn format_table(&self, table: &ExtractedTable) -> String {
        let mut output = String::new();
        writeln!(output, "| {} |", BILLING_COLUMNS.join(" | ")).unwrap();
        writeln!(output, "|{}", "---|".repeat(BILLING_COLUMNS.len())).unwrap();
        for row in &table.rows {
            let cells: Vec<String> = row.values().iter().map(|v| escape_cell(v)).collect();
            writeln!(output, "| {} |", cells.join(" | ")).unwrap();
        }
        output
    }

    fn format_summary(&self, summary: &RunSummary) -> String {
        let mut output = String::new();
        writeln!(output, "## Summary\n").unwrap();
        writeln!(output, "| Metric | Value |").unwrap();
        writeln!(output, "|--------|-------|").unwrap();
        writeln!(output, "| Files | {} |", summary.files).unwrap();
        writeln!(output, "| Succeeded | {} |", summary.succeeded).unwrap();
        writeln!(output, "| Failed | {} |", summary.failed).unwrap();
        writeln!(output, "| Duration | {}ms |", summary.duration_ms).unwrap();
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "## Status\n").unwrap();

        let bridge_status = if status.bridge_reachable { "✅" } else { "❌" };
        writeln!(output, "### Bridge {}\n", bridge_status).unwrap();
        writeln!(output, "- **URL:** `{}`", status.bridge_url).unwrap();
        if let Some(ref model) = status.bridge_model {
            writeln!(output, "- **Model:** {}", model).unwrap();
        }
        if let Some(configured) = status.bridge_credential {
            writeln!(output, "- **API key configured:** {}", configured).unwrap();
        }
        writeln!(output).unwrap();

        let key_status = if status.api_key_configured { "✅" } else { "❌" };
        writeln!(output, "### Direct mode {}\n", key_status).unwrap();
        writeln!(output, "- **Model:** {}", status.model).unwrap();
        writeln!(output, "- **Key env:** `{}`", status.api_key_env).unwrap();

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {}\n", error)
    }
}

/// Plain CSV: successful tables only, separated by a blank line.
/// Failures are left to stderr.
pub struct CsvFormatter;

impl Formatter for CsvFormatter {
    fn format_cards(&self, cards: &[(&UploadedFile, CardState<'_>)]) -> String {
        let csv = tables_to_csv(cards.iter().filter_map(|(_, state)| match state {
            CardState::Table(table) => Some(*table),
            _ => None,
        }));
        if csv.is_empty() {
            return csv;
        }
        format!("{}\n", csv)
    }

    fn format_table(&self, table: &ExtractedTable) -> String {
        format!("{}\n", to_csv(&table.rows))
    }

    fn format_summary(&self, summary: &RunSummary) -> String {
        format!(
            "files,succeeded,failed,duration_ms\n{},{},{},{}\n",
            summary.files, summary.succeeded, summary.failed, summary.duration_ms
        )
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        TextFormatter.format_status(status)
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
        OutputFormat::Csv => Box::new(CsvFormatter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BillingRow;
    use crate::services::{FailureKind, FileFailure};

    fn sample_table() -> ExtractedTable {
        ExtractedTable::new(
            "recibo.pdf",
            vec![BillingRow {
                period: "ENE 24".to_string(),
                demand: "12".to_string(),
                total_consumption: "1,200".to_string(),
                power_factor: "0.95".to_string(),
                load_factor: "0.61".to_string(),
                average_price: "2.31|a".to_string(),
            }],
        )
    }

    fn failure() -> FileFailure {
        FileFailure {
            file_name: "roto.png".to_string(),
            kind: FailureKind::NotFound,
            message: "The expected table was not found in this document.".to_string(),
        }
    }

    #[test]
    fn test_text_cards() {
        let table = sample_table();
        let failure = failure();
        let ok = UploadedFile::from_bytes("recibo.pdf", "application/pdf", vec![1u8]);
        let bad = UploadedFile::from_bytes("roto.png", "image/png", vec![2u8]);
        let pending = UploadedFile::from_bytes("lento.jpg", "image/jpeg", vec![3u8]);
        let cards = vec![
            (&ok, CardState::Table(&table)),
            (&bad, CardState::Failed(&failure)),
            (&pending, CardState::Loading),
        ];

        let output = TextFormatter.format_cards(&cards);
        assert!(output.contains("== recibo.pdf =="));
        assert!(output.contains("Periodo"));
        assert!(output.contains("ENE 24"));
        assert!(output.contains("Error: The expected table was not found"));
        assert!(output.contains("Analyzing..."));
    }

    #[test]
    fn test_text_table_aligns_columns() {
        let output = TextFormatter.format_table(&sample_table());
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].find('|'), lines[2].find('|'));
    }

    #[test]
    fn test_json_cards() {
        let table = sample_table();
        let failure = failure();
        let ok = UploadedFile::from_bytes("recibo.pdf", "application/pdf", vec![1u8]);
        let bad = UploadedFile::from_bytes("roto.png", "image/png", vec![2u8]);
        let cards = vec![
            (&ok, CardState::Table(&table)),
            (&bad, CardState::Failed(&failure)),
        ];

        let output = JsonFormatter::new(false).format_cards(&cards);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["files"][0]["state"], "table");
        assert_eq!(value["files"][0]["data"][0]["Periodo"], "ENE 24");
        assert_eq!(value["files"][1]["state"], "error");
        assert_eq!(value["files"][1]["error"], failure.message);
    }

    #[test]
    fn test_markdown_table_escapes_pipes() {
        let output = MarkdownFormatter.format_table(&sample_table());
        assert!(output.starts_with("| Periodo | Demanda |"));
        assert!(output.contains("2.31\\|a"));
    }

    #[test]
    fn test_csv_cards_skip_failures() {
        let table = sample_table();
        let failure = failure();
        let ok = UploadedFile::from_bytes("recibo.pdf", "application/pdf", vec![1u8]);
        let bad = UploadedFile::from_bytes("roto.png", "image/png", vec![2u8]);
        let cards = vec![
            (&bad, CardState::Failed(&failure)),
            (&ok, CardState::Table(&table)),
        ];

        let output = CsvFormatter.format_cards(&cards);
        assert_eq!(output, format!("{}\n", to_csv(&table.rows)));
    }

    #[test]
    fn test_get_formatter_messages() {
        assert_eq!(get_formatter(OutputFormat::Text).format_message("hi"), "hi\n");
        assert_eq!(
            get_formatter(OutputFormat::Json).format_error("boom"),
            r#"{"error":"boom"}"#
        );
        assert_eq!(get_formatter(OutputFormat::Markdown).format_message("hi"), "> hi\n");
    }
}
