//! Extract command implementation.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::output::{Formatter, RunSummary, get_formatter};
use crate::models::{Config, ExtractedTable, OutputFormat, UploadedFile};
use crate::services::{
    AnalysisSession, BatchOrchestrator, CardState, CopyConfirmation, FileOutcome,
    collect_uploads, copy_to_clipboard, create_extractor, export_tables, tables_to_csv,
};

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Image or PDF files, or directories containing them
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Descend into subdirectories
    #[arg(long, short = 'r')]
    pub recursive: bool,

    /// Write one CSV per extracted table into this directory
    #[arg(long, short = 'e', value_name = "DIR")]
    pub export: Option<PathBuf>,

    /// Copy the extracted tables to the clipboard as CSV
    #[arg(long, short = 'c')]
    pub copy: bool,

    /// Print CSV instead of cards (same as --format csv)
    #[arg(long)]
    pub csv: bool,

    /// Call the Gemini API directly instead of going through the bridge
    #[arg(long)]
    pub direct: bool,

    /// Bridge endpoint to post documents to
    #[arg(long, env = "CFEX_BRIDGE_URL")]
    pub bridge_url: Option<String>,

    /// Maximum files analyzed at once (0 = unlimited)
    #[arg(long)]
    pub max_concurrency: Option<usize>,
}

pub async fn handle_extract(args: ExtractArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(url) = args.bridge_url.clone() {
        config.bridge.url = url;
    }
    let format = if args.csv { OutputFormat::Csv } else { format };
    let formatter = get_formatter(format);

    let uploads =
        collect_uploads(&args.paths, args.recursive).context("failed to collect input files")?;
    for file in uploads.iter().filter(|f| !f.is_accepted_type()) {
        tracing::warn!(file = %file.name(), mime_type = %file.mime_type(), "unsupported media type");
        eprintln!(
            "{} {} ({}) is not a JPEG, PNG or PDF; the model may reject it",
            style("Warning:").yellow(),
            file.name(),
            file.mime_type()
        );
    }

    let mut session = AnalysisSession::new();
    session.select_files(uploads);

    let extractor = create_extractor(&config, args.direct)?;
    if verbose {
        eprintln!("Using {}", extractor.describe());
    }
    let orchestrator = BatchOrchestrator::new(extractor)
        .with_max_concurrency(args.max_concurrency.unwrap_or(config.batch.max_concurrency));

    let pb = ProgressBar::new(session.files().len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("invalid progress template")?
            .progress_chars("#>-"),
    );
    let summary = run_analysis(&mut session, &orchestrator, &pb, verbose).await?;
    pb.finish_and_clear();

    print!("{}", render_run(&session, &summary, format));
    if format == OutputFormat::Csv {
        report_failures(&session, formatter.as_ref());
    }

    if let Some(ref dir) = args.export {
        let paths = export_run(&session, dir)?;
        for path in &paths {
            eprint!(
                "{}",
                formatter.format_message(&format!("Exported {}", path.display()))
            );
        }
    }

    if args.copy {
        let csv = clipboard_text(&session);
        if csv.is_empty() {
            eprint!("{}", formatter.format_message("Nothing to copy"));
        } else {
            let clipboard = copy_to_clipboard(&csv)?;
            show_copy_confirmation().await;
            drop(clipboard);
        }
    }

    ensure_extracted(&summary)
}

/// Analyze the session's working set and publish the run into the session.
async fn run_analysis(
    session: &mut AnalysisSession,
    orchestrator: &BatchOrchestrator,
    pb: &ProgressBar,
    verbose: bool,
) -> Result<RunSummary> {
    let snapshot = session.start_analysis()?;

    let start = Instant::now();
    let result = orchestrator
        .analyze_with(&snapshot, |file, outcome| {
            if verbose {
                pb.println(describe_outcome(file, outcome));
            }
            pb.set_message(file.name().to_string());
            pb.inc(1);
        })
        .await;

    let summary = RunSummary {
        files: snapshot.len(),
        succeeded: result.succeeded(),
        failed: result.failed(),
        duration_ms: start.elapsed().as_millis() as u64,
    };
    session.finish_analysis(result)?;
    Ok(summary)
}

/// Stdout for a finished run: the cards, plus the summary for human formats.
fn render_run(session: &AnalysisSession, summary: &RunSummary, format: OutputFormat) -> String {
    let formatter = get_formatter(format);
    let mut output = formatter.format_cards(&session.cards());
    if matches!(format, OutputFormat::Text | OutputFormat::Markdown) {
        output.push_str(&formatter.format_summary(summary));
    }
    output
}

fn run_tables(session: &AnalysisSession) -> impl Iterator<Item = &ExtractedTable> {
    session.result().tables().iter().map(|t| &t.table)
}

fn export_run(session: &AnalysisSession, dir: &Path) -> Result<Vec<PathBuf>> {
    export_tables(run_tables(session), dir)
        .with_context(|| format!("failed to export to {}", dir.display()))
}

fn clipboard_text(session: &AnalysisSession) -> String {
    tables_to_csv(run_tables(session))
}

fn ensure_extracted(summary: &RunSummary) -> Result<()> {
    if summary.succeeded == 0 {
        anyhow::bail!("no billing table extracted from {} file(s)", summary.files);
    }
    Ok(())
}

fn describe_outcome(file: &UploadedFile, outcome: &FileOutcome) -> String {
    match outcome {
        FileOutcome::Extracted(table) => format!(
            "{} {} ({} rows)",
            style("✓").green(),
            file.name(),
            table.len()
        ),
        FileOutcome::NotFound => format!("{} {} (no table)", style("✗").red(), file.name()),
        FileOutcome::Failed { message, .. } => {
            format!("{} {}: {}", style("✗").red(), file.name(), message)
        }
    }
}

fn report_failures(session: &AnalysisSession, formatter: &dyn Formatter) {
    for (file, state) in session.cards() {
        if let CardState::Failed(failure) = state {
            eprint!(
                "{}",
                formatter.format_error(&format!("{}: {}", file.name(), failure.message))
            );
        }
    }
}

async fn show_copy_confirmation() {
    let mut confirmation = CopyConfirmation::default();
    confirmation.mark_copied(Instant::now());

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(style("Copied!").green().to_string());
    while confirmation.is_copied(Instant::now()) {
        spinner.tick();
        tokio::time::sleep(Duration::from_millis(100).min(confirmation.remaining(Instant::now())))
            .await;
    }
    spinner.finish_and_clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractionError;
    use crate::models::{BillingRow, EncodedPayload};
    use crate::services::TableExtractor;
    use async_trait::async_trait;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use std::sync::Arc;

    /// Answers with one row named after the decoded content; "none" yields no table.
    struct EchoExtractor;

    #[async_trait]
    impl TableExtractor for EchoExtractor {
        async fn extract(
            &self,
            payload: &EncodedPayload,
        ) -> Result<Vec<BillingRow>, ExtractionError> {
            let content = String::from_utf8(STANDARD.decode(&payload.data).unwrap()).unwrap();
            if content == "none" {
                return Ok(Vec::new());
            }
            Ok(vec![BillingRow {
                period: content,
                demand: "1".to_string(),
                total_consumption: "2".to_string(),
                power_factor: "3".to_string(),
                load_factor: "4".to_string(),
                average_price: "5".to_string(),
            }])
        }

        fn describe(&self) -> String {
            "echo".to_string()
        }
    }

    fn upload(name: &str, content: &str) -> UploadedFile {
        UploadedFile::from_bytes(name, "image/png", content.as_bytes().to_vec())
    }

    async fn analyzed(files: Vec<UploadedFile>) -> (AnalysisSession, RunSummary) {
        let mut session = AnalysisSession::new();
        session.select_files(files);
        let orchestrator = BatchOrchestrator::new(Arc::new(EchoExtractor));
        let summary = run_analysis(&mut session, &orchestrator, &ProgressBar::hidden(), false)
            .await
            .unwrap();
        (session, summary)
    }

    #[tokio::test]
    async fn test_outputs_list_tables_by_file_name() {
        let (session, summary) =
            analyzed(vec![upload("z.png", "Z"), upload("a.png", "A")]).await;
        assert_eq!(summary.succeeded, 2);

        let text = render_run(&session, &summary, OutputFormat::Text);
        assert!(text.starts_with("== a.png =="));
        assert!(text.find("== a.png ==") < text.find("== z.png =="));
        assert!(text.contains("Processed 2 files"));

        let csv = render_run(&session, &summary, OutputFormat::Csv);
        let a = csv.find("\"A\"").unwrap();
        let z = csv.find("\"Z\"").unwrap();
        assert!(a < z);
        assert_eq!(clipboard_text(&session).trim_end(), csv.trim_end());

        let json: serde_json::Value =
            serde_json::from_str(&render_run(&session, &summary, OutputFormat::Json)).unwrap();
        assert_eq!(json["files"][0]["fileName"], "a.png");
        assert_eq!(json["files"][1]["fileName"], "z.png");
    }

    #[tokio::test]
    async fn test_failures_render_before_tables_and_skip_export() {
        let (session, summary) = analyzed(vec![
            upload("b.png", "B"),
            UploadedFile::from_path("/no/such/dir/lost.pdf"),
            upload("blank.png", "none"),
        ])
        .await;
        assert_eq!((summary.succeeded, summary.failed), (1, 2));

        let text = render_run(&session, &summary, OutputFormat::Text);
        assert!(text.starts_with("== lost.pdf =="));
        assert!(text.contains("The expected table was not found in this document."));
        assert!(text.find("== blank.png ==") < text.find("== b.png =="));

        let dir = tempfile::tempdir().unwrap();
        let paths = export_run(&session, dir.path()).unwrap();
        assert_eq!(paths, vec![dir.path().join("b.csv")]);
        assert!(ensure_extracted(&summary).is_ok());
    }

    #[tokio::test]
    async fn test_nothing_extracted_is_an_error() {
        let (session, summary) = analyzed(vec![upload("blank.png", "none")]).await;
        assert!(clipboard_text(&session).is_empty());
        let err = ensure_extracted(&summary).unwrap_err();
        assert!(err.to_string().contains("no billing table extracted"));
    }

    #[tokio::test]
    async fn test_empty_selection_is_rejected() {
        let mut session = AnalysisSession::new();
        let orchestrator = BatchOrchestrator::new(Arc::new(EchoExtractor));
        let err = run_analysis(&mut session, &orchestrator, &ProgressBar::hidden(), false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no files selected"));
    }
}
