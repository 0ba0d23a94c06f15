//! Command-line front end for `cfex`.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Extract billing tables from utility-bill images and PDFs.
#[derive(Debug, Parser)]
#[command(name = "cfex")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, markdown, or csv"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Analyze documents and print one result card per file
    Extract(commands::ExtractArgs),

    /// Run the HTTP bridge to the Gemini API
    Serve(commands::ServeArgs),

    /// Check bridge reachability and credential setup
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}

impl Commands {
    /// Default log level when `RUST_LOG` is unset.
    pub fn default_log_level(&self, verbose: bool) -> &'static str {
        match self {
            Commands::Serve(_) if verbose => "debug",
            Commands::Serve(_) => "info",
            _ if verbose => "debug",
            _ => "warn",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_extract() {
        let cli = Cli::try_parse_from([
            "cfex", "extract", "a.pdf", "b.png", "--export", "out", "--copy", "-f", "md",
        ])
        .unwrap();
        assert_eq!(cli.format, Some(OutputFormat::Markdown));
        match cli.command {
            Commands::Extract(args) => {
                assert_eq!(args.paths.len(), 2);
                assert!(args.copy);
                assert_eq!(args.export.as_deref(), Some(std::path::Path::new("out")));
                assert!(!args.direct);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_extract_requires_paths() {
        assert!(Cli::try_parse_from(["cfex", "extract"]).is_err());
    }

    #[test]
    fn test_default_log_level() {
        let serve = Cli::try_parse_from(["cfex", "serve"]).unwrap();
        assert_eq!(serve.command.default_log_level(false), "info");
        let status = Cli::try_parse_from(["cfex", "status"]).unwrap();
        assert_eq!(status.command.default_log_level(false), "warn");
        assert_eq!(status.command.default_log_level(true), "debug");
    }
}
