//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Taskscope CLI
///
/// Turn work documents into a catalog of repeatable, automatable tasks.
#[derive(Parser, Debug)]
#[command(name = "taskscope")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze documents and print the tasks found
    Analyze(AnalyzeArgs),

    /// Print the plain text extracted from a document
    Extract(ExtractArgs),

    /// Response cache management
    Cache(CacheCommand),

    /// Print the access token the server expects
    Token,

    /// Run diagnostics
    Doctor,

    /// Show version
    Version,
}

// ─────────────────────────────────────────────────────────────────────────────
// Analysis Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Documents to analyze (docx, pdf, xlsx, xls, txt, hwp)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Business domain label (repeatable)
    #[arg(short, long = "domain", required = true)]
    pub domains: Vec<String>,

    /// Workshop name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Number of people the documents describe
    #[arg(short, long)]
    pub participants: Option<u32>,

    /// Bypass the response cache for this run
    #[arg(long)]
    pub no_cache: bool,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Document to read
    pub file: PathBuf,

    /// Declared media type (detected from the extension when omitted)
    #[arg(long)]
    pub media_type: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct CacheCommand {
    #[command(subcommand)]
    pub action: CacheAction,
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show hit/miss statistics
    Stats {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Remove every cached response
    Clear {
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Remove cached responses for one domain set
    Invalidate {
        /// Domain labels the responses were produced for
        #[arg(required = true)]
        domains: Vec<String>,
    },

    /// Drop expired entries and old counters
    Purge,
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
    fn test_analyze_requires_domain() {
        assert!(Cli::try_parse_from(["taskscope", "analyze", "a.docx"]).is_err());

        let cli = Cli::try_parse_from([
            "taskscope", "analyze", "a.docx", "b.pdf", "-d", "Finance", "--domain", "HR",
        ])
        .unwrap();
        match cli.command {
            Commands::Analyze(args) => {
                assert_eq!(args.files.len(), 2);
                assert_eq!(args.domains, vec!["Finance", "HR"]);
                assert!(!args.json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cache_clear_flags() {
        let cli = Cli::try_parse_from(["taskscope", "cache", "clear", "--yes"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Cache(CacheCommand { action: CacheAction::Clear { yes: true } })
        ));
    }
}
