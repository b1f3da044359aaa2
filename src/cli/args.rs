//! Command-line argument parsing for policyrag
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// policyrag - Query policy documents and stream summarized answers
#[derive(Parser, Debug)]
#[command(name = "policyrag")]
#[command(version)]
#[command(about = "Query policy documents and stream summarized answers", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress everything except results and errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Check both backends and list uploaded documents
    Status,

    /// List uploaded documents
    Docs,

    /// List topics known to the retrieval backend
    Topics,

    /// Upload a .txt document for indexing
    Upload {
        /// Path to the document
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Query the document index
    Query {
        /// Natural-language question
        #[arg(value_name = "TEXT")]
        text: String,

        /// Maximum number of passages to retrieve
        #[arg(short = 'n', long)]
        max_responses: Option<usize>,

        /// Stream a summarized answer after the results
        #[arg(short, long)]
        summarize: bool,
    },
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }
}

impl Verbosity {
    /// Default tracing filter when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "policyrag=info",
            Verbosity::VeryVerbose => "policyrag=debug",
        }
    }

    /// Check if should show progress spinners
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_with_summary() {
        let args = Args::parse_from([
            "policyrag",
            "query",
            "pandemic leave policy",
            "-n",
            "3",
            "--summarize",
        ]);

        assert_eq!(
            args.command,
            Commands::Query {
                text: "pandemic leave policy".to_string(),
                max_responses: Some(3),
                summarize: true,
            }
        );
        assert_eq!(args.verbosity(), Verbosity::Normal);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::parse_from(["policyrag", "docs", "-vv"]);
        assert_eq!(args.verbosity(), Verbosity::VeryVerbose);
        assert_eq!(args.verbosity().log_filter(), "policyrag=debug");
    }

    #[test]
    fn test_verbosity_quiet_wins() {
        let args = Args::parse_from(["policyrag", "-q", "-v", "topics"]);
        assert_eq!(args.verbosity(), Verbosity::Quiet);
        assert!(!args.verbosity().show_progress());
    }

    #[test]
    fn test_upload_path() {
        let args = Args::parse_from(["policyrag", "upload", "handbook.txt"]);
        assert_eq!(
            args.command,
            Commands::Upload {
                file: PathBuf::from("handbook.txt")
            }
        );
    }
}
