//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stage records in cloud storage and bulk-load them into BigQuery
#[derive(Parser, Debug)]
#[command(name = "bqstage")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Job configuration file (YAML or JSON)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Configuration override, `key=value` (repeatable)
    #[arg(long = "set", global = true, value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,

    /// Output style
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputStyle,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check the output specification without writing anything
    Validate,

    /// Write records to staging, commit, and load them
    Run {
        /// Newline-delimited JSON input (stdin when omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Number of parallel tasks
        #[arg(long, default_value = "1")]
        tasks: usize,

        /// Attempts per task
        #[arg(long, default_value = "2")]
        max_attempts: u32,

        /// Job id (generated when omitted)
        #[arg(long)]
        job_id: Option<String>,

        /// Stage and commit files but skip the warehouse load
        #[arg(long)]
        no_load: bool,

        /// BigQuery REST endpoint
        #[arg(long)]
        bigquery_url: Option<String>,
    },

    /// Show the load job request for a job's staged files
    Describe {
        /// Job id the load job id is derived from
        #[arg(long)]
        job_id: String,
    },

    /// Re-run the warehouse load over files kept by a failed load
    Load {
        /// Job id the staged files were written under
        #[arg(long)]
        job_id: String,

        /// Load attempt, giving the load job a fresh id (overrides bq.load.attempt)
        #[arg(long)]
        attempt: Option<u32>,

        /// BigQuery REST endpoint
        #[arg(long)]
        bigquery_url: Option<String>,
    },

    /// List registered delegate output formats
    Formats,
}

/// Output style
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputStyle {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}
