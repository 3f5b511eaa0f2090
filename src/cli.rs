use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::settings::SETTINGS_FILE;

#[derive(Parser)]
#[command(name = "bq-utils")]
#[command(about = "Run BigQuery queries behind a dry-run cost check")]
#[command(version)]
pub struct Cli {
    /// Settings file path
    #[arg(long, global = true, default_value = SETTINGS_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a query, asking for confirmation when it would process more than the limit
    ///
    /// The limit is also passed to BigQuery as the maximum bytes billed.
    Safe {
        /// SQL file to run
        query_file: PathBuf,

        /// Byte limit, defaults to 104857600 (100 MiB)
        max_bytes: Option<u64>,
    },

    /// Run a query and save the results as CSV
    Run {
        /// SQL file to run
        query_file: PathBuf,

        /// Byte limit, defaults to 15000000000
        #[arg(short, long)]
        limit: Option<u64>,

        /// Output CSV path, defaults to <query-name>_<date>_<time>.csv
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of rows to preview
        #[arg(short, long, default_value_t = 10)]
        preview: usize,

        /// Only estimate the cost, do not execute
        #[arg(long)]
        dry_run: bool,

        /// Skip the column analysis after the preview
        #[arg(long)]
        no_analysis: bool,

        /// Ask for confirmation instead of running over-limit queries unattended
        #[arg(long)]
        confirm: bool,
    },

    /// Create a view from a SQL file
    CreateView {
        /// View name, created as project.dataset.name
        name: String,

        /// SQL file with the view query
        query_file: PathBuf,

        /// Dataset name, defaults to the settings value ("mcp")
        #[arg(long)]
        dataset: Option<String>,

        /// Project ID, defaults to the settings value
        #[arg(long)]
        project: Option<String>,

        /// View description
        #[arg(long)]
        description: Option<String>,

        /// Replace an existing view
        #[arg(long)]
        replace: bool,

        /// Print the statement and command without executing
        #[arg(long)]
        dry_run: bool,
    },

    /// Check that the required tools and directories are in place
    Doctor,
}
