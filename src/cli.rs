//! CLI argument parsing for phasestats

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for comparison trees
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "phasestats")]
#[command(version)]
#[command(
    about = "Per-phase energy rollups and statistically sound cross-run comparisons",
    long_about = None
)]
pub struct Cli {
    /// SQLite database holding runs, measurements and phase stats
    #[arg(long = "db", value_name = "PATH", global = true, default_value = "phasestats.db")]
    pub db: PathBuf,

    /// TOML configuration file (carbon constants, significance level)
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Load machines, runs and raw measurements from a JSON dataset
    Import {
        /// Dataset file
        #[arg(value_name = "DATASET")]
        dataset: PathBuf,
    },

    /// Roll up the raw measurements of a completed run into phase stats
    Aggregate {
        /// Run ID
        #[arg(value_name = "RUN_ID")]
        run_id: String,
    },

    /// Compare the phase stats of several runs
    Compare {
        /// Run IDs (at least one)
        #[arg(value_name = "RUN_ID", required = true, num_args = 1..)]
        run_ids: Vec<String>,

        /// Compare anyway along this axis: repos, usage_scenarios,
        /// machine_ids, commit_hashes or branches
        #[arg(long = "force", value_name = "MODE")]
        force: Option<String>,
    },

    /// Statistics of a single run
    Stats {
        /// Run ID
        #[arg(value_name = "RUN_ID")]
        run_id: String,
    },
}
