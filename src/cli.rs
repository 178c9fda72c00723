// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::types::parse_duration;

/// Command-line arguments for `planrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "planrun",
    version,
    about = "Run a plan of dependent actions, stop when stuck, resume after fixing.",
    long_about = None,
    propagate_version = true
)]
pub struct CliArgs {
    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PLANRUN_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run a plan from the beginning.
    Run {
        /// Plan file (TOML).
        plan: PathBuf,

        /// Snapshot file to write. Default: `.planrun/<plan name>.state.json`.
        #[arg(long, value_name = "PATH")]
        state: Option<PathBuf>,

        #[command(flatten)]
        exec: ExecArgs,
    },

    /// Continue a previous run from its snapshot.
    Resume {
        /// Snapshot written by an earlier `run` or `resume`.
        snapshot: PathBuf,

        /// Plan file, if it moved since the snapshot was written.
        #[arg(long, value_name = "PATH")]
        plan: Option<PathBuf>,

        /// Put failed and blocked actions back to pending before resuming.
        #[arg(long)]
        retry_failed: bool,

        #[command(flatten)]
        exec: ExecArgs,
    },

    /// Print the dependency graph of a plan or a snapshot.
    Graph {
        /// Plan file, or a snapshot (the plan it names is loaded).
        file: PathBuf,

        /// Snapshot whose statuses colour the graph (when `file` is a plan).
        #[arg(long, value_name = "PATH")]
        state: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = GraphFormat::Dot)]
        format: GraphFormat,
    },

    /// Show each action's status in a snapshot.
    Status {
        snapshot: PathBuf,

        #[arg(long, value_name = "PATH")]
        plan: Option<PathBuf>,
    },

    /// Put a failed or blocked action back to pending.
    Reset {
        snapshot: PathBuf,

        /// Action to reset.
        action: String,

        /// Also reset every blocked action that depends on it.
        #[arg(long)]
        cascade: bool,

        /// Note stored in the snapshot's audit trail.
        #[arg(long)]
        note: Option<String>,

        #[arg(long, value_name = "PATH")]
        plan: Option<PathBuf>,
    },

    /// Record that an action was completed by hand.
    MarkDone {
        snapshot: PathBuf,

        action: String,

        #[arg(long)]
        note: Option<String>,

        #[arg(long, value_name = "PATH")]
        plan: Option<PathBuf>,
    },
}

/// Flags shared by `run` and `resume`. They override the plan's `[settings]`.
#[derive(Debug, Clone, Default, Args)]
pub struct ExecArgs {
    /// Print commands instead of running them.
    #[arg(long)]
    pub dry_run: bool,

    /// Dispatch each ready set concurrently.
    #[arg(long)]
    pub concurrent: bool,

    /// Shuffle each ready set before dispatching it.
    #[arg(long)]
    pub shuffle: bool,

    /// Seed for `--shuffle`.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Default per-action timeout, e.g. `30s` or `10m`.
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Store resolved variables in the snapshot.
    #[arg(long)]
    pub persist_variables: bool,

    /// Fix a variable's value (repeatable).
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// Never read from stdin: manual steps fail, set steps take their default.
    #[arg(long)]
    pub no_input: bool,
}

/// Parse `NAME=VALUE`.
pub fn parse_var(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got {s:?}")),
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    Dot,
    Json,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
