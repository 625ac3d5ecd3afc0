//! CLI definitions for Stepwise.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Stepwise CLI.
#[derive(Parser)]
#[command(name = "stepwise")]
#[command(about = "Stateless step-execution engine for long inference-driven procedures")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (default: ./stepwise.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run a workflow, resuming from the persisted step pointer
    Run {
        /// Workflow file (text, one instruction per line, or TOML)
        #[arg(short, long)]
        workflow: PathBuf,

        /// Run identifier; a fresh one is generated when omitted
        #[arg(long)]
        run_id: Option<String>,

        /// System prompt sent with every step
        #[arg(long)]
        system: Option<String>,
    },

    /// Show the persisted state of a run
    Status {
        #[arg(long)]
        run_id: String,

        #[arg(short, long)]
        workflow: PathBuf,
    },

    /// Reset a run to its first step and delete its session log
    Reset {
        #[arg(long)]
        run_id: String,

        #[arg(short, long)]
        workflow: PathBuf,
    },

    /// Compact a stored session log offline
    Compact {
        #[arg(long)]
        run_id: String,

        /// Evict old events without writing a summary
        #[arg(long)]
        drop: bool,
    },

    /// Print the live context view of a run as JSON
    Inspect {
        #[arg(long)]
        run_id: String,
    },
}
