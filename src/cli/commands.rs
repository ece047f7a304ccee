use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "warden")]
#[command(author, version, about = "Lifecycle tracking and stall recovery for autonomous coding-agent tasks", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project root (default: walk up from the current directory)
    #[arg(long, global = true, env = "WARDEN_PROJECT")]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the warden state dir in the current project
    Init,

    /// List recovery batches over tasks parked in human review
    Batches,

    /// Apply a recovery batch to the given tasks
    Process {
        /// Batch type: json_error, incomplete, qa_rejected or errors
        batch_type: String,

        /// Task ids to remediate (default: every task in the batch)
        task_ids: Vec<String>,

        /// Reviewer feedback attached to each task's fix request
        #[arg(short, long)]
        feedback: Option<String>,
    },

    /// Recover a single stuck task
    Recover {
        /// Task id
        task_id: String,

        /// Also queue a restart instead of only refreshing activity
        #[arg(long)]
        restart: bool,
    },

    /// Run the crash-signal poller until interrupted
    Watch,

    /// Show the review-pending tasks and their classification
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the configuration file path
    Path,
}
