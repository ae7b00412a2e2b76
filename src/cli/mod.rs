//! CLI command parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Cassi - autonomous coding-agent orchestrator.
#[derive(Parser)]
#[command(name = "cassi")]
#[command(about = "Autonomous coding-agent orchestrator")]
#[command(version = &*crate::build_info::version_string().leak())]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Orchestrate a natural-language request in an isolated worktree.
    #[command(visible_alias = "r")]
    Run {
        /// The request to orchestrate.
        request: String,

        /// Step command to run inside the worktree (repeatable, in order).
        #[arg(short, long = "step")]
        steps: Vec<String>,

        /// Answer yes to all confirmation prompts.
        #[arg(short, long)]
        yes: bool,

        /// Repository directory (defaults to the current directory).
        #[arg(long)]
        repository: Option<PathBuf>,

        /// Answer prompts over the HTTP API instead of the terminal.
        #[arg(long)]
        remote: bool,
    },

    /// Start the HTTP API server over an empty prompt queue.
    Serve {
        /// Host to bind to.
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to.
        #[arg(short, long, default_value = "7070")]
        port: u16,
    },

    /// Manage configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the current configuration.
    Show,

    /// Show the configuration file path.
    Path,

    /// Generate a new API token for remote access.
    GenerateToken,
}
