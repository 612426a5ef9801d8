//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

pub mod check;
pub mod completions;
pub mod merge;
pub mod status;
pub mod update;
pub mod utils;
pub mod watch;

/// Tether - keep a working branch in sync with its default branch.
#[derive(Debug, Parser)]
#[command(name = "tether", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Output as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging (overridden by `TETHER_LOG`).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Which branch to sync, and where. Flags override the config file.
#[derive(Debug, Args)]
pub struct TargetArgs {
    /// Config file [default: tether.toml]
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Server base URL.
    #[arg(long, global = true, value_name = "URL")]
    pub server: Option<String>,

    /// Repository owner.
    #[arg(long, global = true)]
    pub owner: Option<String>,

    /// Repository name.
    #[arg(long, global = true)]
    pub repo: Option<String>,

    /// The user branch to sync.
    #[arg(long, global = true)]
    pub branch: Option<String>,

    /// Access token [default: $TETHER_TOKEN or $GITEA_TOKEN]
    #[arg(long, global = true)]
    pub token: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show update and merge status of the user branch.
    #[command(alias = "st")]
    Status,

    /// Check whether the default branch has changes to pull in.
    CheckUpdate,

    /// Check whether the user branch can be merged into the default branch.
    CheckMerge,

    /// Merge the default branch into the user branch.
    Update,

    /// Merge the user branch into the default branch.
    Merge {
        /// Pull request description; prompted for when omitted.
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Poll the update status until interrupted.
    Watch {
        /// Polling interval in seconds [default: from config]
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}
