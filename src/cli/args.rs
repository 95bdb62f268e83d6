//! CLI argument definitions using clap
//!
//! Commands:
//! - caspub init --config <path>
//! - caspub transaction <repo[/path]> --config <path>
//! - caspub tag <repo> --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// caspub - transaction and tag coordination for content-addressed repositories
#[derive(Parser, Debug)]
#[command(name = "caspub")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize the data directory for a repository
    Init {
        /// Path to the repository settings file
        #[arg(long, default_value = "./caspub.json")]
        config: PathBuf,
    },

    /// Open a writer transaction on a repository
    Transaction {
        /// Repository name, optionally with a lease path: repo[/path]
        repository: String,

        /// Path to the repository settings file
        #[arg(long, default_value = "./caspub.json")]
        config: PathBuf,

        /// Seconds to retry while the repository is busy (negative: no
        /// retries, 0: retry forever)
        #[arg(long)]
        retry_timeout: Option<i64>,

        /// Clone a template subtree, written as <from>=<to>
        #[arg(long)]
        template: Option<String>,

        /// Template source path (requires --template-to)
        #[arg(long)]
        template_from: Option<String>,

        /// Template destination path (requires --template-from)
        #[arg(long)]
        template_to: Option<String>,
    },

    /// Create and manage named snapshots
    Tag {
        /// Repository name
        repository: String,

        /// Path to the repository settings file
        #[arg(long, default_value = "./caspub.json")]
        config: PathBuf,

        /// Create new tag <name>
        #[arg(short, long)]
        add: Option<String>,

        /// Channel for the new tag
        #[arg(short, long)]
        channel: Option<String>,

        /// Descriptive message for the new tag
        #[arg(short, long)]
        message: Option<String>,

        /// Root hash of the newly created tag (defaults to the head)
        #[arg(long)]
        hash: Option<String>,

        /// Remove tag <name>
        #[arg(short, long)]
        remove: Option<String>,

        /// Inspect tag <name>
        #[arg(short, long)]
        inspect: Option<String>,

        /// List branch hierarchy
        #[arg(short, long)]
        branches: bool,

        /// List tags
        #[arg(short, long)]
        list: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        force: bool,

        /// Produce machine readable output
        #[arg(short = 'x', long)]
        machine_readable: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
