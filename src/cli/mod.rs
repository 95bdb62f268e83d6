//! CLI module for caspub
//!
//! Provides the command-line interface:
//! - init: initialize a repository data directory
//! - transaction: open a writer transaction
//! - tag: create, delete, inspect and list named snapshots

mod args;
mod commands;

pub use args::{Cli, Command};
pub use commands::{init, run_command, tag, transaction, TagInvocation};

use crate::errors::PublishResult;

/// Parse the command line and run the requested command, returning the
/// process exit code.
pub fn run() -> PublishResult<i32> {
    run_command(Cli::parse_args())
}
