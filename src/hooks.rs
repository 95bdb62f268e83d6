//! External server hooks
//!
//! Site operators can attach shell hooks to the transaction lifecycle. The
//! hook script is invoked as `sh <script> <hook-name> <repository>`; its
//! exit status is the hook result. The before-hook can veto a transaction,
//! the after-hook only reports.

use std::path::Path;
use std::process::Command;

use crate::errors::{ErrorKind, PublishError, PublishResult};

/// Invoke a configured server hook and return its exit status.
///
/// No configured script means no hook: the result is 0. A configured but
/// missing script is a setup error, not a silent skip.
pub fn call_server_hook(
    script: Option<&str>,
    hook: &str,
    repository: &str,
) -> PublishResult<i32> {
    let Some(script) = script else {
        return Ok(0);
    };

    if !Path::new(script).exists() {
        return Err(PublishError::new(
            ErrorKind::MissingDependency,
            format!("hook script {} not found", script),
        ));
    }

    let status = Command::new("sh")
        .arg(script)
        .arg(hook)
        .arg(repository)
        .status()
        .map_err(|e| {
            PublishError::new(
                ErrorKind::MissingDependency,
                format!("cannot run hook script {}: {}", script, e),
            )
        })?;

    // Signal-terminated hooks count as failed
    Ok(status.code().unwrap_or(128))
}
