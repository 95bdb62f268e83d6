//! Repository settings
//!
//! One JSON settings file per repository. Required fields are the
//! repository name and the data directory; everything else has a default.
//! Transaction parameters (retry timeout, lease path, template) start from
//! the file and are overridden per invocation by the command line.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backoff::{DEFAULT_INIT_DELAY_MS, DEFAULT_MAX_DELAY_MS, DEFAULT_RESET_AFTER_MS};
use crate::catalog::canonicalize_lease_path;
use crate::errors::{PublishError, PublishResult};

/// Backoff tuning for the transaction retry loop, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffSettings {
    #[serde(default = "default_init_delay")]
    pub init_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    #[serde(default = "default_reset_after")]
    pub reset_after_ms: u64,
}

fn default_init_delay() -> u64 {
    DEFAULT_INIT_DELAY_MS
}
fn default_max_delay() -> u64 {
    DEFAULT_MAX_DELAY_MS
}
fn default_reset_after() -> u64 {
    DEFAULT_RESET_AFTER_MS
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            init_delay_ms: default_init_delay(),
            max_delay_ms: default_max_delay(),
            reset_after_ms: default_reset_after(),
        }
    }
}

/// Per-transaction parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionSettings {
    /// Retry timeout in seconds. Historical mapping: negative means no
    /// retries, zero means retry forever, positive bounds the retry loop.
    #[serde(default)]
    pub retry_timeout_s: i64,

    /// Leased path scope within the repository ("" leases everything)
    #[serde(default)]
    pub lease_path: String,

    /// Template source path for templated transactions
    #[serde(default)]
    pub template_from: Option<String>,

    /// Template destination path for templated transactions
    #[serde(default)]
    pub template_to: Option<String>,
}

impl TransactionSettings {
    pub fn set_timeout(&mut self, timeout_s: i64) {
        self.retry_timeout_s = timeout_s;
    }

    pub fn set_lease_path(&mut self, path: &str) {
        self.lease_path = canonicalize_lease_path(path);
    }

    /// Configure a template clone. Both paths are canonicalized; empty
    /// paths are invalid.
    pub fn set_template(&mut self, from: &str, to: &str) -> PublishResult<()> {
        let from = canonicalize_lease_path(from);
        let to = canonicalize_lease_path(to);
        if from.is_empty() || to.is_empty() {
            return Err(PublishError::input(
                "template source and destination must be non-empty paths",
            ));
        }
        self.template_from = Some(from);
        self.template_to = Some(to);
        Ok(())
    }

    pub fn has_template(&self) -> bool {
        self.template_from.is_some() && self.template_to.is_some()
    }

    /// The configured (from, to) pair, if complete.
    pub fn template(&self) -> Option<(&str, &str)> {
        match (&self.template_from, &self.template_to) {
            (Some(from), Some(to)) => Some((from.as_str(), to.as_str())),
            _ => None,
        }
    }
}

/// Repository settings file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Repository name, e.g. "sw.example.org"
    pub repository: String,

    /// Directory holding the catalog manifest, tag history and spool area
    pub data_dir: String,

    /// Gateway lease endpoint for published repositories; single-host
    /// repositories leave this unset and use the local lock-file lease
    #[serde(default)]
    pub gateway_url: Option<String>,

    /// Whether an automounter manages the repository mountpoint. A
    /// conflicting automount must be disabled before opening transactions.
    #[serde(default)]
    pub auto_managed_mount: bool,

    /// Expiry of the repository whitelist, if the repository carries one
    #[serde(default)]
    pub whitelist_expiry: Option<DateTime<Utc>>,

    /// Shell script invoked for before/after transaction hooks
    #[serde(default)]
    pub hooks_script: Option<String>,

    #[serde(default)]
    pub transaction: TransactionSettings,

    #[serde(default)]
    pub backoff: BackoffSettings,
}

impl Settings {
    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> PublishResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PublishError::new(
                crate::errors::ErrorKind::RepositoryNotFound,
                format!("cannot read settings {}: {}", path.display(), e),
            )
        })?;
        let settings: Settings = serde_json::from_str(&content)
            .map_err(|e| PublishError::input(format!("invalid settings JSON: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> PublishResult<()> {
        if self.repository.is_empty() {
            return Err(PublishError::input("repository must not be empty"));
        }
        if self.data_dir.is_empty() {
            return Err(PublishError::input("data_dir must not be empty"));
        }
        if self.transaction.template_from.is_some() != self.transaction.template_to.is_some() {
            return Err(PublishError::input(
                "template_from and template_to must be set together",
            ));
        }
        if self.backoff.init_delay_ms == 0 || self.backoff.max_delay_ms < self.backoff.init_delay_ms
        {
            return Err(PublishError::input("invalid backoff configuration"));
        }
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    /// Spool area for staged content and writer-local state
    pub fn spool_dir(&self) -> PathBuf {
        self.data_dir().join("spool")
    }

    pub fn catalog_manifest_path(&self) -> PathBuf {
        self.data_dir().join("catalog.json")
    }

    pub fn tag_history_path(&self) -> PathBuf {
        self.data_dir().join("history.json")
    }

    pub fn lease_lock_path(&self) -> PathBuf {
        self.spool_dir().join("session.lease")
    }
}
