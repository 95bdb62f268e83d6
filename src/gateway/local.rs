//! Lock-file lease for single-host repositories
//!
//! Without a gateway there is no remote lease service; mutual exclusion
//! between writers on the same host falls back to an exclusive lock file in
//! the repository spool area. The file holds an encoded session token, so a
//! crashed writer leaves behind an expiring lease rather than a permanent
//! lock.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::token::SessionToken;
use super::LeaseSession;
use crate::errors::{PublishError, PublishResult};

/// Default lease validity in seconds when keep-alive is off
const LEASE_VALID_S: i64 = 300;

/// Exclusive lock-file lease
#[derive(Debug)]
pub struct LocalLease {
    lock_path: PathBuf,
    token: Option<SessionToken>,
    keep_alive: bool,
}

impl LocalLease {
    /// Lease backed by the given lock file (typically
    /// `<spool>/session.lease`).
    pub fn new(lock_path: &Path) -> Self {
        Self {
            lock_path: lock_path.to_path_buf(),
            token: None,
            keep_alive: false,
        }
    }

    /// The token currently held, if any.
    pub fn token(&self) -> Option<&SessionToken> {
        self.token.as_ref()
    }

    fn write_token(&self, token: &SessionToken, create_new: bool) -> PublishResult<()> {
        let mut opts = OpenOptions::new();
        opts.write(true);
        if create_new {
            opts.create_new(true);
        } else {
            opts.create(true).truncate(true);
        }
        let mut file = opts.open(&self.lock_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                PublishError::lease_busy(format!(
                    "lease file {} exists",
                    self.lock_path.display()
                ))
            } else {
                PublishError::unspecified(format!(
                    "cannot write lease file {}: {}",
                    self.lock_path.display(),
                    e
                ))
            }
        })?;
        file.write_all(token.encode()?.as_bytes()).map_err(|e| {
            PublishError::unspecified(format!("cannot write session token: {}", e))
        })?;
        Ok(())
    }
}

impl LeaseSession for LocalLease {
    fn acquire(&mut self, lease_path: &str) -> PublishResult<()> {
        if self.token.is_some() {
            return Err(PublishError::transaction_state(
                "session already holds a lease",
            ));
        }

        let token = SessionToken::issue(lease_path, LEASE_VALID_S);
        match self.write_token(&token, true) {
            Ok(()) => {
                self.token = Some(token);
                return Ok(());
            }
            Err(e) if e.kind().is_retryable() => {}
            Err(e) => return Err(e),
        }

        // The lock file exists. A corrupt or expired token does not protect
        // anything anymore; break it and take over. A live token means
        // another writer holds the path.
        let raw = fs::read_to_string(&self.lock_path).map_err(|e| {
            PublishError::unspecified(format!(
                "cannot read lease file {}: {}",
                self.lock_path.display(),
                e
            ))
        })?;
        if let Ok(existing) = SessionToken::decode(&raw) {
            if !existing.is_expired() {
                return Err(PublishError::lease_busy(format!(
                    "path {} is leased until {}",
                    if existing.path.is_empty() { "/" } else { &existing.path },
                    existing.expiry.to_rfc3339()
                )));
            }
        }

        self.write_token(&token, false)?;
        self.token = Some(token);
        Ok(())
    }

    fn drop_lease(&mut self) -> PublishResult<()> {
        let Some(token) = self.token.take() else {
            return Ok(());
        };
        self.keep_alive = false;

        // Only remove the file if it still carries our token; a broken
        // lease that another writer took over is theirs now.
        match fs::read_to_string(&self.lock_path) {
            Ok(raw) => {
                if let Ok(on_disk) = SessionToken::decode(&raw) {
                    if on_disk.token_id != token.token_id {
                        return Ok(());
                    }
                }
            }
            Err(_) => return Ok(()),
        }
        fs::remove_file(&self.lock_path).map_err(|e| {
            PublishError::unspecified(format!(
                "cannot remove lease file {}: {}",
                self.lock_path.display(),
                e
            ))
        })
    }

    fn set_keep_alive(&mut self, enabled: bool) -> PublishResult<()> {
        self.keep_alive = enabled;
        if enabled {
            if let Some(token) = self.token.as_mut() {
                token.renew(LEASE_VALID_S);
                let renewed = token.clone();
                self.write_token(&renewed, false)?;
            }
        }
        Ok(())
    }

    fn has_lease(&self) -> bool {
        self.token.is_some()
    }
}
