//! Transaction coordination
//!
//! The coordinator owns the transaction-state flag and orchestrates
//! open/close/retry against its collaborators: the lease session, the
//! managed mountpoint (optional), the catalog store, the tag history and
//! the spool area. Collaborators are held as exclusive references and never
//! point back at the coordinator.
//!
//! Retry classification is value-based: an attempt returns a
//! `PublishResult` and the loop inspects the error kind. A transaction
//! state conflict or a busy lease is retryable until the deadline; every
//! other kind is fatal and triggers cleanup (lease drop, flag clear) before
//! the error propagates.

use super::spool::{SpoolArea, Spoolers};
use super::state::TransactionFlag;
use crate::backoff::{BackoffThrottle, Deadline};
use crate::catalog::{parent_path, CatalogStore};
use crate::errors::{ErrorKind, PublishError, PublishResult};
use crate::gateway::LeaseSession;
use crate::history::{TagHistoryEditor, TagHistoryStore};
use crate::mountpoint::ManagedMountpoint;
use crate::observability;

/// Invocation-scoped coordinator parameters
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Repository name, for log records and messages
    pub repository: String,
    /// Leased path scope ("" leases the whole repository)
    pub lease_path: String,
    /// Retry timeout in seconds (negative: no retries, zero: unbounded,
    /// positive: bounded)
    pub timeout_s: i64,
    /// Template (source, destination) pair for templated transactions
    pub template: Option<(String, String)>,
    /// Backoff tuning in milliseconds: (initial, cap, reset ceiling)
    pub backoff_ms: (u64, u64, u64),
}

/// Coordinates mutually-exclusive write transactions on one repository.
pub struct Coordinator {
    config: CoordinatorConfig,
    flag: TransactionFlag,
    session: Box<dyn LeaseSession>,
    mountpoint: Option<Box<dyn ManagedMountpoint>>,
    catalog: Box<dyn CatalogStore>,
    history: Box<dyn TagHistoryStore>,
    spool: SpoolArea,
    spoolers: Option<Spoolers>,
}

impl Coordinator {
    pub fn new(
        config: CoordinatorConfig,
        session: Box<dyn LeaseSession>,
        mountpoint: Option<Box<dyn ManagedMountpoint>>,
        catalog: Box<dyn CatalogStore>,
        history: Box<dyn TagHistoryStore>,
        spool: SpoolArea,
    ) -> Self {
        Self {
            config,
            flag: TransactionFlag::new(),
            session,
            mountpoint,
            catalog,
            history,
            spool,
            spoolers: None,
        }
    }

    /// The transaction-state flag. Read-only for collaborators such as the
    /// tag editor; only the coordinator mutates it.
    pub fn flag(&self) -> &TransactionFlag {
        &self.flag
    }

    /// Whether a transaction is currently open.
    pub fn in_transaction(&self) -> bool {
        self.flag.is_set()
    }

    pub fn session_mut(&mut self) -> &mut dyn LeaseSession {
        self.session.as_mut()
    }

    pub fn history(&self) -> &dyn TagHistoryStore {
        self.history.as_ref()
    }

    /// Staging handles of the open transaction, if any. Populated by a
    /// successful `transaction()`, dropped again on close or abort.
    pub fn spoolers(&self) -> Option<&Spoolers> {
        self.spoolers.as_ref()
    }

    /// Tag editor over this coordinator's catalog, history and state flag.
    pub fn tag_editor(&mut self) -> TagHistoryEditor<'_> {
        TagHistoryEditor::new(&self.flag, self.catalog.as_ref(), self.history.as_mut())
    }

    /// Open a transaction without acquiring a lease or staging content.
    ///
    /// Used by operations that only need the local mutual-exclusion and
    /// mountpoint pinning, e.g. tag edits on a single-host repository. The
    /// read view is pinned to the currently mounted root hash so readers do
    /// not observe the edit in progress, then the union mount is unlocked
    /// for writing.
    pub fn open(&mut self) -> PublishResult<()> {
        if !self.flag.try_set() {
            return Err(PublishError::transaction_state(
                "another transaction is already open",
            ));
        }

        if let Some(mountpoint) = self.mountpoint.as_mut() {
            let mounted = mountpoint.mounted_root_hash()?;
            mountpoint.set_root_hash(&mounted)?;
            mountpoint.unlock()?;
        }

        observability::debug(
            "transaction_opened",
            &[("repo", self.config.repository.as_str())],
        );
        Ok(())
    }

    /// Close the current transaction. A no-op when no transaction is open;
    /// never fails. Mountpoint restore problems are reported but do not
    /// keep the transaction open.
    pub fn close(&mut self) {
        if !self.flag.is_set() {
            return;
        }

        if let Some(mountpoint) = self.mountpoint.as_mut() {
            if let Err(e) = mountpoint.lock() {
                observability::warn("mountpoint_lock_failed", &[("error", &e.to_string())]);
            }
            if let Err(e) = mountpoint.clear_root_hash() {
                observability::warn("mountpoint_unpin_failed", &[("error", &e.to_string())]);
            }
        }
        if let Err(e) = self.session.drop_lease() {
            observability::warn("lease_drop_failed", &[("error", &e.to_string())]);
        }

        self.spoolers = None;
        self.flag.clear();
        observability::debug(
            "transaction_closed",
            &[("repo", self.config.repository.as_str())],
        );
    }

    /// Open a full transaction, retrying under contention.
    ///
    /// Runs the open sequence until it succeeds or the deadline derived
    /// from the configured timeout passes. A state conflict or busy lease
    /// waits out one backoff delay and tries again; any other failure
    /// drops the lease, clears the state flag and propagates. After a
    /// successful attempt the managed mountpoint (when configured) is
    /// pinned, unlocked and checked; a mount that cannot be established as
    /// writable fails the transaction.
    pub fn transaction(&mut self) -> PublishResult<()> {
        let deadline = Deadline::from_timeout_s(self.config.timeout_s);
        let (init_ms, max_ms, reset_ms) = self.config.backoff_ms;
        let mut throttle = BackoffThrottle::new(init_ms, max_ms, reset_ms);

        loop {
            match self.transaction_impl() {
                Ok(()) => break,
                Err(e) => {
                    // A state conflict leaves the flag with its current
                    // owner; everything else releases what this attempt
                    // may have taken.
                    if e.kind() != ErrorKind::TransactionState {
                        let _ = self.session.drop_lease();
                        self.flag.clear();
                        self.spoolers = None;
                    }

                    if e.kind().is_retryable() {
                        if deadline.is_elapsed() {
                            return Err(e);
                        }
                        observability::info(
                            "repository_busy_retrying",
                            &[("repo", self.config.repository.as_str())],
                        );
                        throttle.throttle();
                        continue;
                    }

                    return Err(e);
                }
            }
        }

        // Any failure to establish the writable mountpoint releases the
        // lease and clears the flag; a leaked flag would pin every later
        // attempt on TransactionState until its deadline.
        if let Some(mountpoint) = self.mountpoint.as_mut() {
            if let Err(e) = establish_writable(mountpoint.as_mut()) {
                let _ = self.session.drop_lease();
                self.flag.clear();
                self.spoolers = None;
                return Err(e);
            }
        }

        observability::debug(
            "transaction_opened",
            &[
                ("repo", self.config.repository.as_str()),
                ("lease_path", self.config.lease_path.as_str()),
            ],
        );
        Ok(())
    }

    /// One transaction-open attempt.
    ///
    /// Order matters: staging init, state flag, lease, lease-path
    /// validation, spooler construction, template clone. A state conflict
    /// here is the retryable case; a concurrent local or remote writer may
    /// release the repository shortly.
    fn transaction_impl(&mut self) -> PublishResult<()> {
        if self.flag.is_set() {
            return Err(PublishError::transaction_state(
                "another transaction is already open",
            ));
        }

        self.spool.init()?;

        // From here on, a failed attempt is unwound by the retry loop:
        // it drops the session and clears the flag.
        if !self.flag.try_set() {
            return Err(PublishError::transaction_state(
                "another transaction is already open",
            ));
        }
        self.session.acquire(&self.config.lease_path)?;

        // A lease for a non-existing path would be valid as far as the
        // gateway is concerned, but merging its catalogs later cannot
        // work. Reject such transactions up front.
        if !self.config.lease_path.is_empty() {
            let parent = parent_path(&self.config.lease_path);
            let view = self.catalog.open_view(None)?;
            match view.lookup(&parent) {
                None => {
                    return Err(PublishError::new(
                        ErrorKind::LeaseNoEntry,
                        format!("cannot open transaction on non-existing path {}", parent),
                    ));
                }
                Some(entry) if !entry.is_directory() => {
                    return Err(PublishError::new(
                        ErrorKind::LeaseNoDir,
                        format!(
                            "cannot open transaction on {}, which is not a directory",
                            parent
                        ),
                    ));
                }
                Some(_) => {}
            }
        }

        self.spoolers = Some(self.spool.construct_spoolers()?);

        if let Some((from, to)) = self.config.template.clone() {
            observability::info(
                "cloning_template",
                &[("from", from.as_str()), ("to", to.as_str())],
            );
            let base = match self.catalog.clone_tree(&from, &to) {
                Ok(base) => base,
                Err(e) => {
                    self.flag.clear();
                    return Err(PublishError::input(format!(
                        "cannot clone directory tree. {}",
                        e.message()
                    )));
                }
            };
            self.catalog.set_base_hash(&base)?;
            observability::info("template_cloned", &[("base", &base.to_string())]);
        }

        Ok(())
    }
}

/// Pin the read view to the mounted hash, unlock the union mount and verify
/// the mount checks out writable.
fn establish_writable(mountpoint: &mut dyn ManagedMountpoint) -> PublishResult<()> {
    let mounted = mountpoint.mounted_root_hash()?;
    mountpoint.set_root_hash(&mounted)?;
    mountpoint.unlock()?;
    if !mountpoint.check(false).is_healthy() {
        return Err(PublishError::unspecified(
            "cannot establish writable mountpoint",
        ));
    }
    Ok(())
}
