//! Transaction Lifecycle Invariant Tests
//!
//! Tests for the coordinator's core invariants:
//! - At most one open transaction per coordinator instance
//! - Idempotent close
//! - Retry classification and deadline handling
//!
//! Timeout semantics are historical and inverted from common expectation:
//! negative means no retries, zero means retry forever. The tests pin that
//! mapping.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tempfile::TempDir;

use caspub::catalog::{CatalogHash, CatalogStore, JsonCatalogStore};
use caspub::errors::{ErrorKind, PublishError, PublishResult};
use caspub::gateway::LeaseSession;
use caspub::history::JsonTagStore;
use caspub::mountpoint::{ManagedMountpoint, MountStatus};
use caspub::transaction::{Coordinator, CoordinatorConfig, SpoolArea};

// =============================================================================
// Test doubles
// =============================================================================

/// Lease session with scripted acquire outcomes
struct ScriptedLease {
    /// One entry per expected acquire call; None means success
    outcomes: Mutex<Vec<Option<ErrorKind>>>,
    acquires: Arc<AtomicUsize>,
    drops: Arc<AtomicUsize>,
    held: bool,
}

impl ScriptedLease {
    fn new(
        outcomes: Vec<Option<ErrorKind>>,
        acquires: Arc<AtomicUsize>,
        drops: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            outcomes: Mutex::new(outcomes),
            acquires,
            drops,
            held: false,
        }
    }
}

impl LeaseSession for ScriptedLease {
    fn acquire(&mut self, _lease_path: &str) -> PublishResult<()> {
        self.acquires.fetch_add(1, Ordering::SeqCst);
        let mut outcomes = self.outcomes.lock().unwrap();
        match outcomes.pop() {
            Some(Some(kind)) => Err(PublishError::new(kind, "scripted failure")),
            Some(None) | None => {
                self.held = true;
                Ok(())
            }
        }
    }

    fn drop_lease(&mut self) -> PublishResult<()> {
        if self.held {
            self.drops.fetch_add(1, Ordering::SeqCst);
            self.held = false;
        }
        Ok(())
    }

    fn set_keep_alive(&mut self, _enabled: bool) -> PublishResult<()> {
        Ok(())
    }

    fn has_lease(&self) -> bool {
        self.held
    }
}

/// Mountpoint that can be told to fail its consistency check or its pin
struct FlakyMountpoint {
    healthy: bool,
    fail_pin: bool,
    pinned: Option<CatalogHash>,
    writable: bool,
}

impl FlakyMountpoint {
    fn new(healthy: bool) -> Self {
        Self {
            healthy,
            fail_pin: false,
            pinned: None,
            writable: false,
        }
    }

    fn failing_pin() -> Self {
        Self {
            fail_pin: true,
            ..Self::new(true)
        }
    }
}

impl ManagedMountpoint for FlakyMountpoint {
    fn mounted_root_hash(&self) -> PublishResult<CatalogHash> {
        Ok(self
            .pinned
            .clone()
            .unwrap_or_else(|| CatalogHash::digest_of(b"head")))
    }

    fn set_root_hash(&mut self, hash: &CatalogHash) -> PublishResult<()> {
        if self.fail_pin {
            return Err(PublishError::unspecified("scripted pin failure"));
        }
        self.pinned = Some(hash.clone());
        Ok(())
    }

    fn clear_root_hash(&mut self) -> PublishResult<()> {
        self.pinned = None;
        Ok(())
    }

    fn lock(&mut self) -> PublishResult<()> {
        self.writable = false;
        Ok(())
    }

    fn unlock(&mut self) -> PublishResult<()> {
        self.writable = true;
        Ok(())
    }

    fn check(&self, _quiet: bool) -> MountStatus {
        if self.healthy && self.writable {
            MountStatus::Healthy
        } else {
            MountStatus::Degraded("scripted degradation".to_string())
        }
    }
}

struct Harness {
    _dir: TempDir,
    acquires: Arc<AtomicUsize>,
    drops: Arc<AtomicUsize>,
}

/// Build a coordinator over a real catalog containing /sw/releases, with a
/// scripted lease and fast backoff.
fn coordinator(
    lease_outcomes: Vec<Option<ErrorKind>>,
    lease_path: &str,
    timeout_s: i64,
    mountpoint: Option<Box<dyn ManagedMountpoint>>,
) -> (Coordinator, Harness) {
    let dir = TempDir::new().unwrap();
    let mut catalog = JsonCatalogStore::create(&dir.path().join("catalog.json")).unwrap();
    catalog.add_directory("/sw/releases").unwrap();
    let history = JsonTagStore::open(&dir.path().join("history.json")).unwrap();
    let spool = SpoolArea::new(&dir.path().join("spool"));

    let acquires = Arc::new(AtomicUsize::new(0));
    let drops = Arc::new(AtomicUsize::new(0));
    // Outcomes are popped from the back
    let mut outcomes = lease_outcomes;
    outcomes.reverse();
    let session = ScriptedLease::new(outcomes, Arc::clone(&acquires), Arc::clone(&drops));

    let config = CoordinatorConfig {
        repository: "sw.example.org".to_string(),
        lease_path: lease_path.to_string(),
        timeout_s,
        template: None,
        backoff_ms: (1, 4, 1_000),
    };
    let coordinator = Coordinator::new(
        config,
        Box::new(session),
        mountpoint,
        Box::new(catalog),
        Box::new(history),
        spool,
    );
    (
        coordinator,
        Harness {
            _dir: dir,
            acquires,
            drops,
        },
    )
}

// =============================================================================
// Open / Close invariants
// =============================================================================

/// A second open fails with a transaction-state conflict and leaves the
/// state unchanged.
#[test]
fn test_open_is_not_reentrant() {
    let (mut coordinator, _h) = coordinator(vec![None], "", 0, None);

    coordinator.open().unwrap();
    assert!(coordinator.in_transaction());

    let err = coordinator.open().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransactionState);
    assert!(coordinator.in_transaction());
}

/// Closing an idle coordinator has no effect and raises no error.
#[test]
fn test_close_is_idempotent() {
    let (mut coordinator, _h) = coordinator(vec![None], "", 0, None);

    coordinator.close();
    assert!(!coordinator.in_transaction());

    coordinator.open().unwrap();
    coordinator.close();
    assert!(!coordinator.in_transaction());
    coordinator.close();
    assert!(!coordinator.in_transaction());
}

/// Close after open releases the state so a new transaction can start.
#[test]
fn test_open_close_open() {
    let (mut coordinator, _h) = coordinator(vec![None], "", 0, None);
    coordinator.open().unwrap();
    coordinator.close();
    coordinator.open().unwrap();
    assert!(coordinator.in_transaction());
}

// =============================================================================
// Retry protocol
// =============================================================================

/// A busy lease that clears after one attempt: success after exactly two
/// attempts, with one backoff delay slept in between.
#[test]
fn test_busy_lease_retried_once_then_succeeds() {
    let (mut coordinator, h) = coordinator(
        vec![Some(ErrorKind::LeaseBusy), None],
        "/sw/releases",
        3600,
        None,
    );

    let start = Instant::now();
    coordinator.transaction().unwrap();
    // The configured initial backoff delay was observed
    assert!(start.elapsed() >= Duration::from_millis(1));
    assert_eq!(h.acquires.load(Ordering::SeqCst), 2);
    assert!(coordinator.in_transaction());
}

/// Negative timeout: the deadline is already passed, so a retryable failure
/// on the first attempt is re-raised without another attempt.
#[test]
fn test_negative_timeout_makes_a_single_attempt() {
    let (mut coordinator, h) = coordinator(
        vec![Some(ErrorKind::LeaseBusy), None],
        "/sw/releases",
        -1,
        None,
    );

    let err = coordinator.transaction().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LeaseBusy);
    assert_eq!(h.acquires.load(Ordering::SeqCst), 1);
    assert!(!coordinator.in_transaction());
}

/// Zero timeout: retry indefinitely; a finite run of busy failures is
/// eventually outlasted.
#[test]
fn test_zero_timeout_retries_until_success() {
    let (mut coordinator, h) = coordinator(
        vec![
            Some(ErrorKind::LeaseBusy),
            Some(ErrorKind::LeaseBusy),
            Some(ErrorKind::LeaseBusy),
            Some(ErrorKind::LeaseBusy),
            None,
        ],
        "/sw/releases",
        0,
        None,
    );

    coordinator.transaction().unwrap();
    assert_eq!(h.acquires.load(Ordering::SeqCst), 5);
}

/// A non-retryable lease failure is re-raised immediately with the state
/// flag cleared.
#[test]
fn test_fatal_lease_error_is_not_retried() {
    let (mut coordinator, h) = coordinator(
        vec![Some(ErrorKind::LeaseHttp), None],
        "/sw/releases",
        3600,
        None,
    );

    let err = coordinator.transaction().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LeaseHttp);
    assert_eq!(h.acquires.load(Ordering::SeqCst), 1);
    assert!(!coordinator.in_transaction());
}

/// A transaction on a non-existing lease path fails fatally on the first
/// attempt; the acquired lease is dropped and the flag cleared.
#[test]
fn test_missing_lease_path_is_fatal() {
    let (mut coordinator, h) = coordinator(vec![None], "/not/there/deep", 3600, None);

    let err = coordinator.transaction().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LeaseNoEntry);
    assert_eq!(h.acquires.load(Ordering::SeqCst), 1);
    assert_eq!(h.drops.load(Ordering::SeqCst), 1);
    assert!(!coordinator.in_transaction());
}

/// A whole-repository lease (empty path) skips path validation.
#[test]
fn test_empty_lease_path_skips_path_validation() {
    let (mut coordinator, _h) = coordinator(vec![None], "", 3600, None);
    coordinator.transaction().unwrap();
    assert!(coordinator.in_transaction());
}

/// Staging handles exist exactly while the transaction is open.
#[test]
fn test_spoolers_live_with_the_transaction() {
    let (mut coordinator, _h) = coordinator(vec![None], "/sw/releases", 3600, None);
    assert!(coordinator.spoolers().is_none());

    coordinator.transaction().unwrap();
    let spoolers = coordinator.spoolers().unwrap();
    assert!(spoolers.scratch_dir.is_dir());
    assert!(spoolers.tmp_dir.is_dir());

    coordinator.close();
    assert!(coordinator.spoolers().is_none());
}

// =============================================================================
// Templated transactions
// =============================================================================

fn template_coordinator(from: &str, to: &str) -> (Coordinator, TempDir) {
    let dir = TempDir::new().unwrap();
    let mut catalog = JsonCatalogStore::create(&dir.path().join("catalog.json")).unwrap();
    catalog.add_directory("/sw/releases").unwrap();
    let history = JsonTagStore::open(&dir.path().join("history.json")).unwrap();
    let spool = SpoolArea::new(&dir.path().join("spool"));
    let session = ScriptedLease::new(
        vec![None],
        Arc::new(AtomicUsize::new(0)),
        Arc::new(AtomicUsize::new(0)),
    );

    let config = CoordinatorConfig {
        repository: "sw.example.org".to_string(),
        lease_path: String::new(),
        timeout_s: 3600,
        template: Some((from.to_string(), to.to_string())),
        backoff_ms: (1, 4, 1_000),
    };
    let coordinator = Coordinator::new(
        config,
        Box::new(session),
        None,
        Box::new(catalog),
        Box::new(history),
        spool,
    );
    (coordinator, dir)
}

/// A templated transaction clones the subtree and re-roots the read view
/// at the new base.
#[test]
fn test_template_clone_re_roots_read_view() {
    let (mut coordinator, dir) = template_coordinator("/sw/releases", "/sw/staging");
    coordinator.transaction().unwrap();

    // The persisted manifest now serves the cloned tree as its base
    let catalog = JsonCatalogStore::load(&dir.path().join("catalog.json")).unwrap();
    let view = catalog.open_view(None).unwrap();
    assert!(view.lookup("/sw/staging").unwrap().is_directory());
}

/// A failing template clone is an input error, not a retryable condition.
#[test]
fn test_template_clone_failure_is_fatal_input() {
    let (mut coordinator, _dir) = template_coordinator("/missing", "/sw/staging");

    let err = coordinator.transaction().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
    assert!(err.message().starts_with("cannot clone directory tree."));
    assert!(!coordinator.in_transaction());
}

// =============================================================================
// Mountpoint establishment
// =============================================================================

/// After a successful attempt the mountpoint must check out writable.
#[test]
fn test_healthy_mountpoint_is_established() {
    let (mut coordinator, _h) = coordinator(
        vec![None],
        "/sw/releases",
        3600,
        Some(Box::new(FlakyMountpoint::new(true))),
    );
    coordinator.transaction().unwrap();
    assert!(coordinator.in_transaction());
}

/// A pin failure while establishing the mountpoint releases the lease and
/// clears the state flag just like a failed consistency check.
#[test]
fn test_mountpoint_pin_failure_releases_lease() {
    let (mut coordinator, h) = coordinator(
        vec![None],
        "/sw/releases",
        3600,
        Some(Box::new(FlakyMountpoint::failing_pin())),
    );

    let err = coordinator.transaction().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unspecified);
    assert_eq!(h.drops.load(Ordering::SeqCst), 1);
    assert!(!coordinator.in_transaction());
}

/// A mountpoint that cannot be established as writable fails the
/// transaction fatally, with lease dropped and flag cleared.
#[test]
fn test_degraded_mountpoint_fails_transaction() {
    let (mut coordinator, h) = coordinator(
        vec![None],
        "/sw/releases",
        3600,
        Some(Box::new(FlakyMountpoint::new(false))),
    );

    let err = coordinator.transaction().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unspecified);
    assert_eq!(h.drops.load(Ordering::SeqCst), 1);
    assert!(!coordinator.in_transaction());
}
