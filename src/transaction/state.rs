//! In-process transaction state flag

use std::sync::atomic::{AtomicBool, Ordering};

/// The coordinator's transaction-state flag: `Idle` or `Open`.
///
/// This flag only guards against a single process opening a reentrant
/// transaction; exclusion across processes and hosts is the lease's job.
/// Compare-and-set semantics keep the "at most one open transaction per
/// coordinator instance" invariant local and testable.
#[derive(Debug, Default)]
pub struct TransactionFlag(AtomicBool);

impl TransactionFlag {
    pub fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Transition Idle -> Open. Returns false when already open, leaving
    /// the flag untouched.
    pub fn try_set(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Transition to Idle unconditionally.
    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Whether a transaction is open.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
