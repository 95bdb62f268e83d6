//! Write-lease sessions
//!
//! Mutating access to a repository path is guarded by an exclusive lease.
//! For gateway-published repositories the lease is issued by the remote
//! gateway; the coordinator only consumes the Acquire/Drop/KeepAlive
//! contract and classifies the failure kinds:
//!
//! - `LeaseBusy` is retryable (another writer holds the path right now)
//! - `GatewayKey`, `LeaseHttp`, `LeaseBody` and everything else are fatal
//!
//! Single-host repositories use the lock-file based `LocalLease`.

mod local;
mod token;

pub use local::LocalLease;
pub use token::SessionToken;

use crate::errors::PublishResult;

/// Exclusive write-lease session scoped to a repository path.
///
/// A session owns at most one lease at a time. Keep-alive is enabled once a
/// transaction has opened successfully so the lease does not expire while
/// staging continues.
pub trait LeaseSession {
    /// Acquire the lease for `lease_path` (empty path leases the whole
    /// repository).
    fn acquire(&mut self, lease_path: &str) -> PublishResult<()>;

    /// Drop the currently held lease. Dropping without a lease is a no-op.
    fn drop_lease(&mut self) -> PublishResult<()>;

    /// Enable or disable lease keep-alive.
    fn set_keep_alive(&mut self, enabled: bool) -> PublishResult<()>;

    /// Whether this session currently holds a lease.
    fn has_lease(&self) -> bool;
}
