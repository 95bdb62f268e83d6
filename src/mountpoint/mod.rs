//! Managed mountpoint handling
//!
//! A managed mountpoint is the local read-only view of the repository. A
//! writer pins it to the currently mounted root hash for the duration of a
//! transaction (so concurrent readers never observe in-progress writes),
//! unlocks the union mount for writing, and reverses both on close. `check`
//! verifies the mount is in a consistent state; the coordinator runs it
//! after a successful open to catch environment drift.

mod spool;

pub use spool::SpoolMountpoint;

use crate::catalog::CatalogHash;
use crate::errors::PublishResult;

/// Result of a mountpoint consistency check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountStatus {
    /// Mount is consistent and writable state matches expectations
    Healthy,
    /// Mount cannot currently be used for writing
    Degraded(String),
}

impl MountStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, MountStatus::Healthy)
    }
}

/// Local managed read view of the repository.
pub trait ManagedMountpoint {
    /// The root hash the read view currently serves (the pinned hash while
    /// pinned, the tracked upstream head otherwise).
    fn mounted_root_hash(&self) -> PublishResult<CatalogHash>;

    /// Freeze the read view to a specific snapshot.
    fn set_root_hash(&mut self, hash: &CatalogHash) -> PublishResult<()>;

    /// Resume automatic tracking of the latest published snapshot.
    fn clear_root_hash(&mut self) -> PublishResult<()>;

    /// Make the union mount read-only.
    fn lock(&mut self) -> PublishResult<()>;

    /// Make the union mount accept writes.
    fn unlock(&mut self) -> PublishResult<()>;

    /// Verify the mount is consistent. With `quiet` set, implementations
    /// suppress their own diagnostics and only report the status.
    fn check(&self, quiet: bool) -> MountStatus;
}
