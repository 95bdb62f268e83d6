//! Catalog access
//!
//! A catalog is an immutable, content-addressed snapshot of the repository
//! directory tree, identified by a root hash. The transaction coordinator
//! and the tag editor only need a narrow view of it: path lookup, root
//! snapshot metadata, and (for templated transactions) subtree cloning on
//! the write side. The catalog storage engine itself lives elsewhere; this
//! module defines the consumed interface plus a JSON-manifest implementation
//! used by single-host repositories and tests.

mod hash;
mod store;

pub use hash::CatalogHash;
pub use store::JsonCatalogStore;

use chrono::{DateTime, Utc};

use crate::errors::PublishResult;

/// Kind of a directory entry inside a catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Dir,
    File,
    Symlink,
}

/// A resolved directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

/// Metadata of a catalog snapshot's root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    /// Content address of the snapshot
    pub root_hash: CatalogHash,
    /// On-disk size of the catalog, in bytes
    pub size_bytes: u64,
    /// Monotonic revision counter
    pub revision: u64,
    /// Last modification time of the snapshot
    pub last_modified: DateTime<Utc>,
}

/// Read-only lookup into one catalog snapshot
pub trait CatalogView {
    /// Resolve an absolute path ("/" is the root) to its entry, if present.
    fn lookup(&self, path: &str) -> Option<DirEntry>;

    /// Metadata of this snapshot's root catalog.
    fn root_info(&self) -> SnapshotInfo;
}

/// Catalog store: opens read views and, on the write side, clones subtrees
/// for templated transactions.
pub trait CatalogStore {
    /// Open a read-only view at `root_hash`, or at the current head when
    /// `None`.
    fn open_view(&self, root_hash: Option<&CatalogHash>) -> PublishResult<Box<dyn CatalogView>>;

    /// The current head snapshot hash.
    fn head(&self) -> PublishResult<CatalogHash>;

    /// Clone the subtree at `from` to `to` within a new snapshot derived
    /// from the head, returning the new base hash. The caller re-roots the
    /// read view at the returned hash.
    fn clone_tree(&mut self, from: &str, to: &str) -> PublishResult<CatalogHash>;

    /// Re-root the read side at `base`, typically right after `clone_tree`.
    fn set_base_hash(&mut self, base: &CatalogHash) -> PublishResult<()>;
}

/// Parent of an absolute catalog path: `/a/b` -> `/a`, `/a` -> `/`.
pub fn parent_path(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

/// Canonicalize a lease path: collapse repeated separators, drop trailing
/// ones, ensure a single leading `/`. The empty path stays empty (a lease
/// on the whole repository).
pub fn canonicalize_lease_path(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    if parts.is_empty() {
        return String::new();
    }
    format!("/{}", parts.join("/"))
}
