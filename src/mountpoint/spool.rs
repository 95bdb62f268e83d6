//! Spool-backed mountpoint state
//!
//! The pin and writability state of the managed mountpoint is persisted as
//! a small marker file in the spool area. A writer that crashed mid
//! transaction leaves the marker behind, which `check` surfaces instead of
//! silently serving a stale pinned view.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{ManagedMountpoint, MountStatus};
use crate::catalog::CatalogHash;
use crate::errors::{PublishError, PublishResult};
use crate::observability::{log_stderr, Severity};

const MARKER_FILE: &str = "mountpoint.json";

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct MountMarker {
    #[serde(default)]
    pinned: Option<CatalogHash>,
    #[serde(default)]
    writable: bool,
}

/// Managed mountpoint whose pin/lock state lives in the spool area
#[derive(Debug)]
pub struct SpoolMountpoint {
    spool_dir: PathBuf,
    /// Hash the read view tracks when nothing is pinned
    tracked_head: CatalogHash,
    marker: MountMarker,
}

impl SpoolMountpoint {
    /// Open (or initialize) the mountpoint state under `spool_dir`.
    /// `tracked_head` is the snapshot the read view serves while unpinned.
    pub fn open(spool_dir: &Path, tracked_head: CatalogHash) -> PublishResult<Self> {
        let marker_path = spool_dir.join(MARKER_FILE);
        let marker = if marker_path.exists() {
            let content = fs::read_to_string(&marker_path).map_err(|e| {
                PublishError::unspecified(format!("cannot read mount marker: {}", e))
            })?;
            serde_json::from_str(&content).map_err(|e| {
                PublishError::unspecified(format!("corrupt mount marker: {}", e))
            })?
        } else {
            MountMarker::default()
        };
        Ok(Self {
            spool_dir: spool_dir.to_path_buf(),
            tracked_head,
            marker,
        })
    }

    fn persist(&self) -> PublishResult<()> {
        let content = serde_json::to_string(&self.marker).map_err(|e| {
            PublishError::unspecified(format!("cannot serialize mount marker: {}", e))
        })?;
        let path = self.spool_dir.join(MARKER_FILE);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, content)
            .map_err(|e| PublishError::unspecified(format!("cannot write mount marker: {}", e)))?;
        fs::rename(&tmp, &path)
            .map_err(|e| PublishError::unspecified(format!("cannot persist mount marker: {}", e)))?;
        Ok(())
    }
}

impl ManagedMountpoint for SpoolMountpoint {
    fn mounted_root_hash(&self) -> PublishResult<CatalogHash> {
        Ok(self
            .marker
            .pinned
            .clone()
            .unwrap_or_else(|| self.tracked_head.clone()))
    }

    fn set_root_hash(&mut self, hash: &CatalogHash) -> PublishResult<()> {
        self.marker.pinned = Some(hash.clone());
        self.persist()
    }

    fn clear_root_hash(&mut self) -> PublishResult<()> {
        self.marker.pinned = None;
        self.persist()
    }

    fn lock(&mut self) -> PublishResult<()> {
        self.marker.writable = false;
        self.persist()
    }

    fn unlock(&mut self) -> PublishResult<()> {
        self.marker.writable = true;
        self.persist()
    }

    fn check(&self, quiet: bool) -> MountStatus {
        let status = if !self.spool_dir.is_dir() {
            MountStatus::Degraded(format!(
                "spool area {} does not exist",
                self.spool_dir.display()
            ))
        } else {
            // A writable probe catches read-only remounts of the spool
            // filesystem underneath a supposedly writable transaction.
            let probe = self.spool_dir.join(".write_probe");
            match fs::write(&probe, b"probe") {
                Ok(()) => {
                    let _ = fs::remove_file(&probe);
                    if self.marker.writable {
                        MountStatus::Healthy
                    } else {
                        MountStatus::Degraded("union mount is locked read-only".to_string())
                    }
                }
                Err(e) => MountStatus::Degraded(format!("spool area is not writable: {}", e)),
            }
        };

        if let MountStatus::Degraded(reason) = &status {
            if !quiet {
                log_stderr(
                    Severity::Error,
                    "mountpoint_check_failed",
                    &[("reason", reason)],
                );
            }
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mountpoint() -> (TempDir, SpoolMountpoint) {
        let dir = TempDir::new().unwrap();
        let head = CatalogHash::digest_of(b"head");
        let mp = SpoolMountpoint::open(dir.path(), head).unwrap();
        (dir, mp)
    }

    #[test]
    fn test_pin_and_clear() {
        let (_dir, mut mp) = mountpoint();
        let head = mp.mounted_root_hash().unwrap();

        let pinned = CatalogHash::digest_of(b"pinned");
        mp.set_root_hash(&pinned).unwrap();
        assert_eq!(mp.mounted_root_hash().unwrap(), pinned);

        mp.clear_root_hash().unwrap();
        assert_eq!(mp.mounted_root_hash().unwrap(), head);
    }

    #[test]
    fn test_state_survives_reopen() {
        let (dir, mut mp) = mountpoint();
        let pinned = CatalogHash::digest_of(b"pinned");
        mp.set_root_hash(&pinned).unwrap();
        mp.unlock().unwrap();

        let reopened =
            SpoolMountpoint::open(dir.path(), CatalogHash::digest_of(b"head")).unwrap();
        assert_eq!(reopened.mounted_root_hash().unwrap(), pinned);
        assert!(reopened.check(true).is_healthy());
    }

    #[test]
    fn test_check_reports_locked_mount() {
        let (_dir, mut mp) = mountpoint();
        mp.lock().unwrap();
        assert!(!mp.check(true).is_healthy());
        mp.unlock().unwrap();
        assert!(mp.check(true).is_healthy());
    }
}
