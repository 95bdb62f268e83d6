//! Spool area handling
//!
//! The spool area is the writer-local working storage where new catalog
//! content is assembled before being committed: a scratch directory for
//! staged writes, a tmp directory for in-flight files, and a cache for
//! downloaded objects. The upload pipeline that drains it lives elsewhere;
//! the coordinator only initializes the layout and hands out spooler
//! handles over it.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{PublishError, PublishResult};

/// Write-side staging handles, constructed per transaction
#[derive(Debug)]
pub struct Spoolers {
    pub scratch_dir: PathBuf,
    pub tmp_dir: PathBuf,
}

/// Writer-local staging storage
#[derive(Debug)]
pub struct SpoolArea {
    root: PathBuf,
}

impl SpoolArea {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.root.join("scratch")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    /// Create the staging layout. Called at the start of every transaction
    /// attempt; existing directories are left in place.
    pub fn init(&self) -> PublishResult<()> {
        for dir in [self.scratch_dir(), self.tmp_dir(), self.cache_dir()] {
            fs::create_dir_all(&dir).map_err(|e| {
                PublishError::unspecified(format!(
                    "cannot initialize spool area {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Construct the staging handles for an open transaction. Fails if the
    /// layout went missing between init and construction.
    pub fn construct_spoolers(&self) -> PublishResult<Spoolers> {
        let scratch_dir = self.scratch_dir();
        let tmp_dir = self.tmp_dir();
        for dir in [&scratch_dir, &tmp_dir] {
            if !dir.is_dir() {
                return Err(PublishError::unspecified(format!(
                    "spool area {} is missing",
                    dir.display()
                )));
            }
        }
        Ok(Spoolers {
            scratch_dir,
            tmp_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_layout() {
        let dir = TempDir::new().unwrap();
        let spool = SpoolArea::new(&dir.path().join("spool"));
        spool.init().unwrap();
        assert!(spool.scratch_dir().is_dir());
        assert!(spool.tmp_dir().is_dir());
        assert!(spool.cache_dir().is_dir());
        // Idempotent
        spool.init().unwrap();
    }

    #[test]
    fn test_spoolers_require_initialized_layout() {
        let dir = TempDir::new().unwrap();
        let spool = SpoolArea::new(&dir.path().join("spool"));
        assert!(spool.construct_spoolers().is_err());
        spool.init().unwrap();
        assert!(spool.construct_spoolers().is_ok());
    }
}
