//! JSON-manifest catalog store
//!
//! Single-host repositories keep a small JSON manifest next to the object
//! store: the head snapshot hash, an optional transaction base override,
//! and per-snapshot path tables. This is deliberately not a full catalog
//! engine; it implements exactly the `CatalogStore` surface the coordinator
//! and tag editor consume.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{parent_path, CatalogHash, CatalogStore, CatalogView, DirEntry, EntryKind, SnapshotInfo};
use crate::errors::{PublishError, PublishResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotRecord {
    size_bytes: u64,
    revision: u64,
    last_modified: DateTime<Utc>,
    paths: BTreeMap<String, EntryKind>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    head: CatalogHash,
    #[serde(default)]
    base: Option<CatalogHash>,
    snapshots: BTreeMap<String, SnapshotRecord>,
}

/// Read view over one snapshot record
struct JsonCatalogView {
    hash: CatalogHash,
    record: SnapshotRecord,
}

impl CatalogView for JsonCatalogView {
    fn lookup(&self, path: &str) -> Option<DirEntry> {
        self.record
            .paths
            .get(path)
            .map(|kind| DirEntry { kind: *kind })
    }

    fn root_info(&self) -> SnapshotInfo {
        SnapshotInfo {
            root_hash: self.hash.clone(),
            size_bytes: self.record.size_bytes,
            revision: self.record.revision,
            last_modified: self.record.last_modified,
        }
    }
}

/// Catalog store backed by a JSON manifest file
#[derive(Debug)]
pub struct JsonCatalogStore {
    path: PathBuf,
    manifest: Manifest,
}

impl JsonCatalogStore {
    /// Load an existing manifest.
    pub fn load(path: &Path) -> PublishResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PublishError::new(
                crate::errors::ErrorKind::RepositoryNotFound,
                format!("cannot read catalog manifest {}: {}", path.display(), e),
            )
        })?;
        let manifest: Manifest = serde_json::from_str(&content)
            .map_err(|e| PublishError::unspecified(format!("corrupt catalog manifest: {}", e)))?;
        Ok(Self {
            path: path.to_path_buf(),
            manifest,
        })
    }

    /// Create a fresh manifest with an empty root snapshot and persist it.
    pub fn create(path: &Path) -> PublishResult<Self> {
        let mut paths = BTreeMap::new();
        paths.insert("/".to_string(), EntryKind::Dir);
        let record = SnapshotRecord {
            size_bytes: 0,
            revision: 1,
            last_modified: Utc::now(),
            paths,
        };
        let hash = Self::record_hash(&record)?;
        let mut snapshots = BTreeMap::new();
        snapshots.insert(hash.to_hex().to_string(), record);
        let store = Self {
            path: path.to_path_buf(),
            manifest: Manifest {
                head: hash,
                base: None,
                snapshots,
            },
        };
        store.persist()?;
        Ok(store)
    }

    /// Register a directory path (and its ancestors) in a new head snapshot.
    /// Test and bootstrap helper for populating single-host repositories.
    pub fn add_directory(&mut self, path: &str) -> PublishResult<CatalogHash> {
        let mut record = self.head_record()?.clone();
        let mut current = path.to_string();
        loop {
            record.paths.insert(current.clone(), EntryKind::Dir);
            if current == "/" {
                break;
            }
            current = parent_path(&current);
        }
        record.revision += 1;
        record.last_modified = Utc::now();
        let hash = Self::record_hash(&record)?;
        self.manifest
            .snapshots
            .insert(hash.to_hex().to_string(), record);
        self.manifest.head = hash.clone();
        self.persist()?;
        Ok(hash)
    }

    fn head_record(&self) -> PublishResult<&SnapshotRecord> {
        self.record_of(&self.manifest.head)
    }

    fn record_of(&self, hash: &CatalogHash) -> PublishResult<&SnapshotRecord> {
        self.manifest.snapshots.get(hash.to_hex()).ok_or_else(|| {
            PublishError::input(format!("no such snapshot: {}", hash))
        })
    }

    fn record_hash(record: &SnapshotRecord) -> PublishResult<CatalogHash> {
        let bytes = serde_json::to_vec(record)
            .map_err(|e| PublishError::unspecified(format!("cannot serialize snapshot: {}", e)))?;
        Ok(CatalogHash::digest_of(&bytes))
    }

    fn persist(&self) -> PublishResult<()> {
        let content = serde_json::to_string_pretty(&self.manifest)
            .map_err(|e| PublishError::unspecified(format!("cannot serialize manifest: {}", e)))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, content)
            .map_err(|e| PublishError::unspecified(format!("cannot write manifest: {}", e)))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| PublishError::unspecified(format!("cannot persist manifest: {}", e)))?;
        Ok(())
    }
}

impl CatalogStore for JsonCatalogStore {
    fn open_view(&self, root_hash: Option<&CatalogHash>) -> PublishResult<Box<dyn CatalogView>> {
        let hash = match root_hash {
            Some(h) if !h.is_null() => h.clone(),
            _ => self.manifest.base.clone().unwrap_or_else(|| self.manifest.head.clone()),
        };
        let record = self.record_of(&hash)?.clone();
        Ok(Box::new(JsonCatalogView { hash, record }))
    }

    fn head(&self) -> PublishResult<CatalogHash> {
        Ok(self.manifest.head.clone())
    }

    fn clone_tree(&mut self, from: &str, to: &str) -> PublishResult<CatalogHash> {
        let head = self.head_record()?.clone();

        match head.paths.get(from) {
            Some(EntryKind::Dir) => {}
            Some(_) => {
                return Err(PublishError::input(format!(
                    "template source {} is not a directory",
                    from
                )))
            }
            None => {
                return Err(PublishError::input(format!(
                    "template source {} does not exist",
                    from
                )))
            }
        }
        let dest_parent = parent_path(to);
        match head.paths.get(dest_parent.as_str()) {
            Some(EntryKind::Dir) => {}
            _ => {
                return Err(PublishError::input(format!(
                    "template destination parent {} does not exist",
                    dest_parent
                )))
            }
        }
        if head.paths.contains_key(to) {
            return Err(PublishError::input(format!(
                "template destination {} already exists",
                to
            )));
        }

        let mut record = head;
        let prefix = format!("{}/", from);
        let mapped: Vec<(String, EntryKind)> = record
            .paths
            .iter()
            .filter_map(|(path, kind)| {
                if path == from {
                    Some((to.to_string(), *kind))
                } else if let Some(rest) = path.strip_prefix(&prefix) {
                    Some((format!("{}/{}", to, rest), *kind))
                } else {
                    None
                }
            })
            .collect();
        for (path, kind) in mapped {
            record.paths.insert(path, kind);
        }
        record.revision += 1;
        record.last_modified = Utc::now();

        let hash = Self::record_hash(&record)?;
        self.manifest
            .snapshots
            .insert(hash.to_hex().to_string(), record);
        self.persist()?;
        Ok(hash)
    }

    fn set_base_hash(&mut self, base: &CatalogHash) -> PublishResult<()> {
        // Unknown hashes are refused so the read view can never be
        // re-rooted onto a snapshot the store cannot serve.
        self.record_of(base)?;
        self.manifest.base = Some(base.clone());
        self.persist()
    }
}
