//! Tag history store
//!
//! The store keeps the tag history in memory and persists it with a single
//! explicit `push` call; inserts and removes alone never touch disk. The
//! JSON implementation writes temp-then-rename so a crashed push leaves the
//! previous history intact.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::tag::Tag;
use crate::errors::{PublishError, PublishResult};

/// Keyed store of tag records
pub trait TagHistoryStore {
    /// Whether a tag with this name exists.
    fn exists(&self, name: &str) -> bool;

    /// Insert a tag. An existing tag of the same name is replaced.
    fn insert(&mut self, tag: Tag) -> PublishResult<()>;

    /// Remove a tag by name. Returns false if no such tag existed.
    fn remove(&mut self, name: &str) -> PublishResult<bool>;

    /// Look up a tag by name.
    fn get(&self, name: &str) -> Option<&Tag>;

    /// All tags, ordered by name.
    fn list(&self) -> Vec<&Tag>;

    /// Persist the in-memory history in one operation.
    fn push(&mut self) -> PublishResult<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryDocument {
    tags: BTreeMap<String, Tag>,
}

/// Tag history persisted as a JSON document
#[derive(Debug)]
pub struct JsonTagStore {
    path: PathBuf,
    document: HistoryDocument,
}

impl JsonTagStore {
    /// Open the history at `path`, starting empty if the file does not
    /// exist yet.
    pub fn open(path: &Path) -> PublishResult<Self> {
        let document = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                PublishError::unspecified(format!(
                    "cannot read tag history {}: {}",
                    path.display(),
                    e
                ))
            })?;
            serde_json::from_str(&content)
                .map_err(|e| PublishError::unspecified(format!("corrupt tag history: {}", e)))?
        } else {
            HistoryDocument::default()
        };
        Ok(Self {
            path: path.to_path_buf(),
            document,
        })
    }
}

impl TagHistoryStore for JsonTagStore {
    fn exists(&self, name: &str) -> bool {
        self.document.tags.contains_key(name)
    }

    fn insert(&mut self, tag: Tag) -> PublishResult<()> {
        self.document.tags.insert(tag.name.clone(), tag);
        Ok(())
    }

    fn remove(&mut self, name: &str) -> PublishResult<bool> {
        Ok(self.document.tags.remove(name).is_some())
    }

    fn get(&self, name: &str) -> Option<&Tag> {
        self.document.tags.get(name)
    }

    fn list(&self) -> Vec<&Tag> {
        self.document.tags.values().collect()
    }

    fn push(&mut self) -> PublishResult<()> {
        let content = serde_json::to_string_pretty(&self.document)
            .map_err(|e| PublishError::unspecified(format!("cannot serialize tag history: {}", e)))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, content).map_err(|e| {
            PublishError::unspecified(format!("cannot write tag history: {}", e))
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            PublishError::unspecified(format!("cannot persist tag history: {}", e))
        })?;
        Ok(())
    }
}
