//! Tag history editing
//!
//! The editor assembles tag records from catalog state and applies batched
//! add/remove edits. Edits mutate the in-memory history first and persist
//! with a single push at the end; they are only allowed while a transaction
//! is open, since the push races with concurrent writers otherwise.

use super::store::TagHistoryStore;
use super::tag::{check_tag_name, Channel, RepositoryTagInput, Tag};
use crate::catalog::{CatalogHash, CatalogStore};
use crate::errors::{PublishError, PublishResult};
use crate::transaction::TransactionFlag;

/// Editor over a repository's tag history
pub struct TagHistoryEditor<'a> {
    flag: &'a TransactionFlag,
    catalog: &'a dyn CatalogStore,
    store: &'a mut dyn TagHistoryStore,
}

impl<'a> TagHistoryEditor<'a> {
    /// An editor bound to the coordinator's transaction flag, the catalog,
    /// and the history store. The flag is read-only here; only the
    /// coordinator mutates it.
    pub fn new(
        flag: &'a TransactionFlag,
        catalog: &'a dyn CatalogStore,
        store: &'a mut dyn TagHistoryStore,
    ) -> Self {
        Self {
            flag,
            catalog,
            store,
        }
    }

    /// Assemble a tag record from catalog state.
    ///
    /// Opens a read-only view at `root_hash` (the current head when `None`
    /// or null) and reads the snapshot's hash, size, revision and
    /// modification time. `branch` is taken verbatim; the channel derives
    /// from the raw input string: empty means trunk, a numeric string is a
    /// custom channel code. The returned tag is not persisted.
    pub fn make_tag(
        &self,
        input: &RepositoryTagInput,
        branch: &str,
        root_hash: Option<&CatalogHash>,
    ) -> PublishResult<Tag> {
        let view = self.catalog.open_view(root_hash)?;
        let info = view.root_info();

        let channel = if input.channel.is_empty() {
            Channel::Trunk
        } else {
            let code = input.channel.parse::<u32>().map_err(|_| {
                PublishError::input(format!("invalid channel: {}", input.channel))
            })?;
            Channel::Custom(code)
        };

        Ok(Tag {
            name: input.name.clone(),
            root_hash: info.root_hash,
            size: info.size_bytes,
            revision: info.revision,
            timestamp: info.last_modified,
            branch: branch.to_string(),
            channel,
            description: input.description.clone(),
        })
    }

    /// Apply a batch of tag additions and removals, then persist the
    /// history with one push.
    ///
    /// All adds are applied to the in-memory store before any remove is
    /// attempted. Removing a name that does not exist is silently skipped;
    /// a remove that fails on an existing name aborts the batch before the
    /// push, leaving the in-memory store ahead of disk until the caller
    /// retries. Both behaviors are load-bearing for callers and must not
    /// change.
    pub fn edit_tags(&mut self, add_tags: &[Tag], rm_tags: &[String]) -> PublishResult<()> {
        if !self.flag.is_set() {
            return Err(PublishError::transaction_state(
                "cannot edit tags outside transaction",
            ));
        }

        for tag in add_tags {
            check_tag_name(&tag.name)?;
            self.store.insert(tag.clone())?;
        }

        for name in rm_tags {
            check_tag_name(name)?;
            if self.store.exists(name) && !self.store.remove(name)? {
                return Err(PublishError::unspecified(format!(
                    "cannot remove tag {}",
                    name
                )));
            }
        }

        self.store.push()
    }
}
