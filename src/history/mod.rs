//! Tag history
//!
//! Named snapshots ("tags") of the repository: the tag record model and
//! name grammar, the keyed history store with its single-push persistence,
//! and the editor that validates and applies batched edits while a
//! transaction is open.

mod editor;
mod store;
mod tag;

pub use editor::TagHistoryEditor;
pub use store::{JsonTagStore, TagHistoryStore};
pub use tag::{check_tag_name, Channel, RepositoryTagInput, Tag, RESERVED_TAG_NAMES};
