//! Tag records and tag-name validation
//!
//! A tag is a named, persisted pointer to a catalog snapshot plus
//! descriptive metadata. Tag names share a namespace with the two
//! system-maintained names `trunk` and `trunk-previous`, which custom tags
//! may never use.

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogHash;
use crate::errors::{PublishError, PublishResult};

/// Names reserved for the system-maintained head tags
pub const RESERVED_TAG_NAMES: [&str; 2] = ["trunk", "trunk-previous"];

/// Classification of a tag: the mainline or a user-defined numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Trunk,
    Custom(u32),
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Trunk => write!(f, "trunk"),
            Channel::Custom(code) => write!(f, "channel-{}", code),
        }
    }
}

/// A named snapshot of the repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Unique, sanitized, non-empty name
    pub name: String,
    /// Content address of the tagged snapshot
    pub root_hash: CatalogHash,
    /// On-disk size of the tagged catalog, in bytes
    pub size: u64,
    /// Monotonic revision counter of the tagged snapshot
    pub revision: u64,
    /// Last modification time of the tagged snapshot
    pub timestamp: DateTime<Utc>,
    /// Branch the tag belongs to (empty for the default branch)
    pub branch: String,
    /// Channel classification
    pub channel: Channel,
    /// Free-form description
    pub description: String,
}

/// User-supplied tag fields, as they arrive from the command line. Consumed
/// by `TagHistoryEditor::make_tag`; never persisted directly.
#[derive(Debug, Clone, Default)]
pub struct RepositoryTagInput {
    pub name: String,
    /// Raw channel string: empty means trunk, a numeric string is a custom
    /// channel code
    pub channel: String,
    pub description: String,
}

fn tag_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9\-_.+@]+$").expect("static pattern"))
}

/// Validate a tag name: non-empty, not reserved, matching the tag-name
/// grammar (ASCII alphanumerics plus `- _ . + @`). Pure validation, no side
/// effects.
pub fn check_tag_name(name: &str) -> PublishResult<()> {
    if name.is_empty() {
        return Err(PublishError::input(
            "the empty string is not a valid tag name",
        ));
    }
    if RESERVED_TAG_NAMES.contains(&name) {
        return Err(PublishError::input(format!(
            "'{}' is not allowed as a custom tag name",
            name
        )));
    }
    if !tag_name_pattern().is_match(name) {
        return Err(PublishError::input(format!("invalid tag name: {}", name)));
    }
    Ok(())
}
