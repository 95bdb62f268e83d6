//! Content-address hash for catalog snapshots

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{PublishError, PublishResult};

/// Suffix character tagging a hash as a catalog object
pub const CATALOG_SUFFIX: char = 'C';

const NULL_HEX: &str = "0000000000000000000000000000000000000000";

/// Content address of a catalog snapshot: a lowercase hex digest tagged
/// with the catalog object suffix.
///
/// Both 160-bit and 256-bit digests are accepted on parse; hashes computed
/// locally are SHA-256.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogHash {
    hex: String,
}

impl CatalogHash {
    /// Parse a bare hex digest string. Rejects anything that is not 40 or
    /// 64 lowercase hex characters.
    pub fn from_hex(hex: &str) -> PublishResult<Self> {
        let valid_len = hex.len() == 40 || hex.len() == 64;
        let valid_chars = hex
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if !valid_len || !valid_chars {
            return Err(PublishError::input(format!("invalid hash: {}", hex)));
        }
        Ok(Self {
            hex: hex.to_string(),
        })
    }

    /// The all-zero placeholder hash.
    pub fn null() -> Self {
        Self {
            hex: NULL_HEX.to_string(),
        }
    }

    /// Whether this is the all-zero placeholder.
    pub fn is_null(&self) -> bool {
        self.hex.chars().all(|c| c == '0')
    }

    /// SHA-256 digest of arbitrary content, tagged as a catalog hash.
    pub fn digest_of(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        Self {
            hex: format!("{:x}", hasher.finalize()),
        }
    }

    /// Bare hex digest, without the suffix.
    pub fn to_hex(&self) -> &str {
        &self.hex
    }

    /// Suffixed form used in object store paths and logs.
    pub fn to_suffixed(&self) -> String {
        format!("{}{}", self.hex, CATALOG_SUFFIX)
    }
}

impl fmt::Display for CatalogHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_suffixed())
    }
}
