//! Session token codec
//!
//! A lease is represented on disk by a session token: a base64-wrapped JSON
//! record carrying the token identity, the leased path scope, and the
//! expiry. Any decode or shape failure is reported as a corrupt session
//! token, which the coordinator treats as fatal.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ErrorKind, PublishError, PublishResult};

/// An issued write-lease token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    /// Unique token identity; drop checks ownership against it
    pub token_id: Uuid,
    /// Leased path scope ("" leases the whole repository)
    pub path: String,
    /// Expiry instant; an expired token no longer blocks other writers
    pub expiry: DateTime<Utc>,
}

impl SessionToken {
    /// Issue a fresh token for `path`, valid for `valid_s` seconds.
    pub fn issue(path: &str, valid_s: i64) -> Self {
        Self {
            token_id: Uuid::new_v4(),
            path: path.to_string(),
            expiry: Utc::now() + Duration::seconds(valid_s),
        }
    }

    /// Encode for storage in a token file.
    pub fn encode(&self) -> PublishResult<String> {
        let json = serde_json::to_vec(self).map_err(|e| {
            PublishError::unspecified(format!("cannot serialize session token: {}", e))
        })?;
        Ok(BASE64.encode(json))
    }

    /// Decode a stored token. Anything that does not round-trip through
    /// base64 + JSON is a corrupt session token.
    pub fn decode(raw: &str) -> PublishResult<Self> {
        let bytes = BASE64.decode(raw.trim()).map_err(|e| {
            PublishError::new(ErrorKind::LeaseBody, format!("corrupt session token: {}", e))
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            PublishError::new(ErrorKind::LeaseBody, format!("corrupt session token: {}", e))
        })
    }

    /// Whether the token has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expiry
    }

    /// Extend the expiry by `valid_s` seconds from now (keep-alive).
    pub fn renew(&mut self, valid_s: i64) {
        self.expiry = Utc::now() + Duration::seconds(valid_s);
    }
}
