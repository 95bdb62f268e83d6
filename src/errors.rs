//! Publish error types
//!
//! Every failure in the crate is a `PublishError`: one error shape tagged
//! with a kind from a fixed enumeration. The kind decides three things:
//! the human-readable name shown by the CLI, the process exit code, and
//! whether the transaction retry loop may try again.

use std::fmt;

use thiserror::Error;

/// Result type for publish operations
pub type PublishResult<T> = Result<T, PublishError>;

/// Well-known failure kinds that are usually caught and handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unclassified failure
    Unspecified,
    /// Invalid input (tag names, hashes, template specs)
    Input,
    /// Invalid command line invocation
    Invocation,
    /// Not owner of the repository
    Permission,
    /// The transaction was expected to be in the other state
    TransactionState,
    /// Cannot access the gateway secret key
    GatewayKey,
    /// Cannot reach the gateway endpoint
    LeaseHttp,
    /// Corrupted session token
    LeaseBody,
    /// Another active lease blocks the path
    LeaseBusy,
    /// The lease path does not exist
    LeaseNoEntry,
    /// The lease path is not a directory
    LeaseNoDir,
    /// The repository was not found on this machine
    RepositoryNotFound,
    /// The repository type does not match the requested operation
    RepositoryType,
    /// Unsupported layout revision, migration required
    LayoutRevision,
    /// The repository whitelist is expired
    WhitelistExpired,
    /// A required program or service was not found
    MissingDependency,
}

impl ErrorKind {
    /// Human-readable name, shown next to the message on the CLI
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Unspecified => "Unspecified error",
            ErrorKind::Input => "Invalid input",
            ErrorKind::Invocation => "Invocation error",
            ErrorKind::Permission => "Permission error",
            ErrorKind::TransactionState => "Transaction state incorrect",
            ErrorKind::GatewayKey => "Gateway key error",
            ErrorKind::LeaseHttp => "Cannot connect to gateway",
            ErrorKind::LeaseBody => "Corrupt session token",
            ErrorKind::LeaseBusy => "Lease path is busy",
            ErrorKind::LeaseNoEntry => "Lease path does not exist",
            ErrorKind::LeaseNoDir => "Lease path is not a directory",
            ErrorKind::RepositoryNotFound => "Repository missing",
            ErrorKind::RepositoryType => "Repository type incorrect",
            ErrorKind::LayoutRevision => "Unsupported layout revision",
            ErrorKind::WhitelistExpired => "Whitelist expired",
            ErrorKind::MissingDependency => "Missing dependency",
        }
    }

    /// Process exit code for this kind (errno-style values)
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::Unspecified => 22,       // EINVAL
            ErrorKind::Input => 22,             // EINVAL
            ErrorKind::Invocation => 22,        // EINVAL
            ErrorKind::Permission => 1,         // EPERM
            ErrorKind::TransactionState => 17,  // EEXIST
            ErrorKind::GatewayKey => 1,         // EPERM
            ErrorKind::LeaseHttp => 113,        // EHOSTUNREACH
            ErrorKind::LeaseBody => 1,          // EPERM
            ErrorKind::LeaseBusy => 16,         // EBUSY
            ErrorKind::LeaseNoEntry => 2,       // ENOENT
            ErrorKind::LeaseNoDir => 20,        // ENOTDIR
            ErrorKind::RepositoryNotFound => 2, // ENOENT
            ErrorKind::RepositoryType => 25,    // ENOTTY
            ErrorKind::LayoutRevision => 95,    // EOPNOTSUPP
            ErrorKind::WhitelistExpired => 116, // ESTALE
            ErrorKind::MissingDependency => 2,  // ENOENT
        }
    }

    /// Whether the transaction retry loop may try again on this kind.
    ///
    /// A state conflict means a concurrent local or remote writer holds the
    /// repository; a busy lease means the gateway is serving another writer.
    /// Both can clear up shortly. Everything else is fatal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::TransactionState | ErrorKind::LeaseBusy)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Publish error: a kind plus a human-readable message
#[derive(Debug, Clone, Error)]
#[error("{}: {message}", .kind.name())]
pub struct PublishError {
    /// Failure kind
    pub kind: ErrorKind,
    /// Human-readable message
    message: String,
}

impl PublishError {
    /// Create a new error with an explicit kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Unclassified failure
    pub fn unspecified(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unspecified, message)
    }

    /// Invalid input
    pub fn input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Input, message)
    }

    /// Invalid command line invocation
    pub fn invocation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invocation, message)
    }

    /// Missing write permission
    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permission, message)
    }

    /// Transaction state conflict
    pub fn transaction_state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransactionState, message)
    }

    /// Busy lease
    pub fn lease_busy(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LeaseBusy, message)
    }

    /// The failure kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The message without the kind prefix
    pub fn message(&self) -> &str {
        &self.message
    }
}
