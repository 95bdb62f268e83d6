//! caspub - transaction and tag coordination for content-addressed
//! repositories
//!
//! Coordinates mutating writes to an otherwise read-only, content-addressed
//! repository tree: mutually-exclusive writer transactions (external lease
//! plus an in-process state flag), bounded retry under contention, and a
//! validated, atomically-persisted history of named snapshots.

pub mod backoff;
pub mod catalog;
pub mod cli;
pub mod errors;
pub mod gateway;
pub mod history;
pub mod hooks;
pub mod mountpoint;
pub mod observability;
pub mod settings;
pub mod transaction;
