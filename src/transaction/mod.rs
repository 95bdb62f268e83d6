//! Transaction lifecycle
//!
//! Opening a transaction makes the repository writable for exactly one
//! writer: the in-process state flag rejects reentrant opens, the lease
//! rejects concurrent writers elsewhere, and the managed mountpoint pins
//! the read view while writes are staged. The coordinator drives the whole
//! sequence, including retry under contention.

mod coordinator;
mod spool;
mod state;

pub use coordinator::{Coordinator, CoordinatorConfig};
pub use spool::{SpoolArea, Spoolers};
pub use state::TransactionFlag;
