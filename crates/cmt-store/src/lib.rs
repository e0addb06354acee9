#![deny(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! Persistent session records.
//!
//! One row per agent invocation. Opening the store repairs rows left in
//! `working` by a process that is no longer alive.

mod error;
pub mod process;
mod store;
mod types;

pub use error::StoreError;
pub use process::is_process_alive;
pub use process::kill_process;
pub use store::PRUNE_RETENTION_DAYS;
pub use store::SessionStore;
pub use types::Session;
pub use types::SessionStatus;
pub use types::TmuxLocation;
pub use types::WorkflowType;
