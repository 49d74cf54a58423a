//! ota-state: embedded state store for the OTA release backend.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for users, deployments, deployment versions, packages, package
//! diffs, package metrics, and deployment history.
//!
//! # Architecture
//!
//! Every record family lives in its own `u64`-keyed table holding a JSON
//! value. Ids come from a sequence table, so key order is insertion order and
//! "most recent first" is a reverse scan. Deployment names and keys have
//! index tables that enforce uniqueness.
//!
//! Multi-row mutations run through [`StateStore::transaction`], which commits
//! when the closure returns `Ok` and aborts otherwise.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

/// `.map_err(map_err!(Read))` wraps a backend error message in the named
/// [`StateError`](crate::StateError) variant.
macro_rules! map_err {
    ($variant:ident) => {
        |e| $crate::error::StateError::$variant(e.to_string())
    };
}

pub mod error;
mod rows;
pub mod store;
pub mod tables;
pub mod txn;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use txn::{PurgeReport, WriteTxn};
pub use types::*;
