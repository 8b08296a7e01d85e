//! SQLite-backed storage of named, versioned cache stores.
//!
//! The storage holds any number of stores keyed by name; the proxy treats
//! the one named by its version tag as current and everything else as stale.
//!
//! - Request identity is `sha256(METHOD \n url)` plus the headers named by
//!   the stored response's `Vary`
//! - Deleting a store cascades to its entries
//! - Automatic schema migrations, WAL mode

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod stores;

pub use crate::Error;

pub use connection::CacheStorage;
pub use entries::{EntryInfo, Store};
