//! Cache-related MCP tools.
//!
//! Read-only views of the stores plus an explicit purge, for hosts that need
//! to inspect or reset what the proxy has written.

pub mod keys;
pub mod lookup;
pub mod purge;

pub use keys::{CacheKeysParams, keys_impl};
pub use lookup::{CacheMatchParams, match_impl};
pub use purge::{CachePurgeParams, purge_impl};
