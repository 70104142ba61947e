//! The two-tier result cache.
//!
//! Tier 1 lives in memory and is keyed by the identity of an asset's content
//! allocation. Tier 2 is optional and persistent, keyed by a digest of
//! everything the output depends on.
pub use cache_keys::*;
pub use identity_map::*;
pub use persistent::*;
pub use stats::*;
pub use task_cache::*;

mod cache_keys;
mod identity_map;
mod persistent;
mod stats;
mod task_cache;
