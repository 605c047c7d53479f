//! Registry of compiled units keyed by integer id.
//!
//! The cache only holds [`std::sync::Weak`] references: a unit stays alive
//! exactly as long as something else owns an `Arc` to it. Dead entries stay
//! listed until the next compaction sweep or an explicit reset.

pub mod error;
pub mod unit_cache;

pub use error::CacheError;
pub use unit_cache::{CacheStats, UnitCache, UnitId};
