//! Cache Module
//!
//! In-memory byte cache for fully produced response bodies, bounded by entry
//! count and total size, with inactivity expiry and LRU eviction.

mod entry;
mod lru;
mod shared;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use shared::ByteCache;
pub use stats::CacheStats;
pub use store::CacheStore;
