//! Address → location resolution with a TTL/LRU read cache.
//!
//! The directory is the authoritative map from [`crate::util::Address`] to
//! [`Location`]. Lookups hit a bounded cache first; misses consult the
//! store and repopulate the cache with a fresh TTL. A background tick
//! expires stale entries, and registrations are last-write-wins with change
//! notifications for observers.

pub mod cache;
pub mod store;

pub use cache::{CacheStats, TtlCache};
pub use store::{
    ChangeListener, Directory, DirectoryChange, DirectoryConfig, DirectoryStats,
    DirectorySubscription, Location, Transport,
};
