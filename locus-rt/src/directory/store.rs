// Layer 1: Standard library imports
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

// Layer 3: Internal module imports
use super::cache::{CacheStats, TtlCache};
use crate::util::{duration_serde, Address};

/// How envelopes reach an actor at a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transport {
    /// Same-process delivery through the local mailbox registry
    Local,

    /// Delivery via a worker transport
    Worker,

    /// Delivery via a remote transport
    Remote,
}

/// Where an actor lives: a node name plus the transport that reaches it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Node hosting the actor
    pub node: String,

    /// Transport used to reach the node
    pub transport: Transport,
}

impl Location {
    /// Local in-process location on the given node.
    pub fn local(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            transport: Transport::Local,
        }
    }

    /// Remote location on the given node.
    pub fn remote(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            transport: Transport::Remote,
        }
    }

    /// Sanity check used by the cache: a location without a node name is
    /// corrupt and must be discarded rather than served.
    pub fn is_valid(&self) -> bool {
        !self.node.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn invalid_for_tests() -> Self {
        Self {
            node: String::new(),
            transport: Transport::Local,
        }
    }
}

/// Directory configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Maximum entries in the read cache
    pub max_cache_size: usize,

    /// Cache entry time-to-live
    #[serde(with = "duration_serde")]
    pub cache_ttl: Duration,

    /// Interval of the background expiry tick
    #[serde(with = "duration_serde")]
    pub cleanup_interval: Duration,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            max_cache_size: 1024,
            cache_ttl: Duration::from_secs(30),
            cleanup_interval: Duration::from_secs(5),
        }
    }
}

/// A change observed on the directory.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectoryChange {
    /// An address was registered or re-registered (last-write-wins)
    Registered {
        /// Registered address
        address: Address,
        /// Its new location
        location: Location,
    },

    /// An address was removed
    Unregistered {
        /// Removed address
        address: Address,
    },
}

/// Listener invoked for each directory change.
pub type ChangeListener = Arc<dyn Fn(&DirectoryChange) + Send + Sync>;

/// Read-only directory counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryStats {
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that consulted the authoritative store
    pub misses: u64,
    /// Registered addresses
    pub entries: usize,
    /// Current cache occupancy
    pub cache_size: usize,
    /// Cache eviction/expiry counters
    pub cache: CacheStats,
}

impl DirectoryStats {
    /// Cache hit rate over all lookups, in `[0, 1]`.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Handle for a change subscription; call `unsubscribe` to remove it.
pub struct DirectorySubscription {
    directory: Weak<DirectoryInner>,
    id: u64,
}

impl DirectorySubscription {
    /// Remove the listener.
    pub fn unsubscribe(self) {
        if let Some(inner) = self.directory.upgrade() {
            inner.listeners.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

struct DirectoryInner {
    store: DashMap<Address, Location>,
    cache: Mutex<TtlCache>,
    listeners: Mutex<Vec<(u64, ChangeListener)>>,
    hits: AtomicU64,
    misses: AtomicU64,
    next_listener_id: AtomicU64,
}

/// Address → location directory with a TTL/LRU read cache.
///
/// # Example
/// ```rust
/// use locus_rt::directory::{Directory, DirectoryConfig, Location};
/// use locus_rt::util::Address;
///
/// let directory = Directory::new(DirectoryConfig::default());
/// let addr = Address::new("local", "worker", "w-1").unwrap();
///
/// directory.register(addr.clone(), Location::local("local"));
/// assert_eq!(directory.lookup(&addr), Some(Location::local("local")));
///
/// directory.unregister(&addr);
/// assert_eq!(directory.lookup(&addr), None);
/// ```
#[derive(Clone)]
pub struct Directory {
    inner: Arc<DirectoryInner>,
    config: DirectoryConfig,
}

impl Directory {
    /// Create an empty directory.
    pub fn new(config: DirectoryConfig) -> Self {
        Self {
            inner: Arc::new(DirectoryInner {
                store: DashMap::new(),
                cache: Mutex::new(TtlCache::new(config.max_cache_size, config.cache_ttl)),
                listeners: Mutex::new(Vec::new()),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                next_listener_id: AtomicU64::new(1),
            }),
            config,
        }
    }

    /// Register an address. Duplicate registration overwrites the previous
    /// location (last-write-wins) and still notifies listeners.
    pub fn register(&self, address: Address, location: Location) {
        self.inner.store.insert(address.clone(), location.clone());
        self.inner.cache.lock().insert(address.clone(), location.clone());
        debug!(address = %address, ?location, "directory register");
        self.notify(&DirectoryChange::Registered { address, location });
    }

    /// Remove an address. Returns whether it was present.
    pub fn unregister(&self, address: &Address) -> bool {
        let removed = self.inner.store.remove(address).is_some();
        self.inner.cache.lock().remove(address);
        if removed {
            debug!(address = %address, "directory unregister");
            self.notify(&DirectoryChange::Unregistered {
                address: address.clone(),
            });
        }
        removed
    }

    /// Resolve an address to its location.
    ///
    /// Cache hit path is lock-then-return; a miss consults the store and
    /// repopulates the cache with a fresh TTL.
    pub fn lookup(&self, address: &Address) -> Option<Location> {
        if let Some(location) = self.inner.cache.lock().get(address) {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            return Some(location);
        }

        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        let location = self.inner.store.get(address).map(|e| e.value().clone())?;
        self.inner
            .cache
            .lock()
            .insert(address.clone(), location.clone());
        Some(location)
    }

    /// All registered addresses with the given type segment.
    pub fn list_by_type(&self, kind: &str) -> Vec<Address> {
        self.inner
            .store
            .iter()
            .filter(|entry| entry.key().kind() == kind)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Every registered address/location pair.
    pub fn get_all(&self) -> Vec<(Address, Location)> {
        self.inner
            .store
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Subscribe to registration changes.
    pub fn subscribe_to_changes(&self, listener: ChangeListener) -> DirectorySubscription {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, listener));
        DirectorySubscription {
            directory: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Counter snapshot.
    pub fn stats(&self) -> DirectoryStats {
        let cache = self.inner.cache.lock();
        DirectoryStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            entries: self.inner.store.len(),
            cache_size: cache.len(),
            cache: cache.stats(),
        }
    }

    /// Drop expired cache entries. Returns how many expired.
    pub fn evict_expired(&self) -> usize {
        self.inner.cache.lock().evict_expired()
    }

    /// Spawn the background expiry tick on the current tokio runtime.
    ///
    /// The task runs until aborted (the system aborts it on stop).
    pub fn spawn_cleanup(&self) -> JoinHandle<()> {
        let directory = self.clone();
        let interval = self.config.cleanup_interval;
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tick.tick().await;
                let expired = directory.evict_expired();
                if expired > 0 {
                    debug!(expired, "directory cache expiry tick");
                }
            }
        })
    }

    fn notify(&self, change: &DirectoryChange) {
        let snapshot: Vec<ChangeListener> = {
            let listeners = self.inner.listeners.lock();
            listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(change))).is_err() {
                warn!("directory change listener panicked; isolated");
            }
        }
    }
}
