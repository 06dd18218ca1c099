// Layer 1: Standard library imports
use std::collections::HashMap;
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};

// Layer 3: Internal module imports
use super::store::Location;
use crate::util::Address;

/// Read-cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Entries evicted to make room (least-recently-used first)
    pub evictions: u64,
    /// Entries discarded because their TTL elapsed
    pub expired: u64,
    /// Entries discarded as invalid
    pub discarded: u64,
}

struct CacheEntry {
    location: Location,
    expires_at: DateTime<Utc>,
    last_used: DateTime<Utc>,
}

/// Bounded TTL cache with least-recently-used eviction.
///
/// Not thread-safe by itself; the [`super::Directory`] wraps it in a mutex.
/// Capacity overflow evicts the entry with the oldest `last_used` stamp;
/// expired or invalid entries are discarded on access so a poisoned cache
/// line can never fail a lookup.
pub struct TtlCache {
    entries: HashMap<Address, CacheEntry>,
    max_size: usize,
    ttl: Duration,
    stats: CacheStats,
}

impl TtlCache {
    /// Create a cache bounded to `max_size` entries with the given TTL.
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            max_size: max_size.max(1),
            ttl,
            stats: CacheStats::default(),
        }
    }

    /// Look up a cached location, refreshing its recency on hit.
    ///
    /// Expired or invalid entries are removed and reported as a miss so the
    /// caller re-consults the authoritative store.
    pub fn get(&mut self, address: &Address) -> Option<Location> {
        let now = Utc::now();

        let (expired, invalid) = match self.entries.get(address) {
            Some(entry) => (entry.expires_at <= now, !entry.location.is_valid()),
            None => return None,
        };

        if expired || invalid {
            self.entries.remove(address);
            if expired {
                self.stats.expired += 1;
            } else {
                self.stats.discarded += 1;
            }
            return None;
        }

        let entry = self.entries.get_mut(address)?;
        entry.last_used = now;
        Some(entry.location.clone())
    }

    /// Insert or refresh an entry, evicting the least-recently-used entry
    /// if the cache is full.
    pub fn insert(&mut self, address: Address, location: Location) {
        let now = Utc::now();

        if !self.entries.contains_key(&address) && self.entries.len() >= self.max_size {
            self.evict_lru();
        }

        let Ok(ttl) = chrono::Duration::from_std(self.ttl) else {
            return;
        };
        self.entries.insert(
            address,
            CacheEntry {
                location,
                expires_at: now + ttl,
                last_used: now,
            },
        );
    }

    /// Remove an entry (after unregistration).
    pub fn remove(&mut self, address: &Address) {
        self.entries.remove(address);
    }

    /// Drop every entry whose TTL has elapsed. Returns how many expired.
    pub fn evict_expired(&mut self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let expired = before - self.entries.len();
        self.stats.expired += expired as u64;
        expired
    }

    /// Current number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    fn evict_lru(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(address, _)| address.clone());

        if let Some(address) = victim {
            self.entries.remove(&address);
            self.stats.evictions += 1;
        }
    }
}
