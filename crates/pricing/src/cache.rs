//! Two-tier TTL cache for price quotes
//!
//! Current prices live under a short TTL keyed by mint; historical lookups
//! live under a long TTL keyed by (mint, minute bucket). The cache is an
//! explicit object injected into the resolver, and stale entries are
//! evicted lazily on lookup rather than by a background sweep, so its
//! lifetime and test-reset behavior are explicit.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use wallet_perf_core::PriceQuote;

/// Cache key across both tiers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    /// Current price of a mint
    Current(String),

    /// Historical price of a mint at a minute bucket
    Historical(String, i64),
}

struct CacheEntry {
    quote: PriceQuote,
    expires_at: Instant,
    inserted_at: Instant,
}

/// Cache statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceCacheStats {
    /// Lookups answered from the cache
    pub hits: u64,

    /// Lookups that missed or hit an expired entry
    pub misses: u64,

    /// Entries inserted
    pub insertions: u64,

    /// Entries evicted (expired on lookup or displaced when full)
    pub evictions: u64,

    /// Current entry count
    pub size: usize,
}

/// Two-tier TTL price cache
pub struct PriceCache {
    entries: DashMap<CacheKey, CacheEntry>,
    current_ttl: Duration,
    historical_ttl: Duration,
    max_entries: usize,
    stats: Mutex<PriceCacheStats>,
}

impl PriceCache {
    /// Create a cache with the given tier TTLs and capacity
    pub fn new(current_ttl: Duration, historical_ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            current_ttl,
            historical_ttl,
            max_entries,
            stats: Mutex::new(PriceCacheStats::default()),
        }
    }

    fn bucket(at: DateTime<Utc>) -> i64 {
        // Minute granularity keeps nearby lookups on one entry
        at.timestamp() / 60
    }

    /// Look up a current price
    pub fn get_current(&self, mint: &str) -> Option<PriceQuote> {
        self.get(CacheKey::Current(mint.to_string()))
    }

    /// Look up a historical price
    pub fn get_historical(&self, mint: &str, at: DateTime<Utc>) -> Option<PriceQuote> {
        self.get(CacheKey::Historical(mint.to_string(), Self::bucket(at)))
    }

    /// Store a current price under the short TTL
    pub fn put_current(&self, mint: &str, quote: PriceQuote) {
        self.put(CacheKey::Current(mint.to_string()), quote, self.current_ttl);
    }

    /// Store a historical price under the long TTL
    pub fn put_historical(&self, mint: &str, at: DateTime<Utc>, quote: PriceQuote) {
        self.put(
            CacheKey::Historical(mint.to_string(), Self::bucket(at)),
            quote,
            self.historical_ttl,
        );
    }

    /// Drop every entry (test reset)
    pub fn clear(&self) {
        self.entries.clear();
        self.stats.lock().size = 0;
    }

    /// Snapshot of cache statistics
    pub fn stats(&self) -> PriceCacheStats {
        let mut stats = self.stats.lock().clone();
        stats.size = self.entries.len();
        stats
    }

    fn get(&self, key: CacheKey) -> Option<PriceQuote> {
        let mut expired = false;
        let quote = match self.entries.get(&key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.quote.clone()),
            Some(_) => {
                expired = true;
                None
            }
            None => None,
        };

        if expired {
            self.entries.remove(&key);
        }

        let mut stats = self.stats.lock();
        if quote.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
            if expired {
                stats.evictions += 1;
            }
        }
        stats.size = self.entries.len();

        quote
    }

    fn put(&self, key: CacheKey, quote: PriceQuote, ttl: Duration) {
        if self.entries.len() >= self.max_entries {
            self.evict_oldest();
        }

        let now = Instant::now();
        self.entries.insert(
            key,
            CacheEntry {
                quote,
                expires_at: now + ttl,
                inserted_at: now,
            },
        );

        let mut stats = self.stats.lock();
        stats.insertions += 1;
        stats.size = self.entries.len();
    }

    /// Displace roughly 10% of entries, oldest insertions first
    fn evict_oldest(&self) {
        let evict_count = (self.max_entries / 10).max(1);

        let mut candidates: Vec<(CacheKey, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().inserted_at))
            .collect();
        candidates.sort_by(|a, b| a.1.cmp(&b.1));

        let mut evicted = 0u64;
        for (key, _) in candidates.into_iter().take(evict_count) {
            self.entries.remove(&key);
            evicted += 1;
        }

        let mut stats = self.stats.lock();
        stats.evictions += evicted;
        stats.size = self.entries.len();
    }
}
