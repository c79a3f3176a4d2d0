//! Rate caching with TTL support.

use std::fmt::Display;
use std::hash::Hash;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;
use walletledger_common::CurrencyPair;

use crate::matrix::MarketRate;

/// Cached entry.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    cached_at: DateTime<Utc>,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            cached_at: Utc::now(),
            ttl,
        }
    }

    fn is_valid(&self) -> bool {
        Utc::now().signed_duration_since(self.cached_at) < self.ttl
    }
}

/// Configuration for the rate caches.
#[derive(Debug, Clone)]
pub struct RateCacheConfig {
    /// TTL for single-pair conversion rates.
    pub conversion_ttl: Duration,
    /// TTL for the full crypto x fiat listing.
    pub listing_ttl: Duration,
    /// TTL for a single currency quoted in every fiat.
    pub quote_ttl: Duration,
    /// Maximum number of entries per cache.
    pub max_entries: usize,
}

impl Default for RateCacheConfig {
    fn default() -> Self {
        Self {
            conversion_ttl: Duration::seconds(10),
            listing_ttl: Duration::seconds(30),
            quote_ttl: Duration::seconds(10),
            max_entries: 10_000,
        }
    }
}

impl RateCacheConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(secs) = std::env::var("RATE_CACHE_TTL_SECS") {
            if let Ok(secs) = secs.parse::<i64>() {
                config.conversion_ttl = Duration::seconds(secs);
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.conversion_ttl <= Duration::zero() {
            return Err("Conversion cache TTL must be positive".to_string());
        }
        if self.listing_ttl <= Duration::zero() || self.quote_ttl <= Duration::zero() {
            return Err("Quote cache TTL must be positive".to_string());
        }
        if self.max_entries == 0 {
            return Err("Cache max entries cannot be 0".to_string());
        }
        Ok(())
    }
}

/// Thread-safe key-value cache with per-entry expiry.
pub struct TtlCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    default_ttl: Duration,
    max_entries: usize,
}

/// Cache of single-pair market rates.
pub type RateCache = TtlCache<CurrencyPair, MarketRate>;

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Display,
    V: Clone,
{
    /// Create a cache whose entries live for `default_ttl`.
    pub fn new(default_ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
            max_entries,
        }
    }

    /// Get a value if present and not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        if let Some(entry) = self.entries.get(key) {
            if entry.is_valid() {
                debug!(key = %key, "Cache hit");
                return Some(entry.value.clone());
            }
            debug!(key = %key, "Cache entry expired");
            drop(entry);
            self.entries.remove(key);
        }

        debug!(key = %key, "Cache miss");
        None
    }

    /// Insert with the default TTL.
    pub fn insert(&self, key: K, value: V) {
        self.insert_with_ttl(key, value, self.default_ttl);
    }

    /// Insert with a custom TTL.
    ///
    /// A full cache first drops expired entries, then the oldest live ones.
    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.evict_expired();
            while self.entries.len() >= self.max_entries {
                let Some(oldest) = self.oldest_key() else {
                    break;
                };
                debug!(key = %oldest, "Evicting oldest cache entry");
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(key, CacheEntry::new(value, ttl));
    }

    fn oldest_key(&self) -> Option<K> {
        self.entries
            .iter()
            .min_by_key(|e| e.value().cached_at)
            .map(|e| e.key().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry.
    pub fn evict_expired(&self) {
        self.entries.retain(|_, entry| entry.is_valid());
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let total = self.entries.len();
        let valid = self.entries.iter().filter(|e| e.is_valid()).count();

        CacheStats {
            total_entries: total,
            valid_entries: valid,
            expired_entries: total.saturating_sub(valid),
        }
    }
}

impl RateCache {
    /// Create the conversion-rate cache from configuration.
    pub fn with_config(config: &RateCacheConfig) -> Self {
        Self::new(config.conversion_ttl, config.max_entries)
    }

    /// Cache a market rate under its own pair.
    pub fn insert_rate(&self, rate: MarketRate) {
        self.insert(rate.pair.clone(), rate);
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::thread::sleep;
    use std::time::Duration as StdDuration;
    use walletledger_common::Currency;

    fn make_rate(base: &str, quote: &str) -> MarketRate {
        MarketRate::new(
            CurrencyPair::new(Currency::new(base), Currency::new(quote)),
            dec!(36000),
            "TEST",
        )
    }

    #[test]
    fn test_cache_insert_and_get() {
        let cache = RateCache::with_config(&RateCacheConfig::default());
        let rate = make_rate("BTC", "USD");
        let pair = rate.pair.clone();

        cache.insert_rate(rate.clone());

        let cached = cache.get(&pair).unwrap();
        assert_eq!(cached.pair, pair);
        assert_eq!(cached.price, rate.price);
    }

    #[test]
    fn test_cache_miss() {
        let cache = RateCache::with_config(&RateCacheConfig::default());
        let pair = CurrencyPair::new(Currency::btc(), Currency::eur());

        assert!(cache.get(&pair).is_none());
    }

    #[test]
    fn test_cache_expiry() {
        let config = RateCacheConfig {
            conversion_ttl: Duration::milliseconds(50),
            ..Default::default()
        };
        let cache = RateCache::with_config(&config);
        let rate = make_rate("BTC", "USD");
        let pair = rate.pair.clone();

        cache.insert_rate(rate);
        assert!(cache.get(&pair).is_some());

        sleep(StdDuration::from_millis(60));

        assert!(cache.get(&pair).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stats_and_eviction() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::milliseconds(30), 100);
        cache.insert("short".to_string(), 1);
        cache.insert_with_ttl("long".to_string(), 2, Duration::seconds(60));

        sleep(StdDuration::from_millis(40));

        let stats = cache.stats();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.valid_entries, 1);
        assert_eq!(stats.expired_entries, 1);

        cache.evict_expired();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"long".to_string()), Some(2));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::seconds(60), 3);

        for i in 0..50u32 {
            cache.insert(format!("key-{}", i), i);
            sleep(StdDuration::from_millis(1));
            assert!(cache.len() <= 3);
        }

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(&"key-49".to_string()), Some(49));
        assert!(cache.get(&"key-0".to_string()).is_none());
    }

    #[test]
    fn test_replacing_a_key_keeps_other_entries() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::seconds(60), 2);
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);

        cache.insert("b".to_string(), 3);

        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert_eq!(cache.get(&"b".to_string()), Some(3));
    }

    #[test]
    fn test_config_validation() {
        assert!(RateCacheConfig::default().validate().is_ok());

        let config = RateCacheConfig {
            conversion_ttl: Duration::zero(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
