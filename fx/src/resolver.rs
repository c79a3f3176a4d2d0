//! Rate resolver: cached market-rate lookups over a provider.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};
use walletledger_common::{Currency, CurrencyPair};

use crate::cache::{CacheStats, RateCache, RateCacheConfig};
use crate::error::{FxError, FxResult};
use crate::matrix::{MarketRate, PriceMatrix};
use crate::provider::RateProvider;

/// Configuration for the rate resolver.
#[derive(Debug, Clone)]
pub struct RateResolverConfig {
    /// Cache configuration.
    pub cache: RateCacheConfig,
    /// Whether to use cached rates.
    pub use_cache: bool,
}

impl Default for RateResolverConfig {
    fn default() -> Self {
        Self {
            cache: RateCacheConfig::default(),
            use_cache: true,
        }
    }
}

/// Resolves market prices, caching single-pair lookups per pair.
///
/// Concurrent misses on the same pair may each reach the provider; the
/// last answer wins the cache slot.
pub struct RateResolver {
    provider: Arc<dyn RateProvider>,
    cache: RateCache,
    config: RateResolverConfig,
}

impl RateResolver {
    /// Create a new resolver with the given provider.
    pub fn new(provider: Arc<dyn RateProvider>, config: RateResolverConfig) -> Self {
        Self {
            provider,
            cache: RateCache::with_config(&config.cache),
            config,
        }
    }

    /// Get the current rate for a currency pair.
    #[instrument(skip(self), fields(pair = %pair))]
    pub async fn get_rate(&self, pair: &CurrencyPair) -> FxResult<MarketRate> {
        if pair.base == pair.quote {
            return Ok(MarketRate::new(pair.clone(), Decimal::ONE, "identity"));
        }

        if self.config.use_cache {
            if let Some(cached) = self.cache.get(pair) {
                debug!("Using cached rate");
                return Ok(cached);
            }
        }

        let matrix = self
            .provider
            .fetch(std::slice::from_ref(&pair.base), std::slice::from_ref(&pair.quote))
            .await
            .map_err(|e| {
                warn!(error = %e, "Rate lookup failed");
                e
            })?;

        let price = matrix
            .get(&pair.base, &pair.quote)
            .ok_or_else(|| FxError::RateNotAvailable(pair.clone()))?;
        if price <= Decimal::ZERO {
            return Err(FxError::InvalidResponse(format!(
                "non-positive price {} for {}",
                price, pair
            )));
        }

        let rate = MarketRate::new(pair.clone(), price, self.provider.name());
        if self.config.use_cache {
            self.cache.insert_rate(rate.clone());
        }

        Ok(rate)
    }

    /// Price of one unit of `from` expressed in `to`.
    pub async fn convert(&self, from: &Currency, to: &Currency) -> FxResult<Decimal> {
        let pair = CurrencyPair::new(from.clone(), to.clone());
        Ok(self.get_rate(&pair).await?.price)
    }

    /// Price every `from` currency in every `to` currency with one upstream call.
    ///
    /// Always goes to the provider; the answer refreshes the per-pair cache.
    #[instrument(skip(self, from, to), fields(from = from.len(), to = to.len()))]
    pub async fn convert_batch(&self, from: &[Currency], to: &[Currency]) -> FxResult<PriceMatrix> {
        let matrix = self.provider.fetch(from, to).await.map_err(|e| {
            warn!(error = %e, "Batch rate lookup failed");
            e
        })?;

        if self.config.use_cache {
            let source = self.provider.name();
            for (pair, price) in matrix.iter() {
                if price > Decimal::ZERO {
                    self.cache.insert_rate(MarketRate::new(pair, price, source));
                }
            }
        }

        Ok(matrix)
    }

    /// Name of the underlying provider.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Clean up expired cache entries.
    pub fn cleanup(&self) {
        self.cache.evict_expired();
    }
}
