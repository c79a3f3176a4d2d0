//! Rate provider trait and test double.

use async_trait::async_trait;
use walletledger_common::Currency;

use crate::error::FxResult;
use crate::matrix::PriceMatrix;

/// A source of market prices.
///
/// Providers are batch-shaped: one call prices every currency in `from`
/// in every currency in `to`. Pairs the provider has no market for are left
/// out of the returned matrix; a provider that recognises none of the
/// symbols returns [`FxError::MarketNotFound`](crate::FxError::MarketNotFound).
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Fetch prices for every `from x to` combination.
    async fn fetch(&self, from: &[Currency], to: &[Currency]) -> FxResult<PriceMatrix>;
}

#[cfg(any(test, feature = "test-utils"))]
mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use dashmap::DashMap;
    use parking_lot::Mutex;
    use rust_decimal::Decimal;
    use walletledger_common::{Currency, CurrencyPair};

    use super::RateProvider;
    use crate::error::{FxError, FxResult};
    use crate::matrix::PriceMatrix;

    /// In-memory provider with settable prices and injectable failures.
    pub struct MockRateProvider {
        name: String,
        prices: DashMap<CurrencyPair, Decimal>,
        failure: Mutex<Option<FxError>>,
        delay: Mutex<Option<Duration>>,
        calls: AtomicUsize,
    }

    impl MockRateProvider {
        /// Create a new mock provider.
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                prices: DashMap::new(),
                failure: Mutex::new(None),
                delay: Mutex::new(None),
                calls: AtomicUsize::new(0),
            }
        }

        /// Set the price of one `from` unit in `to`.
        pub fn set_price(&self, from: Currency, to: Currency, price: Decimal) {
            self.prices.insert(CurrencyPair::new(from, to), price);
        }

        /// Make every following fetch fail with `err`.
        pub fn fail_with(&self, err: FxError) {
            *self.failure.lock() = Some(err);
        }

        /// Stop failing.
        pub fn recover(&self) {
            *self.failure.lock() = None;
        }

        /// Sleep this long inside every fetch.
        pub fn set_delay(&self, delay: Duration) {
            *self.delay.lock() = Some(delay);
        }

        /// Number of fetches served so far, failed ones included.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RateProvider for MockRateProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn fetch(&self, from: &[Currency], to: &[Currency]) -> FxResult<PriceMatrix> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            let delay = *self.delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            if let Some(err) = self.failure.lock().clone() {
                return Err(err);
            }

            let mut matrix = PriceMatrix::new();
            for base in from {
                for quote in to {
                    let pair = CurrencyPair::new(base.clone(), quote.clone());
                    if let Some(price) = self.prices.get(&pair) {
                        matrix.insert(base.clone(), quote.clone(), *price);
                    }
                }
            }

            if matrix.is_empty() {
                let symbols: Vec<&str> = from.iter().map(|c| c.code()).collect();
                return Err(FxError::MarketNotFound(symbols.join(",")));
            }

            Ok(matrix)
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockRateProvider;
