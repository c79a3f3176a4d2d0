//! Market quote listings.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use walletledger_common::{Currency, Result, WalletError};
use walletledger_fx::{FxError, RateCacheConfig, RateResolver, TtlCache};
use walletledger_ledger::CurrencyRegistry;

const LISTING_KEY: &str = "crypto/fiat";

/// One currency priced in every fiat currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub currency: Currency,
    /// Fiat symbol to price of one `currency` unit.
    pub prices: BTreeMap<Currency, Decimal>,
    pub quoted_at: DateTime<Utc>,
}

/// Read-only market views over the rate resolver.
pub struct MarketService {
    registry: Arc<CurrencyRegistry>,
    rates: Arc<RateResolver>,
    listing: TtlCache<String, Vec<Quote>>,
    quotes: TtlCache<Currency, Quote>,
}

impl MarketService {
    pub fn new(
        registry: Arc<CurrencyRegistry>,
        rates: Arc<RateResolver>,
        cache: &RateCacheConfig,
    ) -> Self {
        Self {
            registry,
            rates,
            listing: TtlCache::new(cache.listing_ttl, 1),
            quotes: TtlCache::new(cache.quote_ttl, cache.max_entries),
        }
    }

    /// Every registered crypto currency priced in every registered fiat.
    ///
    /// Cryptos the feed has no prices for are left out.
    #[instrument(skip(self))]
    pub async fn list_quotes(&self) -> Result<Vec<Quote>> {
        if let Some(cached) = self.listing.get(&LISTING_KEY.to_string()) {
            return Ok(cached);
        }

        let crypto: Vec<Currency> = self
            .registry
            .list_crypto()
            .into_iter()
            .map(|c| c.symbol)
            .collect();
        let fiat = self.fiat_symbols();

        let matrix = self.rates.convert_batch(&crypto, &fiat).await?;
        let now = Utc::now();
        let quotes: Vec<Quote> = crypto
            .into_iter()
            .filter_map(|currency| {
                let prices = matrix.row(&currency)?.clone();
                Some(Quote {
                    currency,
                    prices,
                    quoted_at: now,
                })
            })
            .collect();

        debug!(quotes = quotes.len(), "Market listing refreshed");
        self.listing.insert(LISTING_KEY.to_string(), quotes.clone());
        Ok(quotes)
    }

    /// One currency priced in every registered fiat.
    ///
    /// The symbol does not have to be registered; NotFound if the feed knows
    /// nothing about it.
    #[instrument(skip(self))]
    pub async fn quote(&self, symbol: &str) -> Result<Quote> {
        let currency = Currency::new(symbol);
        if currency.is_empty() {
            return Err(WalletError::invalid("Currency symbol is required"));
        }
        if let Some(cached) = self.quotes.get(&currency) {
            return Ok(cached);
        }

        let fiat = self.fiat_symbols();
        let matrix = self
            .rates
            .convert_batch(std::slice::from_ref(&currency), &fiat)
            .await?;
        let prices = matrix
            .row(&currency)
            .cloned()
            .ok_or_else(|| FxError::MarketNotFound(currency.to_string()))?;

        let quote = Quote {
            currency: currency.clone(),
            prices,
            quoted_at: Utc::now(),
        };
        self.quotes.insert(currency, quote.clone());
        Ok(quote)
    }

    fn fiat_symbols(&self) -> Vec<Currency> {
        self.registry
            .list_fiat()
            .into_iter()
            .map(|c| c.symbol)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use walletledger_common::ErrorKind;
    use walletledger_fx::{MockRateProvider, RateResolverConfig};

    fn setup() -> (Arc<MockRateProvider>, MarketService) {
        let provider = Arc::new(MockRateProvider::new("test"));
        provider.set_price(Currency::btc(), Currency::usd(), dec!(36000));
        provider.set_price(Currency::btc(), Currency::eur(), dec!(33000));
        provider.set_price(Currency::eth(), Currency::usd(), dec!(2500));
        provider.set_price(Currency::new("DOGE"), Currency::usd(), dec!(0.07));

        let rates = Arc::new(RateResolver::new(provider.clone(), RateResolverConfig::default()));
        let service = MarketService::new(
            Arc::new(CurrencyRegistry::seeded()),
            rates,
            &RateCacheConfig::default(),
        );
        (provider, service)
    }

    #[tokio::test]
    async fn test_list_quotes_omits_unpriced_crypto() {
        let (provider, service) = setup();

        let quotes = service.list_quotes().await.unwrap();

        let symbols: Vec<&str> = quotes.iter().map(|q| q.currency.code()).collect();
        assert_eq!(symbols, vec!["BTC", "ETH"]);
        assert_eq!(quotes[0].prices.get(&Currency::eur()), Some(&dec!(33000)));
        assert_eq!(provider.calls(), 1);

        service.list_quotes().await.unwrap();
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_quote_unregistered_symbol() {
        let (provider, service) = setup();

        let quote = service.quote("doge").await.unwrap();
        assert_eq!(quote.prices.get(&Currency::usd()), Some(&dec!(0.07)));

        service.quote("DOGE").await.unwrap();
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_quote_unknown_symbol() {
        let (_, service) = setup();

        let err = service.quote("NOPE").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = service.quote("").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
