//! Simulated price feed.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use walletledger_common::Currency;
use walletledger_fx::{FxError, FxResult, PriceMatrix, RateProvider};

/// In-process feed that prices everything through a USD reference table,
/// with optional latency and random jitter.
pub struct SimulatedFeed {
    usd_prices: HashMap<Currency, Decimal>,
    latency: Duration,
    jitter_bps: u32,
    rng: Mutex<StdRng>,
}

impl SimulatedFeed {
    /// Feed with the default reference prices.
    pub fn new(latency: Duration, jitter_bps: u32, seed: Option<u64>) -> Self {
        let usd_prices = [
            ("BTC", Decimal::new(36_000, 0)),
            ("ETH", Decimal::new(2_500, 0)),
            ("CLAM", Decimal::new(21, 1)),
            ("GLX", Decimal::new(4, 4)),
            ("USD", Decimal::ONE),
            ("EUR", Decimal::new(108, 2)),
            ("ARS", Decimal::new(28, 4)),
        ]
        .into_iter()
        .map(|(symbol, price)| (Currency::new(symbol), price))
        .collect();

        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Self {
            usd_prices,
            latency,
            jitter_bps,
            rng: Mutex::new(rng),
        }
    }

    /// Unjittered price of one `from` in `to`.
    pub fn reference_price(&self, from: &Currency, to: &Currency) -> Option<Decimal> {
        let from_usd = self.usd_prices.get(from)?;
        let to_usd = self.usd_prices.get(to)?;
        from_usd.checked_div(*to_usd)
    }

    fn jitter(&self) -> Decimal {
        if self.jitter_bps == 0 {
            return Decimal::ONE;
        }
        let bps = self.jitter_bps as i64;
        let offset = self.rng.lock().gen_range(-bps..=bps);
        Decimal::ONE + Decimal::new(offset, 4)
    }
}

#[async_trait]
impl RateProvider for SimulatedFeed {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn fetch(&self, from: &[Currency], to: &[Currency]) -> FxResult<PriceMatrix> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut matrix = PriceMatrix::new();
        for base in from {
            for quote in to {
                if let Some(price) = self.reference_price(base, quote) {
                    let price = if base == quote { price } else { price * self.jitter() };
                    matrix.insert(base.clone(), quote.clone(), price.round_dp(8));
                }
            }
        }

        if matrix.is_empty() {
            let symbols: Vec<&str> = from.iter().map(|c| c.code()).collect();
            return Err(FxError::MarketNotFound(format!(
                "There is no data for the symbol {}",
                symbols.join(",")
            )));
        }
        Ok(matrix)
    }
}
