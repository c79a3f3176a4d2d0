//! Market rate and price matrix types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use walletledger_common::{Currency, CurrencyPair};

/// The price of one unit of `pair.base` expressed in `pair.quote`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRate {
    /// The currency pair.
    pub pair: CurrencyPair,
    /// Price of one base unit in quote units.
    pub price: Decimal,
    /// When the rate was fetched from the provider.
    pub quoted_at: DateTime<Utc>,
    /// Provider that quoted the rate.
    pub source: String,
}

impl MarketRate {
    /// Create a new market rate quoted now.
    pub fn new(pair: CurrencyPair, price: Decimal, source: impl Into<String>) -> Self {
        Self {
            pair,
            price,
            quoted_at: Utc::now(),
            source: source.into(),
        }
    }
}

/// Prices for every `from x to` combination a provider answered.
///
/// Rows the provider had no data for are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceMatrix {
    rows: BTreeMap<Currency, BTreeMap<Currency, Decimal>>,
}

impl PriceMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the price of one `from` unit in `to`.
    pub fn insert(&mut self, from: Currency, to: Currency, price: Decimal) {
        self.rows.entry(from).or_default().insert(to, price);
    }

    /// Price of one `from` unit in `to`, if quoted.
    pub fn get(&self, from: &Currency, to: &Currency) -> Option<Decimal> {
        self.rows.get(from).and_then(|row| row.get(to)).copied()
    }

    /// All quotes for one base currency.
    pub fn row(&self, from: &Currency) -> Option<&BTreeMap<Currency, Decimal>> {
        self.rows.get(from)
    }

    /// Base currencies that have at least one quote.
    pub fn bases(&self) -> impl Iterator<Item = &Currency> {
        self.rows.keys()
    }

    /// Iterate every quoted pair.
    pub fn iter(&self) -> impl Iterator<Item = (CurrencyPair, Decimal)> + '_ {
        self.rows.iter().flat_map(|(from, row)| {
            row.iter()
                .map(move |(to, price)| (CurrencyPair::new(from.clone(), to.clone()), *price))
        })
    }

    /// Number of quoted pairs.
    pub fn len(&self) -> usize {
        self.rows.values().map(|row| row.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_matrix_lookup() {
        let mut matrix = PriceMatrix::new();
        matrix.insert(Currency::btc(), Currency::usd(), dec!(36000));
        matrix.insert(Currency::btc(), Currency::eur(), dec!(33000));
        matrix.insert(Currency::eth(), Currency::usd(), dec!(2500));

        assert_eq!(matrix.get(&Currency::btc(), &Currency::usd()), Some(dec!(36000)));
        assert_eq!(matrix.get(&Currency::eth(), &Currency::eur()), None);
        assert_eq!(matrix.len(), 3);
        assert_eq!(matrix.bases().count(), 2);
        assert_eq!(matrix.row(&Currency::btc()).map(|r| r.len()), Some(2));
    }

    #[test]
    fn test_empty_matrix() {
        let matrix = PriceMatrix::new();
        assert!(matrix.is_empty());
        assert_eq!(matrix.iter().count(), 0);
    }
}
