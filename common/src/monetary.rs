//! Currency types for walletledger.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A currency symbol, fiat (`USD`) or crypto (`BTC`).
///
/// Symbols are normalised to upper case on construction so `btc` and `BTC`
/// name the same balance entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Create a new currency from a symbol.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into().trim().to_uppercase())
    }

    /// Get the currency symbol.
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Check if the symbol is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn btc() -> Self {
        Self::new("BTC")
    }

    pub fn eth() -> Self {
        Self::new("ETH")
    }

    pub fn usd() -> Self {
        Self::new("USD")
    }

    pub fn eur() -> Self {
        Self::new("EUR")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Currency {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<Currency> for String {
    fn from(c: Currency) -> Self {
        c.0
    }
}

/// A currency pair for price lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    /// Currency being priced.
    pub base: Currency,
    /// Currency the price is expressed in.
    pub quote: Currency,
}

impl CurrencyPair {
    /// Create a new currency pair.
    pub fn new(base: Currency, quote: Currency) -> Self {
        Self { base, quote }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Whether a registered currency is a crypto asset or a fiat/reference asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyKind {
    Crypto,
    Fiat,
}

/// A currency registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyInfo {
    /// Unique symbol.
    pub symbol: Currency,
    /// Crypto or fiat.
    pub kind: CurrencyKind,
}

impl CurrencyInfo {
    /// Create a crypto entry.
    pub fn crypto(symbol: impl Into<Currency>) -> Self {
        Self {
            symbol: symbol.into(),
            kind: CurrencyKind::Crypto,
        }
    }

    /// Create a fiat entry.
    pub fn fiat(symbol: impl Into<Currency>) -> Self {
        Self {
            symbol: symbol.into(),
            kind: CurrencyKind::Fiat,
        }
    }

    pub fn is_crypto(&self) -> bool {
        self.kind == CurrencyKind::Crypto
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_is_normalised() {
        assert_eq!(Currency::new(" btc "), Currency::btc());
        assert_eq!(Currency::from("usd").code(), "USD");
    }

    #[test]
    fn test_currency_deserialize_normalises() {
        let c: Currency = serde_json::from_str("\"eth\"").unwrap();
        assert_eq!(c, Currency::eth());
    }

    #[test]
    fn test_pair_display() {
        let pair = CurrencyPair::new(Currency::btc(), Currency::usd());
        assert_eq!(pair.to_string(), "BTC/USD");
    }

    #[test]
    fn test_currency_info_kind() {
        assert!(CurrencyInfo::crypto("BTC").is_crypto());
        assert!(!CurrencyInfo::fiat("USD").is_crypto());
    }
}
