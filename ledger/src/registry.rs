//! Currency registry.

use std::collections::BTreeMap;

use walletledger_common::{Currency, CurrencyInfo, Result, WalletError};

/// The set of known currency symbols, seeded once and immutable afterwards.
#[derive(Debug, Clone)]
pub struct CurrencyRegistry {
    currencies: BTreeMap<Currency, CurrencyInfo>,
}

impl CurrencyRegistry {
    /// Registry with the default crypto and fiat currencies.
    pub fn seeded() -> Self {
        let entries = [
            CurrencyInfo::crypto("BTC"),
            CurrencyInfo::crypto("ETH"),
            CurrencyInfo::crypto("CLAM"),
            CurrencyInfo::crypto("GLX"),
            CurrencyInfo::fiat("USD"),
            CurrencyInfo::fiat("EUR"),
            CurrencyInfo::fiat("ARS"),
        ];

        Self {
            currencies: entries
                .into_iter()
                .map(|info| (info.symbol.clone(), info))
                .collect(),
        }
    }

    /// Registry with an explicit set of currencies.
    pub fn with_currencies(entries: impl IntoIterator<Item = CurrencyInfo>) -> Result<Self> {
        let mut currencies = BTreeMap::new();
        for info in entries {
            if info.symbol.is_empty() {
                return Err(WalletError::invalid("Currency symbol is required"));
            }
            if currencies.contains_key(&info.symbol) {
                return Err(WalletError::DuplicateCurrency(info.symbol));
            }
            currencies.insert(info.symbol.clone(), info);
        }
        Ok(Self { currencies })
    }

    /// Look a symbol up, case-insensitively.
    pub fn find_by_symbol(&self, symbol: &str) -> Result<&CurrencyInfo> {
        let currency = Currency::new(symbol);
        if currency.is_empty() {
            return Err(WalletError::invalid("Currency symbol is required"));
        }
        self.currencies
            .get(&currency)
            .ok_or(WalletError::CurrencyNotFound(currency))
    }

    pub fn contains(&self, currency: &Currency) -> bool {
        self.currencies.contains_key(currency)
    }

    /// Every crypto entry, in symbol order.
    pub fn list_crypto(&self) -> Vec<CurrencyInfo> {
        self.currencies
            .values()
            .filter(|c| c.is_crypto())
            .cloned()
            .collect()
    }

    /// Every fiat entry, in symbol order.
    pub fn list_fiat(&self) -> Vec<CurrencyInfo> {
        self.currencies
            .values()
            .filter(|c| !c.is_crypto())
            .cloned()
            .collect()
    }

    pub fn list_all(&self) -> Vec<CurrencyInfo> {
        self.currencies.values().cloned().collect()
    }
}

impl Default for CurrencyRegistry {
    fn default() -> Self {
        Self::seeded()
    }
}
