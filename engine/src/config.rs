//! Engine configuration.

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use walletledger_fx::{RateCacheConfig, RateFeedConfig};
use walletledger_ledger::WalletStoreConfig;

/// Main engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Largest accepted fractional deviation of a supplied price from the
    /// market rate when the caller asks for validation.
    pub price_tolerance: Decimal,
    /// Wallet store configuration.
    pub store: WalletStoreConfig,
    /// Price feed configuration.
    pub feed: RateFeedConfig,
    /// Rate cache configuration.
    pub cache: RateCacheConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            price_tolerance: Decimal::new(5, 5),
            store: WalletStoreConfig::default(),
            feed: RateFeedConfig::default(),
            cache: RateCacheConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self {
            store: WalletStoreConfig::from_env(),
            feed: RateFeedConfig::from_env(),
            cache: RateCacheConfig::from_env(),
            ..Self::default()
        };

        if let Ok(tolerance) = std::env::var("PRICE_TOLERANCE") {
            if let Ok(tolerance) = Decimal::from_str(tolerance.trim()) {
                config.price_tolerance = tolerance;
            }
        }

        config
    }

    /// Lock wait bound for buy and transfer.
    pub fn lock_timeout(&self) -> Duration {
        self.store.lock_timeout
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.price_tolerance < Decimal::ZERO || self.price_tolerance >= Decimal::ONE {
            return Err("Price tolerance must be in [0, 1)".to_string());
        }

        self.store.validate()?;
        self.feed.validate()?;
        self.cache.validate()?;

        Ok(())
    }
}
