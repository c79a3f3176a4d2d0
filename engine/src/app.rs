//! In-process deployment wiring.

use std::sync::Arc;

use tracing::info;
use walletledger_common::Result;
use walletledger_fx::{RateProvider, RateResolver, RateResolverConfig};
use walletledger_ledger::{CurrencyRegistry, WalletService, WalletStore};

use crate::config::EngineConfig;
use crate::market::MarketService;
use crate::service::OperationEngine;

/// Every service of a wallet ledger, sharing one store, registry and
/// rate resolver.
pub struct WalletLedger {
    pub store: Arc<WalletStore>,
    pub registry: Arc<CurrencyRegistry>,
    pub rates: Arc<RateResolver>,
    pub wallets: WalletService,
    pub engine: OperationEngine,
    pub market: MarketService,
}

impl WalletLedger {
    /// Assemble a ledger over `provider` with the seeded registry.
    ///
    /// Rejects an invalid configuration with a Validation error.
    pub fn new(config: EngineConfig, provider: Arc<dyn RateProvider>) -> Result<Self> {
        let store = Arc::new(WalletStore::new(config.store.clone()));
        let registry = Arc::new(CurrencyRegistry::seeded());
        let rates = Arc::new(RateResolver::new(
            provider,
            RateResolverConfig {
                cache: config.cache.clone(),
                use_cache: true,
            },
        ));

        info!(
            provider = rates.provider_name(),
            tolerance = %config.price_tolerance,
            lock_timeout_ms = config.lock_timeout().as_millis() as u64,
            "Wallet ledger assembled"
        );

        Ok(Self {
            wallets: WalletService::new(Arc::clone(&store)),
            market: MarketService::new(Arc::clone(&registry), Arc::clone(&rates), &config.cache),
            engine: OperationEngine::new(
                Arc::clone(&store),
                Arc::clone(&registry),
                Arc::clone(&rates),
                config,
            )?,
            store,
            registry,
            rates,
        })
    }
}
