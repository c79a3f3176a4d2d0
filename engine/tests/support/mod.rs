//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use walletledger_common::{Currency, WalletId};
use walletledger_engine::{EngineConfig, WalletLedger};
use walletledger_fx::MockRateProvider;
use walletledger_ledger::{CurrencyAmount, Wallet};

pub struct TestLedger {
    pub ledger: Arc<WalletLedger>,
    pub provider: Arc<MockRateProvider>,
}

impl TestLedger {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let provider = Arc::new(MockRateProvider::new("test"));
        let ledger = Arc::new(WalletLedger::new(config, provider.clone()).unwrap());
        Self { ledger, provider }
    }

    pub fn price(&self, from: Currency, to: Currency, price: Decimal) {
        self.provider.set_price(from, to, price);
    }

    pub fn wallet(&self, name: &str, balances: &[(&str, Decimal)]) -> WalletId {
        let balances = balances
            .iter()
            .map(|(symbol, amount)| CurrencyAmount::new(*symbol, *amount))
            .collect();
        self.ledger
            .wallets
            .create(name, balances)
            .expect("create wallet")
            .id
    }

    pub fn snapshot(&self, id: WalletId) -> Wallet {
        self.ledger.wallets.find(id).expect("wallet exists")
    }

    pub fn balance(&self, id: WalletId, currency: Currency) -> Option<Decimal> {
        self.snapshot(id).balance_of(&currency)
    }
}
