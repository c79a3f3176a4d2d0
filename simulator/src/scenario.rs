//! Simulation scenarios.

use serde::{Deserialize, Serialize};

/// What a scenario exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScenarioKind {
    /// Many buys against one wallet at a fixed price.
    ConcurrentBuy,
    /// Random transfers in both directions between a small set of wallets.
    CrossingTransfers,
    /// Requests that must all be rejected without touching balances.
    Rejections,
    /// Market listing and single-currency quotes.
    MarketQuotes,
}

/// A simulation scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Description.
    pub description: String,
    pub kind: ScenarioKind,
    /// Wallets created up front.
    pub wallets: usize,
    /// Operations submitted.
    pub operations: usize,
}

impl Scenario {
    /// Names accepted by [`Scenario::load`].
    pub const NAMES: [&'static str; 4] = [
        "concurrent-buy",
        "crossing-transfers",
        "rejections",
        "market-quotes",
    ];

    /// Load a scenario by name.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        match name {
            "concurrent-buy" => Ok(Self::concurrent_buy()),
            "crossing-transfers" => Ok(Self::crossing_transfers()),
            "rejections" => Ok(Self::rejections()),
            "market-quotes" => Ok(Self::market_quotes()),
            _ => Err(anyhow::anyhow!(
                "Unknown scenario: {} (expected one of {})",
                name,
                Self::NAMES.join(", ")
            )),
        }
    }

    /// Override the operation count.
    pub fn with_operations(mut self, operations: Option<usize>) -> Self {
        if let Some(operations) = operations {
            self.operations = operations.max(1);
        }
        self
    }

    fn concurrent_buy() -> Self {
        Self {
            name: "concurrent-buy".to_string(),
            description: "Parallel USD to BTC buys on a single wallet at a fixed price".to_string(),
            kind: ScenarioKind::ConcurrentBuy,
            wallets: 1,
            operations: 500,
        }
    }

    fn crossing_transfers() -> Self {
        Self {
            name: "crossing-transfers".to_string(),
            description: "Random opposite-direction transfers between four wallets".to_string(),
            kind: ScenarioKind::CrossingTransfers,
            wallets: 4,
            operations: 1000,
        }
    }

    fn rejections() -> Self {
        Self {
            name: "rejections".to_string(),
            description: "Invalid buys and transfers that must leave balances untouched"
                .to_string(),
            kind: ScenarioKind::Rejections,
            wallets: 2,
            operations: 80,
        }
    }

    fn market_quotes() -> Self {
        Self {
            name: "market-quotes".to_string(),
            description: "Crypto x fiat listing and single-currency quotes".to_string(),
            kind: ScenarioKind::MarketQuotes,
            wallets: 0,
            operations: 20,
        }
    }
}
