//! Simulation controller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use walletledger_common::{Currency, ErrorKind, WalletError, WalletId};
use walletledger_engine::{BuyRequest, TransferRequest, WalletLedger};
use walletledger_ledger::{CurrencyAmount, Wallet};

use crate::metrics::SimulationMetrics;
use crate::scenario::{Scenario, ScenarioKind};

const BUY_AMOUNT: Decimal = Decimal::from_parts(10, 0, 0, false, 0);
const STARTING_USD: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// One request submitted by a scenario.
#[derive(Debug, Clone)]
enum Operation {
    Buy(BuyRequest),
    Transfer(TransferRequest),
}

/// A post-run assertion.
#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl Check {
    fn new(name: &str, passed: bool, detail: String) -> Self {
        Self {
            name: name.to_string(),
            passed,
            detail,
        }
    }
}

/// Outcome of one scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub elapsed_ms: u128,
    pub metrics: SimulationMetrics,
    pub checks: Vec<Check>,
}

impl ScenarioReport {
    /// Whether every check passed.
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }
}

/// Controls the simulation.
pub struct SimulationController {
    ledger: Arc<WalletLedger>,
    /// Maximum operations in flight.
    concurrency: usize,
    rng: StdRng,
    metrics: Arc<Mutex<SimulationMetrics>>,
}

impl SimulationController {
    /// Create a new simulation controller.
    pub fn new(ledger: Arc<WalletLedger>, concurrency: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Self {
            ledger,
            concurrency: concurrency.max(1),
            rng,
            metrics: Arc::new(Mutex::new(SimulationMetrics::new())),
        }
    }

    /// Run a scenario and check its expected end state.
    pub async fn run_scenario(&mut self, scenario: &Scenario) -> anyhow::Result<ScenarioReport> {
        info!(
            scenario = %scenario.name,
            operations = scenario.operations,
            concurrency = self.concurrency,
            "{}",
            scenario.description
        );

        *self.metrics.lock() = SimulationMetrics::new();
        let start = Instant::now();

        let checks = match scenario.kind {
            ScenarioKind::ConcurrentBuy => self.concurrent_buy(scenario.operations).await?,
            ScenarioKind::CrossingTransfers => {
                self.crossing_transfers(scenario.wallets, scenario.operations)
                    .await?
            }
            ScenarioKind::Rejections => self.rejections(scenario.operations).await?,
            ScenarioKind::MarketQuotes => self.market_quotes(scenario.operations).await?,
        };

        Ok(ScenarioReport {
            scenario: scenario.name.clone(),
            elapsed_ms: start.elapsed().as_millis(),
            metrics: self.metrics.lock().clone(),
            checks,
        })
    }

    async fn concurrent_buy(&mut self, operations: usize) -> anyhow::Result<Vec<Check>> {
        let price = Decimal::new(2778, 8);
        let opening = BUY_AMOUNT * Decimal::from(operations as u64);
        let wallet = self.create_wallet("buyer", vec![CurrencyAmount::new("USD", opening)])?;

        let ops = (0..operations)
            .map(|_| Operation::Buy(BuyRequest::new(wallet, "USD", "BTC", BUY_AMOUNT).at_price(price)))
            .collect();
        let results = self.submit(ops).await?;

        let committed = results.iter().filter(|r| r.is_ok()).count();
        let after = self.ledger.wallets.find(wallet)?;
        let expected_btc = opening * price;

        Ok(vec![
            Check::new(
                "all buys committed",
                committed == operations,
                format!("{}/{}", committed, operations),
            ),
            Check::new(
                "source drained exactly",
                after.balance_of(&Currency::usd()) == Some(Decimal::ZERO),
                format!("USD {:?}", after.balance_of(&Currency::usd())),
            ),
            Check::new(
                "target credited exactly",
                after.balance_of(&Currency::btc()) == Some(expected_btc),
                format!(
                    "BTC {:?}, expected {}",
                    after.balance_of(&Currency::btc()),
                    expected_btc
                ),
            ),
        ])
    }

    async fn crossing_transfers(
        &mut self,
        wallet_count: usize,
        operations: usize,
    ) -> anyhow::Result<Vec<Check>> {
        let wallet_count = wallet_count.max(2);
        let mut wallets = Vec::with_capacity(wallet_count);
        for i in 0..wallet_count {
            wallets.push(self.create_wallet(
                &format!("party-{}", i),
                vec![CurrencyAmount::new("USD", STARTING_USD)],
            )?);
        }

        let mut ops = Vec::with_capacity(operations);
        for _ in 0..operations {
            let from = self.rng.gen_range(0..wallet_count);
            let mut to = self.rng.gen_range(0..wallet_count);
            while to == from {
                to = self.rng.gen_range(0..wallet_count);
            }
            let amount = Decimal::from(self.rng.gen_range(1..=500u32));
            ops.push(Operation::Transfer(
                TransferRequest::new(wallets[from], wallets[to], "USD", "USD", amount)
                    .at_price(Decimal::ONE),
            ));
        }

        let results = self.submit(ops).await?;

        let unexpected: Vec<&WalletError> = results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .filter(|e| !matches!(e, WalletError::InsufficientFunds { .. }))
            .collect();

        let mut total = Decimal::ZERO;
        let mut negative = 0;
        for id in &wallets {
            let balance = self
                .ledger
                .wallets
                .find(*id)?
                .balance_of(&Currency::usd())
                .unwrap_or(Decimal::ZERO);
            if balance < Decimal::ZERO {
                negative += 1;
            }
            total += balance;
        }
        let expected_total = STARTING_USD * Decimal::from(wallet_count as u64);

        Ok(vec![
            Check::new(
                "value conserved",
                total == expected_total,
                format!("total {}, expected {}", total, expected_total),
            ),
            Check::new("no negative balances", negative == 0, format!("{} negative", negative)),
            Check::new(
                "only insufficient-funds rejections",
                unexpected.is_empty(),
                format!("{} unexpected failures", unexpected.len()),
            ),
        ])
    }

    async fn rejections(&mut self, operations: usize) -> anyhow::Result<Vec<Check>> {
        let holder = self.create_wallet(
            "holder",
            vec![
                CurrencyAmount::new("USD", Decimal::new(100, 0)),
                CurrencyAmount::new("BTC", Decimal::ONE),
            ],
        )?;
        let other = self.create_wallet("other", vec![])?;
        let ghost = WalletId::new();
        let before = (
            self.ledger.wallets.find(holder)?,
            self.ledger.wallets.find(other)?,
        );

        let market = self
            .ledger
            .rates
            .convert(&Currency::btc(), &Currency::usd())
            .await
            .map_err(WalletError::from)?;
        let off_market = (market * Decimal::new(101, 2)).round_dp(2);

        let catalogue: Vec<(Operation, ErrorKind)> = vec![
            (
                Operation::Buy(BuyRequest::new(ghost, "USD", "BTC", Decimal::ONE)),
                ErrorKind::NotFound,
            ),
            (
                Operation::Buy(BuyRequest::new(holder, "USD", "XYZ", Decimal::ONE)),
                ErrorKind::NotFound,
            ),
            (
                Operation::Buy(BuyRequest::new(holder, "USD", "BTC", Decimal::ZERO)),
                ErrorKind::Validation,
            ),
            (
                Operation::Buy(BuyRequest::new(holder, "USD", "BTC", Decimal::new(1000, 0))),
                ErrorKind::Validation,
            ),
            (
                Operation::Buy(BuyRequest::new(holder, "ETH", "USD", Decimal::ONE)),
                ErrorKind::Validation,
            ),
            (
                Operation::Buy(
                    BuyRequest::new(holder, "BTC", "USD", Decimal::ONE)
                        .at_price(off_market)
                        .validated(),
                ),
                ErrorKind::Validation,
            ),
            (
                Operation::Transfer(TransferRequest::new(holder, holder, "USD", "USD", Decimal::ONE)),
                ErrorKind::Validation,
            ),
            (
                Operation::Transfer(TransferRequest::new(holder, ghost, "USD", "USD", Decimal::ONE)),
                ErrorKind::NotFound,
            ),
        ];

        let (ops, expected): (Vec<Operation>, Vec<ErrorKind>) =
            catalogue.into_iter().cycle().take(operations).unzip();
        let results = self.submit(ops).await?;

        let mismatched = results
            .iter()
            .zip(&expected)
            .filter(|(result, kind)| match result {
                Ok(()) => true,
                Err(err) => err.kind() != **kind,
            })
            .count();

        let after = (
            self.ledger.wallets.find(holder)?,
            self.ledger.wallets.find(other)?,
        );

        Ok(vec![
            Check::new(
                "every request rejected with its expected kind",
                mismatched == 0,
                format!("{} mismatched of {}", mismatched, expected.len()),
            ),
            Check::new(
                "balances untouched",
                after == before,
                "wallet snapshots compared".to_string(),
            ),
        ])
    }

    async fn market_quotes(&mut self, operations: usize) -> anyhow::Result<Vec<Check>> {
        let mut listed = 0;
        let mut unknown_rejected = true;

        for i in 0..operations {
            let start = Instant::now();
            let result = match i % 3 {
                0 => self.ledger.market.list_quotes().await.map(|q| {
                    listed = listed.max(q.len());
                }),
                1 => self.ledger.market.quote("BTC").await.map(|_| ()),
                _ => {
                    let result = self.ledger.market.quote("NOPE").await.map(|_| ());
                    if !matches!(&result, Err(e) if e.kind() == ErrorKind::NotFound) {
                        unknown_rejected = false;
                    }
                    result
                }
            };
            self.record(&result, start.elapsed());
        }

        let crypto = self.ledger.registry.list_crypto().len();
        let stats = self.ledger.rates.stats();
        info!(
            cached = stats.valid_entries,
            expired = stats.expired_entries,
            "Rate cache after market run"
        );
        self.ledger.rates.cleanup();

        Ok(vec![
            Check::new(
                "listing has quotes",
                listed > 0 && listed <= crypto,
                format!("{} of {} crypto currencies priced", listed, crypto),
            ),
            Check::new(
                "unknown symbol is not found",
                unknown_rejected,
                "NOPE".to_string(),
            ),
        ])
    }

    fn create_wallet(&self, name: &str, balances: Vec<CurrencyAmount>) -> anyhow::Result<WalletId> {
        let wallet: Wallet = self.ledger.wallets.create(name, balances)?;
        Ok(wallet.id)
    }

    /// Run every operation with at most `concurrency` in flight.
    ///
    /// Results come back in submission order.
    async fn submit(&self, ops: Vec<Operation>) -> anyhow::Result<Vec<Result<(), WalletError>>> {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(ops.len());

        for op in ops {
            let permit = Arc::clone(&permits).acquire_owned().await?;
            let ledger = Arc::clone(&self.ledger);
            let metrics = Arc::clone(&self.metrics);

            handles.push(tokio::spawn(async move {
                let start = Instant::now();
                let result = match op {
                    Operation::Buy(request) => ledger.engine.buy(request).await,
                    Operation::Transfer(request) => ledger.engine.transfer(request).await,
                };
                record_into(&metrics, &result, start.elapsed());
                drop(permit);
                result
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await?);
        }

        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            warn!(failed, total = results.len(), "Some operations failed");
        }
        Ok(results)
    }

    fn record(&self, result: &Result<(), WalletError>, elapsed: Duration) {
        record_into(&self.metrics, result, elapsed);
    }
}

fn record_into(
    metrics: &Mutex<SimulationMetrics>,
    result: &Result<(), WalletError>,
    elapsed: Duration,
) {
    let latency_us = elapsed.as_micros() as u64;
    let mut metrics = metrics.lock();
    match result {
        Ok(()) => metrics.record_success(latency_us),
        Err(err) => metrics.record_failure(err, latency_us),
    }
}
