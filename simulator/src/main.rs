//! Wallet Ledger Simulator
//!
//! Drives concurrent buy and transfer load through an in-process ledger and
//! checks the books balance afterwards.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use walletledger_engine::{EngineConfig, WalletLedger};
use walletledger_fx::{HttpRateProvider, RateProvider};

mod controller;
mod feed;
mod metrics;
mod scenario;

use controller::SimulationController;
use feed::SimulatedFeed;
use scenario::Scenario;

/// Wallet Ledger Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "Concurrent load and invariant checks for the wallet ledger")]
struct Args {
    /// Scenario to run
    #[arg(short, long, default_value = "concurrent-buy")]
    scenario: String,

    /// Maximum operations in flight
    #[arg(short, long, default_value = "50")]
    concurrency: usize,

    /// Override the scenario's operation count
    #[arg(short, long)]
    operations: Option<usize>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Simulated feed latency in milliseconds
    #[arg(long, default_value = "5")]
    feed_latency_ms: u64,

    /// Simulated feed jitter in basis points
    #[arg(long, default_value = "0")]
    jitter_bps: u32,

    /// Price against the live HTTP feed instead of the simulated one
    #[arg(long)]
    live_feed: bool,

    /// Emit logs and the final report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );
    let (json_layer, text_layer) = if args.json {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer()))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();

    info!("Starting Wallet Ledger Simulator");

    let config = EngineConfig::from_env();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    let provider: Arc<dyn RateProvider> = if args.live_feed {
        info!(base_url = %config.feed.base_url, "Using live rate feed");
        Arc::new(HttpRateProvider::new(config.feed.clone())?)
    } else {
        Arc::new(SimulatedFeed::new(
            Duration::from_millis(args.feed_latency_ms),
            args.jitter_bps,
            args.seed,
        ))
    };

    let ledger = Arc::new(WalletLedger::new(config, provider)?);
    let scenario = Scenario::load(&args.scenario)?.with_operations(args.operations);

    let mut controller = SimulationController::new(Arc::clone(&ledger), args.concurrency, args.seed);
    let report = controller.run_scenario(&scenario).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let metrics = &report.metrics;
        let elapsed_secs = report.elapsed_ms as f64 / 1000.0;

        info!("Simulation complete");
        info!("Total operations: {}", metrics.total_operations);
        info!("Successful: {}", metrics.successful_operations);
        info!("Failed: {}", metrics.failed_operations);
        for (code, count) in &metrics.failures_by_code {
            info!("  {}: {}", code, count);
        }
        info!("Success rate: {:.2}%", metrics.success_rate() * 100.0);
        info!(
            "Latency p50/p95/p99: {}/{}/{}us",
            metrics.percentile_latency_us(50),
            metrics.percentile_latency_us(95),
            metrics.percentile_latency_us(99)
        );
        info!("Throughput: {:.1} ops/s", metrics.throughput(elapsed_secs));

        let engine = ledger.engine.metrics().snapshot();
        info!(
            committed = engine.operations_committed,
            failed = engine.failed(),
            "Engine counters"
        );

        for check in &report.checks {
            let status = if check.passed { "PASS" } else { "FAIL" };
            info!("[{}] {} ({})", status, check.name, check.detail);
        }
    }

    if !report.passed() {
        anyhow::bail!("Scenario {} failed its checks", report.scenario);
    }

    Ok(())
}
