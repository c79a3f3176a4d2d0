//! walletledger operation engine
//!
//! Executes `buy` (convert between two currencies inside one wallet) and
//! `transfer` (convert and move value between two wallets) with per-wallet
//! exclusive locking, market or caller-supplied pricing, and all-or-nothing
//! commits.

pub mod app;
pub mod config;
pub mod market;
pub mod metrics;
pub mod operation;
pub mod pricing;
pub mod service;

pub use app::WalletLedger;
pub use config::EngineConfig;
pub use market::{MarketService, Quote};
pub use metrics::{OperationMetrics, OperationMetricsSnapshot};
pub use operation::{BuyRequest, ConversionOrder, PriceInstruction, TransferRequest};
pub use service::OperationEngine;
