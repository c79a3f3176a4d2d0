//! walletledger wallet ledger
//!
//! Wallets with per-currency balances, an in-memory wallet store with
//! per-wallet shared/exclusive locks scoped to a [`StoreTransaction`], the
//! currency registry and the wallet CRUD service.

pub mod balance;
pub mod registry;
pub mod service;
pub mod store;
pub mod wallet;

pub use balance::CurrencyAmount;
pub use registry::CurrencyRegistry;
pub use service::WalletService;
pub use store::{StoreTransaction, WalletStore, WalletStoreConfig};
pub use wallet::Wallet;
