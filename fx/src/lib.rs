//! walletledger rate resolver
//!
//! Answers "how much is one unit of `from` worth in `to`" for the operation
//! engine and the market listings.
//!
//! # Features
//!
//! - Pluggable [`RateProvider`] with an HTTP implementation for
//!   CryptoCompare-style `pricemulti` feeds
//! - Per-pair TTL cache shared by concurrent callers
//! - Batched lookups returning a [`PriceMatrix`]
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use walletledger_fx::{HttpRateProvider, RateFeedConfig, RateResolver, RateResolverConfig};
//! use walletledger_common::Currency;
//!
//! let provider = Arc::new(HttpRateProvider::new(RateFeedConfig::from_env())?);
//! let resolver = RateResolver::new(provider, RateResolverConfig::default());
//!
//! let price = resolver.convert(&Currency::btc(), &Currency::usd()).await?;
//! ```

pub mod cache;
pub mod error;
pub mod http;
pub mod matrix;
pub mod provider;
pub mod resolver;

pub use cache::{CacheStats, RateCache, RateCacheConfig, TtlCache};
pub use error::{FxError, FxResult};
pub use http::{HttpRateProvider, RateFeedConfig};
pub use matrix::{MarketRate, PriceMatrix};
pub use provider::RateProvider;
pub use resolver::{RateResolver, RateResolverConfig};

#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockRateProvider;
