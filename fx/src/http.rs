//! HTTP price feed client.
//!
//! Talks to a CryptoCompare-style `pricemulti` endpoint:
//! `GET {base}?fsyms=BTC,ETH&tsyms=USD,EUR` answers
//! `{"BTC":{"USD":36000.1,"EUR":33000.2},"ETH":{...}}`, or
//! `{"Response":"Error","Message":"..."}` when the request cannot be served.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use walletledger_common::Currency;

use crate::error::{FxError, FxResult};
use crate::matrix::PriceMatrix;
use crate::provider::RateProvider;

const DEFAULT_BASE_URL: &str = "https://min-api.cryptocompare.com/data/pricemulti";

/// Price feed connection settings.
#[derive(Debug, Clone)]
pub struct RateFeedConfig {
    /// Endpoint URL, without query string.
    pub base_url: String,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout.
    pub request_timeout: Duration,
}

impl Default for RateFeedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_millis(1000),
            request_timeout: Duration::from_millis(1000),
        }
    }
}

impl RateFeedConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("RATE_FEED_BASE_URL") {
            config.base_url = url;
        }

        if let Ok(ms) = std::env::var("RATE_FEED_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                config.connect_timeout = Duration::from_millis(ms);
                config.request_timeout = Duration::from_millis(ms);
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.trim().is_empty() {
            return Err("Rate feed base URL cannot be empty".to_string());
        }
        if self.connect_timeout.is_zero() || self.request_timeout.is_zero() {
            return Err("Rate feed timeouts must be positive".to_string());
        }
        Ok(())
    }
}

/// Rate provider backed by the HTTP price feed.
pub struct HttpRateProvider {
    client: reqwest::Client,
    config: RateFeedConfig,
}

impl HttpRateProvider {
    /// Build the client with the configured timeouts.
    pub fn new(config: RateFeedConfig) -> FxResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FxError::ProviderError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn join(symbols: &[Currency]) -> String {
        symbols
            .iter()
            .map(|c| c.code())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    fn name(&self) -> &str {
        "cryptocompare"
    }

    #[instrument(skip_all, fields(provider = "cryptocompare"))]
    async fn fetch(&self, from: &[Currency], to: &[Currency]) -> FxResult<PriceMatrix> {
        let fsyms = Self::join(from);
        let tsyms = Self::join(to);
        debug!(fsyms = %fsyms, tsyms = %tsyms, "Querying price feed");

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[("fsyms", fsyms.as_str()), ("tsyms", tsyms.as_str())])
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Price feed returned error status");
            return Err(FxError::ProviderError(format!(
                "price feed returned status {}",
                status
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                FxError::Timeout(e.to_string())
            } else {
                FxError::InvalidResponse(e.to_string())
            }
        })?;

        let matrix = parse_body(&body)?;
        debug!(pairs = matrix.len(), "Price feed answered");
        Ok(matrix)
    }
}

fn classify_transport_error(err: reqwest::Error) -> FxError {
    if err.is_timeout() {
        warn!(error = %err, "Price feed timed out");
        FxError::Timeout(err.to_string())
    } else {
        warn!(error = %err, "Price feed unreachable");
        FxError::ProviderError(err.to_string())
    }
}

/// Decode a `pricemulti` body into a price matrix.
pub fn parse_body(body: &Value) -> FxResult<PriceMatrix> {
    let object = body
        .as_object()
        .ok_or_else(|| FxError::InvalidResponse("expected a JSON object".to_string()))?;

    if object.get("Response").and_then(Value::as_str) == Some("Error") {
        let message = object
            .get("Message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(classify_feed_message(message));
    }

    let mut matrix = PriceMatrix::new();
    for (from, row) in object {
        let row = row.as_object().ok_or_else(|| {
            FxError::InvalidResponse(format!("expected an object of prices for {}", from))
        })?;
        for (to, price) in row {
            let price = parse_price(price).ok_or_else(|| {
                FxError::InvalidResponse(format!("bad price for {}/{}: {}", from, to, price))
            })?;
            matrix.insert(Currency::new(from), Currency::new(to), price);
        }
    }

    Ok(matrix)
}

fn classify_feed_message(message: String) -> FxError {
    let lower = message.to_lowercase();
    if lower.contains("does not exist") || lower.contains("no data") {
        FxError::MarketNotFound(message)
    } else {
        FxError::ProviderError(message)
    }
}

fn parse_price(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}
