//! Error types for walletledger operations.

use crate::{Currency, CurrencyPair, WalletId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The four failure kinds exposed at the operation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed input, insufficient funds, price outside tolerance.
    Validation,
    /// Unknown wallet, currency symbol or currency pair.
    NotFound,
    /// Price feed outage, timeout or malformed upstream answer.
    ExternalServiceFailure,
    /// Storage constraint violation or contended wallet.
    Conflict,
}

impl ErrorKind {
    /// HTTP status the transport layer answers with for this kind.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::ExternalServiceFailure => 503,
            ErrorKind::Conflict => 409,
        }
    }
}

/// Main error type for walletledger operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WalletError {
    /// Missing or malformed caller input.
    #[error("{0}")]
    InvalidInput(String),

    /// The wallet has no balance entry for the currency being spent.
    #[error("Wallet {wallet_id} does not contain the currency from ({currency})")]
    MissingCurrency {
        wallet_id: WalletId,
        currency: Currency,
    },

    /// Spend exceeds the available balance.
    #[error("The amount exceeds the available: requested {requested} {currency}, available {available}")]
    InsufficientFunds {
        currency: Currency,
        available: Decimal,
        requested: Decimal,
    },

    /// Supplied price deviates from the market rate by more than the tolerance.
    #[error("The price is different from the official: supplied {supplied}, market {market}, tolerance {tolerance}")]
    PriceOutOfTolerance {
        supplied: Decimal,
        market: Decimal,
        tolerance: Decimal,
    },

    /// A wallet was submitted with two entries for the same currency.
    #[error("Duplicate currency {0} in currency amounts")]
    DuplicateCurrency(Currency),

    /// Balance arithmetic left the representable range.
    #[error("Arithmetic overflow computing {0}")]
    ArithmeticOverflow(String),

    /// Unknown wallet.
    #[error("Wallet not found: {0}")]
    WalletNotFound(WalletId),

    /// Currency symbol absent from the registry.
    #[error("Currency not found: {0}")]
    CurrencyNotFound(Currency),

    /// The price feed has no market for the pair.
    #[error("Rate not available for {0}")]
    RateNotAvailable(CurrencyPair),

    /// The price feed knows none of the requested symbols.
    #[error("Currency symbol not found on the price feed: {0}")]
    MarketNotFound(String),

    /// Price feed failure unrelated to symbol validity.
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Upstream call did not finish in time.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Storage-level constraint violation.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Exclusive or shared access to a wallet was not granted in time.
    #[error("Timed out waiting for lock on wallet {0}")]
    LockTimeout(WalletId),
}

impl WalletError {
    /// Shorthand for [`WalletError::InvalidInput`].
    pub fn invalid(message: impl Into<String>) -> Self {
        WalletError::InvalidInput(message.into())
    }

    /// Classify into one of the boundary kinds.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WalletError::InvalidInput(_)
            | WalletError::MissingCurrency { .. }
            | WalletError::InsufficientFunds { .. }
            | WalletError::PriceOutOfTolerance { .. }
            | WalletError::DuplicateCurrency(_)
            | WalletError::ArithmeticOverflow(_) => ErrorKind::Validation,
            WalletError::WalletNotFound(_)
            | WalletError::CurrencyNotFound(_)
            | WalletError::RateNotAvailable(_)
            | WalletError::MarketNotFound(_) => ErrorKind::NotFound,
            WalletError::ExternalService(_) | WalletError::Timeout(_) => {
                ErrorKind::ExternalServiceFailure
            }
            WalletError::Conflict(_) | WalletError::LockTimeout(_) => ErrorKind::Conflict,
        }
    }

    /// HTTP status for this error.
    pub fn http_status(&self) -> u16 {
        self.kind().http_status()
    }

    /// Check if the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WalletError::ExternalService(_) | WalletError::Timeout(_) | WalletError::LockTimeout(_)
        )
    }

    /// Stable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            WalletError::InvalidInput(_) => "INVALID_INPUT",
            WalletError::MissingCurrency { .. } => "MISSING_CURRENCY",
            WalletError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            WalletError::PriceOutOfTolerance { .. } => "PRICE_OUT_OF_TOLERANCE",
            WalletError::DuplicateCurrency(_) => "DUPLICATE_CURRENCY",
            WalletError::ArithmeticOverflow(_) => "ARITHMETIC_OVERFLOW",
            WalletError::WalletNotFound(_) => "WALLET_NOT_FOUND",
            WalletError::CurrencyNotFound(_) => "CURRENCY_NOT_FOUND",
            WalletError::RateNotAvailable(_) => "RATE_NOT_AVAILABLE",
            WalletError::MarketNotFound(_) => "MARKET_NOT_FOUND",
            WalletError::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            WalletError::Timeout(_) => "TIMEOUT",
            WalletError::Conflict(_) => "CONFLICT",
            WalletError::LockTimeout(_) => "LOCK_TIMEOUT",
        }
    }
}

/// Result type alias for walletledger operations.
pub type Result<T> = std::result::Result<T, WalletError>;
