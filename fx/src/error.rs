//! Rate resolver error types.

use walletledger_common::{CurrencyPair, WalletError};
use thiserror::Error;

/// Errors that can occur while resolving a market rate.
#[derive(Debug, Clone, Error)]
pub enum FxError {
    /// The feed answered but quotes no market for the pair.
    #[error("Rate not available for {0}")]
    RateNotAvailable(CurrencyPair),

    /// The feed rejected the symbols themselves.
    #[error("Market not found: {0}")]
    MarketNotFound(String),

    /// Transport failure or an error answer unrelated to symbol validity.
    #[error("Rate provider error: {0}")]
    ProviderError(String),

    /// The feed did not answer within the configured timeout.
    #[error("Rate provider timed out: {0}")]
    Timeout(String),

    /// The feed answered with something that is not a price matrix.
    #[error("Invalid rate provider response: {0}")]
    InvalidResponse(String),
}

impl From<FxError> for WalletError {
    fn from(err: FxError) -> Self {
        match err {
            FxError::RateNotAvailable(pair) => WalletError::RateNotAvailable(pair),
            FxError::MarketNotFound(message) => WalletError::MarketNotFound(message),
            FxError::ProviderError(message) => WalletError::ExternalService(message),
            FxError::Timeout(message) => WalletError::Timeout(message),
            FxError::InvalidResponse(message) => {
                WalletError::ExternalService(format!("invalid response: {}", message))
            }
        }
    }
}

/// Result type for rate operations.
pub type FxResult<T> = Result<T, FxError>;

#[cfg(test)]
mod tests {
    use super::*;
    use walletledger_common::{Currency, ErrorKind};

    #[test]
    fn test_conversion_into_wallet_error_kinds() {
        let pair = CurrencyPair::new(Currency::btc(), Currency::usd());
        let kind = |e: FxError| WalletError::from(e).kind();

        assert_eq!(kind(FxError::RateNotAvailable(pair)), ErrorKind::NotFound);
        assert_eq!(kind(FxError::MarketNotFound("XYZ".into())), ErrorKind::NotFound);
        assert_eq!(
            kind(FxError::ProviderError("503".into())),
            ErrorKind::ExternalServiceFailure
        );
        assert_eq!(
            kind(FxError::Timeout("1000ms".into())),
            ErrorKind::ExternalServiceFailure
        );
        assert_eq!(
            kind(FxError::InvalidResponse("not json".into())),
            ErrorKind::ExternalServiceFailure
        );
    }
}
