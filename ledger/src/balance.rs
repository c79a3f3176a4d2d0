//! Per-currency balance entries.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use walletledger_common::{Currency, Result, WalletError};

/// A `(currency, amount)` balance entry owned by one wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyAmount {
    /// Currency symbol.
    pub currency: Currency,
    /// Balance, never negative once persisted.
    pub amount: Decimal,
}

impl CurrencyAmount {
    pub fn new(currency: impl Into<Currency>, amount: Decimal) -> Self {
        Self {
            currency: currency.into(),
            amount,
        }
    }

    /// Create a new zero balance.
    pub fn zero(currency: Currency) -> Self {
        Self::new(currency, Decimal::ZERO)
    }

    /// Check if the entry can cover `amount`.
    pub fn has_sufficient_funds(&self, amount: Decimal) -> bool {
        self.amount >= amount
    }

    /// Reduce the balance, refusing to go negative.
    pub fn debit(&mut self, amount: Decimal) -> Result<()> {
        if !self.has_sufficient_funds(amount) {
            return Err(WalletError::InsufficientFunds {
                currency: self.currency.clone(),
                available: self.amount,
                requested: amount,
            });
        }
        self.amount -= amount;
        Ok(())
    }

    /// Increase the balance.
    pub fn credit(&mut self, amount: Decimal) -> Result<()> {
        self.amount = self.amount.checked_add(amount).ok_or_else(|| {
            WalletError::ArithmeticOverflow(format!("{} balance + {}", self.currency, amount))
        })?;
        Ok(())
    }
}
