//! Wallet definitions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use walletledger_common::{Currency, Result, WalletError, WalletId};

use crate::balance::CurrencyAmount;

/// An account holding balances in several currencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    /// Unique wallet identifier.
    pub id: WalletId,
    /// Display name.
    pub name: String,
    /// Balance entries, at most one per currency.
    pub balances: Vec<CurrencyAmount>,
    /// When the wallet was created.
    pub created_at: DateTime<Utc>,
    /// When the wallet was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Create a new wallet with a fresh id.
    pub fn new(name: impl Into<String>, balances: Vec<CurrencyAmount>) -> Self {
        let now = Utc::now();

        Self {
            id: WalletId::new(),
            name: name.into(),
            balances,
            created_at: now,
            updated_at: now,
        }
    }

    /// Get the balance entry for a currency.
    pub fn entry(&self, currency: &Currency) -> Option<&CurrencyAmount> {
        self.balances.iter().find(|b| &b.currency == currency)
    }

    fn entry_mut(&mut self, currency: &Currency) -> Option<&mut CurrencyAmount> {
        self.balances.iter_mut().find(|b| &b.currency == currency)
    }

    /// Balance held in `currency`, if the wallet has an entry for it.
    pub fn balance_of(&self, currency: &Currency) -> Option<Decimal> {
        self.entry(currency).map(|b| b.amount)
    }

    /// Take `amount` out of an existing balance entry.
    pub fn debit(&mut self, currency: &Currency, amount: Decimal) -> Result<()> {
        let id = self.id;
        let entry = self
            .entry_mut(currency)
            .ok_or_else(|| WalletError::MissingCurrency {
                wallet_id: id,
                currency: currency.clone(),
            })?;
        entry.debit(amount)?;
        self.touch();
        Ok(())
    }

    /// Add `amount` to a balance, opening the entry if the wallet has none.
    pub fn credit(&mut self, currency: &Currency, amount: Decimal) -> Result<()> {
        match self.entry_mut(currency) {
            Some(entry) => entry.credit(amount)?,
            None => {
                let mut entry = CurrencyAmount::zero(currency.clone());
                entry.credit(amount)?;
                self.balances.push(entry);
            }
        }
        self.touch();
        Ok(())
    }

    /// First currency that appears in more than one entry.
    pub fn duplicate_currency(&self) -> Option<&Currency> {
        self.balances.iter().enumerate().find_map(|(i, b)| {
            self.balances[..i]
                .iter()
                .any(|prev| prev.currency == b.currency)
                .then_some(&b.currency)
        })
    }

    /// Update the modification timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
