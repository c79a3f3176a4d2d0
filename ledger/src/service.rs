//! Wallet CRUD service.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument};
use walletledger_common::{Result, WalletError, WalletId};

use crate::balance::CurrencyAmount;
use crate::store::WalletStore;
use crate::wallet::Wallet;

/// Creates, reads, renames and deletes wallets.
///
/// Balances are only ever changed by the operation engine; nothing here
/// touches an existing wallet's balance entries.
pub struct WalletService {
    store: Arc<WalletStore>,
}

impl WalletService {
    pub fn new(store: Arc<WalletStore>) -> Self {
        Self { store }
    }

    /// Create a wallet with its opening balances.
    #[instrument(skip(self, balances), fields(entries = balances.len()))]
    pub fn create(&self, name: &str, balances: Vec<CurrencyAmount>) -> Result<Wallet> {
        let name = validate_name(name)?;

        for entry in &balances {
            if entry.currency.is_empty() {
                return Err(WalletError::invalid("Currency is required"));
            }
            if entry.amount < Decimal::ZERO {
                return Err(WalletError::invalid(format!(
                    "Amount for {} cannot be negative",
                    entry.currency
                )));
            }
        }

        let wallet = Wallet::new(name, balances);
        if let Some(currency) = wallet.duplicate_currency() {
            return Err(WalletError::DuplicateCurrency(currency.clone()));
        }

        self.store.insert(wallet.clone())?;
        info!(wallet_id = %wallet.id, name = %wallet.name, "Wallet created");
        Ok(wallet)
    }

    /// Non-locking read.
    pub fn find(&self, id: WalletId) -> Result<Wallet> {
        self.store.get(id)
    }

    /// Read under a shared lock, so the snapshot never reflects half of a
    /// concurrent operation.
    pub async fn find_consistent(&self, id: WalletId) -> Result<Wallet> {
        let mut tx = self.store.begin();
        let wallet = tx.get_for_shared_read(id).await?;
        tx.commit();
        Ok(wallet)
    }

    /// Every wallet, as last committed.
    pub fn find_all(&self) -> Vec<Wallet> {
        self.store
            .ids()
            .into_iter()
            .filter_map(|id| self.store.get(id).ok())
            .collect()
    }

    /// Change a wallet's display name.
    #[instrument(skip(self))]
    pub async fn rename(&self, id: WalletId, name: &str) -> Result<Wallet> {
        let name = validate_name(name)?;

        let mut tx = self.store.begin();
        let mut wallet = tx.get_for_exclusive_write(id).await?;
        wallet.name = name;
        wallet.touch();
        tx.save(wallet.clone())?;
        tx.commit();

        info!(wallet_id = %id, "Wallet renamed");
        Ok(wallet)
    }

    /// Delete a wallet and its balances.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: WalletId) -> Result<()> {
        self.store.delete(id).await?;
        info!(wallet_id = %id, "Wallet deleted");
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(WalletError::invalid("Name is required"));
    }
    Ok(name.to_string())
}
