//! In-memory wallet store with per-wallet row locks.
//!
//! Every wallet row carries a `tokio::sync::RwLock<()>`. A
//! [`StoreTransaction`] acquires shared or exclusive access to rows, stages
//! the wallets it saves, and publishes them on [`StoreTransaction::commit`].
//! Locks are held until the transaction commits or is dropped; dropping an
//! uncommitted transaction discards its staged writes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, warn};
use walletledger_common::{Result, WalletError, WalletId};

use crate::wallet::Wallet;

/// Wallet store configuration.
#[derive(Debug, Clone)]
pub struct WalletStoreConfig {
    /// How long a transaction waits for a row lock before giving up.
    pub lock_timeout: Duration,
}

impl Default for WalletStoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(10),
        }
    }
}

impl WalletStoreConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(ms) = std::env::var("WALLET_LOCK_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                config.lock_timeout = Duration::from_millis(ms);
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.lock_timeout.is_zero() {
            return Err("Wallet lock timeout cannot be 0".to_string());
        }
        Ok(())
    }
}

struct WalletRow {
    lock: Arc<RwLock<()>>,
    /// `None` once the wallet has been deleted.
    committed: parking_lot::RwLock<Option<Wallet>>,
}

impl WalletRow {
    fn new(wallet: Wallet) -> Self {
        Self {
            lock: Arc::new(RwLock::new(())),
            committed: parking_lot::RwLock::new(Some(wallet)),
        }
    }

    fn snapshot(&self) -> Option<Wallet> {
        self.committed.read().clone()
    }
}

/// Thread-safe wallet store.
pub struct WalletStore {
    rows: DashMap<WalletId, Arc<WalletRow>>,
    config: WalletStoreConfig,
    #[cfg(any(test, feature = "test-utils"))]
    failing_saves: DashMap<WalletId, ()>,
}

impl WalletStore {
    /// Create an empty store.
    pub fn new(config: WalletStoreConfig) -> Self {
        Self {
            rows: DashMap::new(),
            config,
            #[cfg(any(test, feature = "test-utils"))]
            failing_saves: DashMap::new(),
        }
    }

    /// Insert a brand-new wallet.
    pub fn insert(&self, wallet: Wallet) -> Result<()> {
        check_constraints(&wallet)?;

        match self.rows.entry(wallet.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(WalletError::Conflict(format!(
                "wallet {} already exists",
                wallet.id
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                debug!(wallet_id = %wallet.id, "Wallet inserted");
                slot.insert(Arc::new(WalletRow::new(wallet)));
                Ok(())
            }
        }
    }

    /// Non-locking read of the last committed state.
    ///
    /// The result may be stale by the time the caller looks at it and must
    /// not be used as the basis of a write.
    pub fn get(&self, id: WalletId) -> Result<Wallet> {
        self.row(id)?
            .snapshot()
            .ok_or(WalletError::WalletNotFound(id))
    }

    /// Start a transaction.
    pub fn begin(&self) -> StoreTransaction<'_> {
        StoreTransaction {
            store: self,
            locks: BTreeMap::new(),
            staged: BTreeMap::new(),
            committed: false,
        }
    }

    /// Remove a wallet and its balances once no one else holds it.
    pub async fn delete(&self, id: WalletId) -> Result<()> {
        let mut tx = self.begin();
        tx.get_for_exclusive_write(id).await?;
        tx.delete_locked(id)?;
        tx.commit();
        Ok(())
    }

    /// Ids of every live wallet.
    pub fn ids(&self) -> Vec<WalletId> {
        self.rows.iter().map(|row| *row.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Make the next `save` of `id` fail with a Conflict.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn fail_next_save(&self, id: WalletId) {
        self.failing_saves.insert(id, ());
    }

    fn row(&self, id: WalletId) -> Result<Arc<WalletRow>> {
        self.rows
            .get(&id)
            .map(|row| Arc::clone(row.value()))
            .ok_or(WalletError::WalletNotFound(id))
    }

    #[cfg(any(test, feature = "test-utils"))]
    fn take_injected_failure(&self, id: WalletId) -> Option<WalletError> {
        self.failing_saves
            .remove(&id)
            .map(|_| WalletError::Conflict(format!("injected persistence failure for wallet {}", id)))
    }

    #[cfg(not(any(test, feature = "test-utils")))]
    fn take_injected_failure(&self, _id: WalletId) -> Option<WalletError> {
        None
    }
}

impl Default for WalletStore {
    fn default() -> Self {
        Self::new(WalletStoreConfig::default())
    }
}

enum Guard {
    Shared(#[allow(dead_code)] OwnedRwLockReadGuard<()>),
    Exclusive(#[allow(dead_code)] OwnedRwLockWriteGuard<()>),
}

struct HeldLock {
    row: Arc<WalletRow>,
    guard: Guard,
}

impl HeldLock {
    fn is_exclusive(&self) -> bool {
        matches!(self.guard, Guard::Exclusive(_))
    }
}

enum Staged {
    Save(Wallet),
    Delete,
}

/// A unit of work over the wallet store.
///
/// Row locks acquired through the transaction are released when it is
/// committed or dropped, never earlier.
pub struct StoreTransaction<'a> {
    store: &'a WalletStore,
    locks: BTreeMap<WalletId, HeldLock>,
    staged: BTreeMap<WalletId, Staged>,
    committed: bool,
}

impl<'a> StoreTransaction<'a> {
    /// Read a wallet under a shared lock.
    ///
    /// Waits while another transaction holds the wallet exclusively. Many
    /// transactions may hold the shared lock at once.
    pub async fn get_for_shared_read(&mut self, id: WalletId) -> Result<Wallet> {
        if self.locks.contains_key(&id) {
            return self.current(id);
        }

        let row = self.store.row(id)?;
        let guard = tokio::time::timeout(
            self.store.config.lock_timeout,
            Arc::clone(&row.lock).read_owned(),
        )
        .await
        .map_err(|_| {
            warn!(wallet_id = %id, "Timed out waiting for shared lock");
            WalletError::LockTimeout(id)
        })?;
        debug!(wallet_id = %id, "Shared lock acquired");

        self.hold(id, row, Guard::Shared(guard))
    }

    /// Read a wallet under an exclusive lock.
    ///
    /// Waits until no other transaction holds the wallet in any mode.
    pub async fn get_for_exclusive_write(&mut self, id: WalletId) -> Result<Wallet> {
        if let Some(held) = self.locks.get(&id) {
            if !held.is_exclusive() {
                return Err(WalletError::Conflict(format!(
                    "wallet {} is held for shared read in this transaction",
                    id
                )));
            }
            return self.current(id);
        }

        let row = self.store.row(id)?;
        let guard = tokio::time::timeout(
            self.store.config.lock_timeout,
            Arc::clone(&row.lock).write_owned(),
        )
        .await
        .map_err(|_| {
            warn!(wallet_id = %id, "Timed out waiting for exclusive lock");
            WalletError::LockTimeout(id)
        })?;
        debug!(wallet_id = %id, "Exclusive lock acquired");

        self.hold(id, row, Guard::Exclusive(guard))
    }

    /// Lock several wallets exclusively, always in ascending id order.
    ///
    /// Returns the wallets in the order of `ids`.
    pub async fn get_many_for_exclusive_write(&mut self, ids: &[WalletId]) -> Result<Vec<Wallet>> {
        let mut ordered = ids.to_vec();
        ordered.sort();
        ordered.dedup();

        for id in ordered {
            self.get_for_exclusive_write(id).await?;
        }

        ids.iter().map(|id| self.current(*id)).collect()
    }

    /// Stage a wallet write.
    ///
    /// The wallet must be held exclusively by this transaction. Balance
    /// entries must be unique per currency and non-negative.
    pub fn save(&mut self, wallet: Wallet) -> Result<()> {
        let id = wallet.id;
        match self.locks.get(&id) {
            Some(held) if held.is_exclusive() => {}
            _ => {
                return Err(WalletError::Conflict(format!(
                    "wallet {} saved without an exclusive lock",
                    id
                )))
            }
        }

        check_constraints(&wallet)?;

        if let Some(err) = self.store.take_injected_failure(id) {
            warn!(wallet_id = %id, "Save failed");
            return Err(err);
        }

        self.staged.insert(id, Staged::Save(wallet));
        Ok(())
    }

    fn delete_locked(&mut self, id: WalletId) -> Result<()> {
        match self.locks.get(&id) {
            Some(held) if held.is_exclusive() => {
                self.staged.insert(id, Staged::Delete);
                Ok(())
            }
            _ => Err(WalletError::Conflict(format!(
                "wallet {} deleted without an exclusive lock",
                id
            ))),
        }
    }

    /// Publish every staged write and release all locks.
    pub fn commit(mut self) {
        let staged = std::mem::take(&mut self.staged);
        for (id, change) in staged {
            let Some(held) = self.locks.get(&id) else {
                continue;
            };
            match change {
                Staged::Save(wallet) => {
                    *held.row.committed.write() = Some(wallet);
                }
                Staged::Delete => {
                    *held.row.committed.write() = None;
                    self.store.rows.remove(&id);
                }
            }
        }
        self.committed = true;
        debug!(wallets = self.locks.len(), "Transaction committed");
    }

    /// Ids currently locked by this transaction, ascending.
    pub fn locked_ids(&self) -> Vec<WalletId> {
        self.locks.keys().copied().collect()
    }

    fn hold(&mut self, id: WalletId, row: Arc<WalletRow>, guard: Guard) -> Result<Wallet> {
        // The wallet may have been deleted while we waited.
        let wallet = row.snapshot().ok_or(WalletError::WalletNotFound(id))?;
        self.locks.insert(id, HeldLock { row, guard });
        Ok(wallet)
    }

    fn current(&self, id: WalletId) -> Result<Wallet> {
        if let Some(Staged::Save(wallet)) = self.staged.get(&id) {
            return Ok(wallet.clone());
        }
        if let Some(Staged::Delete) = self.staged.get(&id) {
            return Err(WalletError::WalletNotFound(id));
        }
        self.locks
            .get(&id)
            .and_then(|held| held.row.snapshot())
            .ok_or(WalletError::WalletNotFound(id))
    }
}

impl Drop for StoreTransaction<'_> {
    fn drop(&mut self) {
        if !self.committed && !self.staged.is_empty() {
            debug!(staged = self.staged.len(), "Rolling back transaction");
        }
    }
}

fn check_constraints(wallet: &Wallet) -> Result<()> {
    if let Some(currency) = wallet.duplicate_currency() {
        return Err(WalletError::Conflict(format!(
            "duplicate currency {} in wallet {}",
            currency, wallet.id
        )));
    }
    if let Some(entry) = wallet.balances.iter().find(|b| b.amount < Decimal::ZERO) {
        return Err(WalletError::Conflict(format!(
            "negative {} balance in wallet {}",
            entry.currency, wallet.id
        )));
    }
    Ok(())
}
