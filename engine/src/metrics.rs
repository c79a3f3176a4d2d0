//! Operation counters.

use std::sync::atomic::{AtomicU64, Ordering};

use walletledger_common::{ErrorKind, WalletError};

/// Counts of buy/transfer outcomes.
pub struct OperationMetrics {
    /// Operations started.
    pub operations_total: AtomicU64,
    /// Operations committed.
    pub operations_committed: AtomicU64,
    /// Rejected with a Validation error.
    pub rejected_validation: AtomicU64,
    /// Rejected with a NotFound error.
    pub rejected_not_found: AtomicU64,
    /// Failed on the price feed.
    pub failed_external: AtomicU64,
    /// Failed on a lock timeout or storage conflict.
    pub failed_conflict: AtomicU64,
}

impl OperationMetrics {
    pub fn new() -> Self {
        Self {
            operations_total: AtomicU64::new(0),
            operations_committed: AtomicU64::new(0),
            rejected_validation: AtomicU64::new(0),
            rejected_not_found: AtomicU64::new(0),
            failed_external: AtomicU64::new(0),
            failed_conflict: AtomicU64::new(0),
        }
    }

    /// Record one finished operation.
    pub fn record<T>(&self, result: &Result<T, WalletError>) {
        self.operations_total.fetch_add(1, Ordering::Relaxed);
        let counter = match result {
            Ok(_) => &self.operations_committed,
            Err(err) => match err.kind() {
                ErrorKind::Validation => &self.rejected_validation,
                ErrorKind::NotFound => &self.rejected_not_found,
                ErrorKind::ExternalServiceFailure => &self.failed_external,
                ErrorKind::Conflict => &self.failed_conflict,
            },
        };
        counter.fetch_add(1, Ordering::Release);
    }

    /// Get current metrics snapshot.
    ///
    /// The total is bumped before an outcome counter and read after them,
    /// so it never lags behind their sum.
    pub fn snapshot(&self) -> OperationMetricsSnapshot {
        let operations_committed = self.operations_committed.load(Ordering::Acquire);
        let rejected_validation = self.rejected_validation.load(Ordering::Acquire);
        let rejected_not_found = self.rejected_not_found.load(Ordering::Acquire);
        let failed_external = self.failed_external.load(Ordering::Acquire);
        let failed_conflict = self.failed_conflict.load(Ordering::Acquire);
        OperationMetricsSnapshot {
            operations_total: self.operations_total.load(Ordering::Relaxed),
            operations_committed,
            rejected_validation,
            rejected_not_found,
            failed_external,
            failed_conflict,
        }
    }
}

impl Default for OperationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationMetricsSnapshot {
    pub operations_total: u64,
    pub operations_committed: u64,
    pub rejected_validation: u64,
    pub rejected_not_found: u64,
    pub failed_external: u64,
    pub failed_conflict: u64,
}

impl OperationMetricsSnapshot {
    /// Operations that did not commit.
    pub fn failed(&self) -> u64 {
        self.operations_total.saturating_sub(self.operations_committed)
    }
}
