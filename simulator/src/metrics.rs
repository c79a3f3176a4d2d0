//! Simulation metrics.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;
use walletledger_common::WalletError;

/// Simulation metrics.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationMetrics {
    /// Total operations attempted.
    pub total_operations: u64,
    /// Operations that committed.
    pub successful_operations: u64,
    /// Failed operations.
    pub failed_operations: u64,
    /// Failures keyed by error code.
    pub failures_by_code: BTreeMap<&'static str, u64>,
    /// Latency samples (µs).
    #[serde(skip)]
    latency_samples: VecDeque<u64>,
    /// Maximum samples to keep.
    #[serde(skip)]
    max_samples: usize,
}

impl SimulationMetrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self {
            total_operations: 0,
            successful_operations: 0,
            failed_operations: 0,
            failures_by_code: BTreeMap::new(),
            latency_samples: VecDeque::with_capacity(10000),
            max_samples: 10000,
        }
    }

    /// Record a committed operation.
    pub fn record_success(&mut self, latency_us: u64) {
        self.total_operations += 1;
        self.successful_operations += 1;
        self.push_sample(latency_us);
    }

    /// Record a failed operation.
    pub fn record_failure(&mut self, err: &WalletError, latency_us: u64) {
        self.total_operations += 1;
        self.failed_operations += 1;
        *self.failures_by_code.entry(err.error_code()).or_insert(0) += 1;
        self.push_sample(latency_us);
    }

    fn push_sample(&mut self, latency_us: u64) {
        if self.latency_samples.len() >= self.max_samples {
            self.latency_samples.pop_front();
        }
        self.latency_samples.push_back(latency_us);
    }

    /// Get average latency in µs.
    pub fn average_latency_us(&self) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let sum: u64 = self.latency_samples.iter().sum();
        sum / self.latency_samples.len() as u64
    }

    /// Get percentile latency in µs.
    pub fn percentile_latency_us(&self, percentile: usize) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let mut sorted: Vec<_> = self.latency_samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (sorted.len() * percentile / 100).min(sorted.len() - 1);
        sorted[idx]
    }

    /// Get success rate.
    pub fn success_rate(&self) -> f64 {
        if self.total_operations == 0 {
            return 0.0;
        }

        self.successful_operations as f64 / self.total_operations as f64
    }

    /// Operations per second over `elapsed_secs`.
    pub fn throughput(&self, elapsed_secs: f64) -> f64 {
        if elapsed_secs <= 0.0 {
            return 0.0;
        }

        self.total_operations as f64 / elapsed_secs
    }
}

impl Default for SimulationMetrics {
    fn default() -> Self {
        Self::new()
    }
}
