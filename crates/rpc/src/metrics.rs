//! Metrics collection for the ledger client
//!
//! Counters are plain atomics; `snapshot()` is a side-effect-free read
//! consumed by the orchestrator's health query.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Snapshot of ledger client metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerMetricsSnapshot {
    /// Total RPC requests issued
    pub total_requests: u64,

    /// Successful requests
    pub successful_requests: u64,

    /// Failed request attempts
    pub failed_requests: u64,

    /// Request attempts that timed out
    pub timeout_requests: u64,

    /// Retry attempts performed
    pub retries: u64,

    /// Signature pages fetched
    pub signature_pages: u64,

    /// Transaction records fetched
    pub transactions_fetched: u64,

    /// Average request latency in microseconds
    pub avg_latency_us: u64,

    /// Failed requests over total requests
    pub error_rate: f64,

    /// Requests per second since the collector started
    pub requests_per_second: f64,

    /// Timestamp of the snapshot
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Ledger client metrics collector
pub struct LedgerMetrics {
    /// Total RPC requests issued
    total_requests: AtomicU64,

    /// Successful requests
    successful_requests: AtomicU64,

    /// Failed request attempts
    failed_requests: AtomicU64,

    /// Request attempts that timed out
    timeout_requests: AtomicU64,

    /// Retry attempts performed
    retries: AtomicU64,

    /// Signature pages fetched
    signature_pages: AtomicU64,

    /// Transaction records fetched
    transactions_fetched: AtomicU64,

    /// Total latency of successful requests in microseconds
    total_latency_us: AtomicU64,

    /// Collector start time
    started_at: Instant,
}

impl LedgerMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            timeout_requests: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            signature_pages: AtomicU64::new(0),
            transactions_fetched: AtomicU64::new(0),
            total_latency_us: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Record the start of a request
    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a successful request with its latency
    pub fn record_success(&self, latency: Duration) {
        self.successful_requests.fetch_add(1, Ordering::SeqCst);
        self.total_latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::SeqCst);
    }

    /// Record a failed request attempt
    pub fn record_failure(&self) {
        self.failed_requests.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a timed-out request
    pub fn record_timeout(&self) {
        self.timeout_requests.fetch_add(1, Ordering::SeqCst);
    }

    /// Record one retry attempt
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a fetched signature page
    pub fn record_signature_page(&self) {
        self.signature_pages.fetch_add(1, Ordering::SeqCst);
    }

    /// Record fetched transaction records
    pub fn record_transactions(&self, count: u64) {
        self.transactions_fetched.fetch_add(count, Ordering::SeqCst);
    }

    /// Get a snapshot of the current metrics
    pub fn snapshot(&self) -> LedgerMetricsSnapshot {
        let total = self.total_requests.load(Ordering::SeqCst);
        let successful = self.successful_requests.load(Ordering::SeqCst);
        let failed = self.failed_requests.load(Ordering::SeqCst);
        let total_latency = self.total_latency_us.load(Ordering::SeqCst);

        let avg_latency = if successful > 0 {
            total_latency / successful
        } else {
            0
        };

        let error_rate = if total > 0 {
            failed as f64 / total as f64
        } else {
            0.0
        };

        let elapsed = self.started_at.elapsed().as_secs_f64();
        let requests_per_second = if elapsed > 0.0 {
            total as f64 / elapsed
        } else {
            0.0
        };

        LedgerMetricsSnapshot {
            total_requests: total,
            successful_requests: successful,
            failed_requests: failed,
            timeout_requests: self.timeout_requests.load(Ordering::SeqCst),
            retries: self.retries.load(Ordering::SeqCst),
            signature_pages: self.signature_pages.load(Ordering::SeqCst),
            transactions_fetched: self.transactions_fetched.load(Ordering::SeqCst),
            avg_latency_us: avg_latency,
            error_rate,
            requests_per_second,
            timestamp: chrono::Utc::now(),
        }
    }
}

impl Default for LedgerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
