//! Configuration for the ledger client

use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentConfig;

/// Retry policy for RPC calls
///
/// An explicit attempt counter plus a backoff table, so the policy is
/// bounded and independently testable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts per call (first try included)
    pub max_attempts: usize,

    /// Delay before retry N, in milliseconds; the last entry repeats
    pub backoff_ms: Vec<u64>,
}

impl RetryPolicy {
    /// Delay to apply after the given failed attempt (1-based)
    pub fn delay_for_attempt(&self, attempt: usize) -> u64 {
        let idx = attempt.saturating_sub(1).min(self.backoff_ms.len().saturating_sub(1));
        self.backoff_ms.get(idx).copied().unwrap_or(0)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: vec![1_000, 2_000, 5_000],
        }
    }
}

/// Ledger client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// RPC endpoint URL
    pub endpoint_url: String,

    /// Commitment level (processed, confirmed, finalized)
    pub commitment: String,

    /// Per-call timeout in milliseconds
    pub request_timeout_ms: u64,

    /// Page size for signature listings (provider cap 1000)
    pub signature_page_limit: usize,

    /// Transactions fetched concurrently per batch
    pub transaction_batch_size: usize,

    /// Pause between signature pages, skipped on the final page
    pub page_delay_ms: u64,

    /// Pause between transaction batches, skipped on the final batch
    pub batch_delay_ms: u64,

    /// Retry policy for every RPC call
    pub retry: RetryPolicy,
}

impl LedgerConfig {
    /// Commitment config derived from the string setting
    pub fn commitment_config(&self) -> CommitmentConfig {
        match self.commitment.as_str() {
            "processed" => CommitmentConfig::processed(),
            "finalized" => CommitmentConfig::finalized(),
            _ => CommitmentConfig::confirmed(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "https://api.mainnet-beta.solana.com".to_string(),
            commitment: "confirmed".to_string(),
            request_timeout_ms: 30_000,
            signature_page_limit: 1_000,
            transaction_batch_size: 50,
            page_delay_ms: 200,
            batch_delay_ms: 200,
            retry: RetryPolicy::default(),
        }
    }
}
