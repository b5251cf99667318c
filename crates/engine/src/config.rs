//! Configuration for the analysis orchestrator

use serde::{Deserialize, Serialize};

use wallet_perf_extractor::ExtractorConfig;
use wallet_perf_fifo::FifoConfig;
use wallet_perf_metrics::MetricsConfig;

/// Orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Rolling analysis window when the request gives no dates, in days
    pub analysis_window_days: i64,

    /// Default ceiling on signatures fetched per wallet
    pub default_max_transactions: usize,

    /// Wallets analyzed concurrently in batch mode
    pub batch_concurrency: usize,

    /// Maximum wallets accepted per batch request
    pub max_batch_wallets: usize,

    /// Metrics calculator settings
    pub metrics: MetricsConfig,

    /// Position ledger settings
    pub fifo: FifoConfig,

    /// Swap extractor settings
    pub extractor: ExtractorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analysis_window_days: 90,
            default_max_transactions: 5_000,
            batch_concurrency: 4,
            max_batch_wallets: 50,
            metrics: MetricsConfig::default(),
            fifo: FifoConfig::default(),
            extractor: ExtractorConfig::default(),
        }
    }
}
