//! Configuration for the price resolver

use serde::{Deserialize, Serialize};

/// Price resolver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Time-to-live for current prices, in seconds
    pub current_ttl_secs: u64,

    /// Time-to-live for historical prices, in seconds
    pub historical_ttl_secs: u64,

    /// Maximum number of cached quotes
    pub max_cache_entries: usize,

    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,

    /// Jupiter price API base URL
    pub jupiter_url: String,

    /// CoinGecko API base URL
    pub coingecko_url: String,

    /// CoinGecko API key, when available
    pub coingecko_api_key: Option<String>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            current_ttl_secs: 60,
            historical_ttl_secs: 86_400,
            max_cache_entries: 10_000,
            request_timeout_ms: 10_000,
            jupiter_url: "https://price.jup.ag/v6".to_string(),
            coingecko_url: "https://api.coingecko.com/api/v3".to_string(),
            coingecko_api_key: None,
        }
    }
}
