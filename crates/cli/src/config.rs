//! Application configuration: one JSON file covering every component

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use wallet_perf_engine::EngineConfig;
use wallet_perf_pricing::PricingConfig;
use wallet_perf_rpc::LedgerConfig;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Ledger RPC client settings
    pub ledger: LedgerConfig,

    /// Price resolver settings
    pub pricing: PricingConfig,

    /// Orchestrator settings
    pub engine: EngineConfig,
}

/// Load configuration from a JSON file, falling back to defaults when the
/// file does not exist
pub fn load_or_default(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Save configuration to a JSON file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let raw = serde_json::to_string_pretty(config)?;
    std::fs::write(path, raw)
        .with_context(|| format!("failed to write config file {}", path.display()))?;
    Ok(())
}
