//! Price providers, tried in order until one answers
//!
//! Providers return `Ok(None)` when they simply have no answer for a mint
//! and `Err` on transport failures; the resolver treats both as "try the
//! next provider". When the whole chain comes up empty the price is
//! Unavailable, which is a degraded-confidence outcome, not an error.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use wallet_perf_core::PriceQuote;

use crate::config::PricingConfig;

/// Well-known mint addresses
pub mod mints {
    pub const WRAPPED_SOL: &str = "So11111111111111111111111111111111111111112";
    pub const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
    pub const USDT: &str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";
    pub const RAY: &str = "4k3Dyjzvzp8eMZWUXbBCjEvwSkkk59S5iCNLY3QrkX6R";
    pub const BONK: &str = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";
    pub const JUP: &str = "JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN";
}

/// Transport-level provider failures
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("http request failed: {0}")]
    Http(String),

    #[error("provider rate limited")]
    RateLimited,

    #[error("unexpected response shape: {0}")]
    Malformed(String),
}

/// One upstream source of USD prices
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Provider name, recorded on every quote it produces
    fn name(&self) -> &'static str;

    /// Current price of a mint
    async fn current_price(&self, mint: &str) -> Result<Option<PriceQuote>, ProviderError>;

    /// Price of a mint at a historical timestamp
    async fn historical_price(
        &self,
        mint: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<PriceQuote>, ProviderError>;
}

/// Pinned $1 quotes for the major stablecoins
pub struct StablecoinProvider;

impl StablecoinProvider {
    fn pin(&self, mint: &str) -> Option<PriceQuote> {
        if mint == mints::USDC || mint == mints::USDT {
            Some(PriceQuote {
                price_usd: 1.0,
                source: self.name().to_string(),
                confidence: 0.99,
            })
        } else {
            None
        }
    }
}

#[async_trait]
impl PriceProvider for StablecoinProvider {
    fn name(&self) -> &'static str {
        "stablecoin"
    }

    async fn current_price(&self, mint: &str) -> Result<Option<PriceQuote>, ProviderError> {
        Ok(self.pin(mint))
    }

    async fn historical_price(
        &self,
        mint: &str,
        _at: DateTime<Utc>,
    ) -> Result<Option<PriceQuote>, ProviderError> {
        Ok(self.pin(mint))
    }
}

#[derive(Debug, Deserialize)]
struct JupiterPriceResponse {
    data: HashMap<String, JupiterPriceEntry>,
}

#[derive(Debug, Deserialize)]
struct JupiterPriceEntry {
    price: f64,
}

/// Jupiter price API: authoritative for current prices of any listed mint
pub struct JupiterProvider {
    client: reqwest::Client,
    base_url: String,
}

impl JupiterProvider {
    /// Build from the pricing config
    pub fn new(config: &PricingConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(config.request_timeout_ms))
                .build()
                .unwrap_or_default(),
            base_url: config.jupiter_url.clone(),
        }
    }

    async fn fetch(&self, mint: &str) -> Result<Option<f64>, ProviderError> {
        let url = format!("{}/price", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("ids", mint)])
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        if response.status().as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        if !response.status().is_success() {
            return Err(ProviderError::Http(format!(
                "jupiter returned {}",
                response.status()
            )));
        }

        let body: JupiterPriceResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        Ok(body.data.get(mint).map(|entry| entry.price))
    }
}

#[async_trait]
impl PriceProvider for JupiterProvider {
    fn name(&self) -> &'static str {
        "jupiter"
    }

    async fn current_price(&self, mint: &str) -> Result<Option<PriceQuote>, ProviderError> {
        let Some(price) = self.fetch(mint).await? else {
            debug!(mint, "jupiter has no quote");
            return Ok(None);
        };

        Ok(Some(PriceQuote {
            price_usd: price,
            source: self.name().to_string(),
            confidence: 0.95,
        }))
    }

    async fn historical_price(
        &self,
        mint: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<PriceQuote>, ProviderError> {
        // Jupiter only serves spot prices; usable as a recent-history
        // fallback within the last day, at reduced confidence
        let age = Utc::now().signed_duration_since(at);
        if age.num_seconds() > 86_400 || age.num_seconds() < 0 {
            return Ok(None);
        }

        let Some(price) = self.fetch(mint).await? else {
            return Ok(None);
        };

        Ok(Some(PriceQuote {
            price_usd: price,
            source: self.name().to_string(),
            confidence: 0.90,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct CoinGeckoHistory {
    market_data: Option<CoinGeckoMarketData>,
}

#[derive(Debug, Deserialize)]
struct CoinGeckoMarketData {
    current_price: HashMap<String, f64>,
}

/// CoinGecko: historical daily prices for the well-known mints
pub struct CoinGeckoProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    coin_ids: HashMap<&'static str, &'static str>,
}

impl CoinGeckoProvider {
    /// Build from the pricing config
    pub fn new(config: &PricingConfig) -> Self {
        let coin_ids = HashMap::from([
            (mints::WRAPPED_SOL, "solana"),
            (mints::USDC, "usd-coin"),
            (mints::USDT, "tether"),
            (mints::RAY, "raydium"),
            (mints::BONK, "bonk"),
            (mints::JUP, "jupiter-exchange-solana"),
        ]);

        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(config.request_timeout_ms))
                .build()
                .unwrap_or_default(),
            base_url: config.coingecko_url.clone(),
            api_key: config.coingecko_api_key.clone(),
            coin_ids,
        }
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut request = self.client.get(url);
        if let Some(key) = &self.api_key {
            request = request.header("X-CG-Demo-API-Key", key);
        }
        request
    }
}

#[async_trait]
impl PriceProvider for CoinGeckoProvider {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn current_price(&self, mint: &str) -> Result<Option<PriceQuote>, ProviderError> {
        let Some(coin_id) = self.coin_ids.get(mint) else {
            return Ok(None);
        };

        let url = format!("{}/simple/price", self.base_url);
        let response = self
            .request(&url)
            .query(&[("ids", *coin_id), ("vs_currencies", "usd")])
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        if response.status().as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        if !response.status().is_success() {
            return Err(ProviderError::Http(format!(
                "coingecko returned {}",
                response.status()
            )));
        }

        let body: HashMap<String, HashMap<String, f64>> = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let price = body
            .get(*coin_id)
            .and_then(|prices| prices.get("usd"))
            .copied();

        Ok(price.map(|price_usd| PriceQuote {
            price_usd,
            source: self.name().to_string(),
            confidence: 0.95,
        }))
    }

    async fn historical_price(
        &self,
        mint: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<PriceQuote>, ProviderError> {
        let Some(coin_id) = self.coin_ids.get(mint) else {
            return Ok(None);
        };

        // CoinGecko's history endpoint takes DD-MM-YYYY
        let date = at.format("%d-%m-%Y").to_string();
        let url = format!("{}/coins/{}/history", self.base_url, coin_id);

        let response = self
            .request(&url)
            .query(&[("date", date.as_str()), ("localization", "false")])
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        if response.status().as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        if !response.status().is_success() {
            warn!(mint, status = %response.status(), "coingecko history request failed");
            return Err(ProviderError::Http(format!(
                "coingecko returned {}",
                response.status()
            )));
        }

        let body: CoinGeckoHistory = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let price = body
            .market_data
            .and_then(|m| m.current_price.get("usd").copied());

        Ok(price.map(|price_usd| PriceQuote {
            price_usd,
            source: self.name().to_string(),
            confidence: 0.95,
        }))
    }
}
