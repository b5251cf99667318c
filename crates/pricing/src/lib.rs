//! Price resolution for the analysis pipeline
//!
//! Converts token mints to USD prices using current/historical lookups
//! behind a two-tier TTL cache and an ordered provider fallback chain. A
//! price that no provider can answer is Unavailable (`None`): the caller
//! leaves the affected valuation fields empty, which lowers the run's
//! confidence score downstream instead of aborting anything.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use wallet_perf_core::{PriceQuote, PriceSource};

mod cache;
mod config;
pub mod providers;

pub use cache::{PriceCache, PriceCacheStats};
pub use config::PricingConfig;
pub use providers::{
    CoinGeckoProvider, JupiterProvider, PriceProvider, ProviderError, StablecoinProvider,
};

/// Resolver over an ordered provider chain with a shared cache
pub struct PriceResolver {
    providers: Vec<Arc<dyn PriceProvider>>,
    cache: Arc<PriceCache>,
}

impl PriceResolver {
    /// Create a resolver with the default provider chain:
    /// stablecoin pin, then Jupiter, then CoinGecko
    pub fn new(config: PricingConfig) -> Self {
        let cache = Arc::new(PriceCache::new(
            Duration::from_secs(config.current_ttl_secs),
            Duration::from_secs(config.historical_ttl_secs),
            config.max_cache_entries,
        ));

        let providers: Vec<Arc<dyn PriceProvider>> = vec![
            Arc::new(StablecoinProvider),
            Arc::new(JupiterProvider::new(&config)),
            Arc::new(CoinGeckoProvider::new(&config)),
        ];

        Self { providers, cache }
    }

    /// Create a resolver over explicit providers and cache (test seam)
    pub fn with_providers(cache: Arc<PriceCache>, providers: Vec<Arc<dyn PriceProvider>>) -> Self {
        Self { providers, cache }
    }

    /// Snapshot of cache statistics
    pub fn cache_stats(&self) -> PriceCacheStats {
        self.cache.stats()
    }

    /// Price of a mint at a historical timestamp, or `None` when every
    /// provider comes up empty
    pub async fn price_at(&self, mint: &str, at: DateTime<Utc>) -> Option<PriceQuote> {
        if let Some(hit) = self.cache.get_historical(mint, at) {
            return Some(hit);
        }

        for provider in &self.providers {
            match provider.historical_price(mint, at).await {
                Ok(Some(quote)) => {
                    self.cache.put_historical(mint, at, quote.clone());
                    return Some(quote);
                }
                Ok(None) => continue,
                Err(err) => {
                    warn!(
                        mint,
                        provider = provider.name(),
                        error = %err,
                        "historical price lookup failed, trying next provider"
                    );
                    continue;
                }
            }
        }

        debug!(mint, at = %at, "no provider could price mint");
        None
    }

    /// Current price of a mint, or `None` when unavailable
    pub async fn current_price(&self, mint: &str) -> Option<PriceQuote> {
        if let Some(hit) = self.cache.get_current(mint) {
            return Some(hit);
        }

        for provider in &self.providers {
            match provider.current_price(mint).await {
                Ok(Some(quote)) => {
                    self.cache.put_current(mint, quote.clone());
                    return Some(quote);
                }
                Ok(None) => continue,
                Err(err) => {
                    warn!(
                        mint,
                        provider = provider.name(),
                        error = %err,
                        "current price lookup failed, trying next provider"
                    );
                    continue;
                }
            }
        }

        None
    }
}

#[async_trait]
impl PriceSource for PriceResolver {
    async fn price_at(&self, mint: &str, at: DateTime<Utc>) -> Option<PriceQuote> {
        PriceResolver::price_at(self, mint, at).await
    }

    async fn current_price(&self, mint: &str) -> Option<PriceQuote> {
        PriceResolver::current_price(self, mint).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::TimeZone;

    struct FakeProvider {
        name: &'static str,
        prices: HashMap<String, f64>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn new(name: &'static str, prices: &[(&str, f64)]) -> Self {
            Self {
                name,
                prices: prices
                    .iter()
                    .map(|(mint, price)| (mint.to_string(), *price))
                    .collect(),
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(name: &'static str) -> Self {
            Self {
                name,
                prices: HashMap::new(),
                fail: true,
                calls: AtomicUsize::new(0),
            }
        }

        fn answer(&self, mint: &str) -> Result<Option<PriceQuote>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProviderError::Http("connection refused".to_string()));
            }
            Ok(self.prices.get(mint).map(|price| PriceQuote {
                price_usd: *price,
                source: self.name.to_string(),
                confidence: 1.0,
            }))
        }
    }

    #[async_trait]
    impl PriceProvider for FakeProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn current_price(&self, mint: &str) -> Result<Option<PriceQuote>, ProviderError> {
            self.answer(mint)
        }

        async fn historical_price(
            &self,
            mint: &str,
            _at: DateTime<Utc>,
        ) -> Result<Option<PriceQuote>, ProviderError> {
            self.answer(mint)
        }
    }

    fn test_cache() -> Arc<PriceCache> {
        Arc::new(PriceCache::new(
            Duration::from_secs(60),
            Duration::from_secs(3600),
            100,
        ))
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn falls_through_providers_in_order() {
        let first = Arc::new(FakeProvider::new("first", &[]));
        let second = Arc::new(FakeProvider::new("second", &[("MintA", 2.5)]));
        let resolver =
            PriceResolver::with_providers(test_cache(), vec![first.clone(), second.clone()]);

        let quote = resolver.price_at("MintA", at(1_700_000_000)).await.unwrap();
        assert_eq!(quote.source, "second");
        assert_eq!(quote.price_usd, 2.5);
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn provider_failure_is_not_fatal() {
        let broken = Arc::new(FakeProvider::failing("broken"));
        let healthy = Arc::new(FakeProvider::new("healthy", &[("MintA", 1.0)]));
        let resolver = PriceResolver::with_providers(test_cache(), vec![broken, healthy]);

        assert!(resolver.price_at("MintA", at(1_700_000_000)).await.is_some());
    }

    #[tokio::test]
    async fn unavailable_when_every_provider_comes_up_empty() {
        let broken = Arc::new(FakeProvider::failing("broken"));
        let empty = Arc::new(FakeProvider::new("empty", &[]));
        let resolver = PriceResolver::with_providers(test_cache(), vec![broken, empty]);

        assert!(resolver.price_at("MintA", at(1_700_000_000)).await.is_none());
        assert!(resolver.current_price("MintA").await.is_none());
    }

    #[tokio::test]
    async fn repeated_lookups_hit_the_cache() {
        let provider = Arc::new(FakeProvider::new("only", &[("MintA", 3.0)]));
        let resolver = PriceResolver::with_providers(test_cache(), vec![provider.clone()]);

        resolver.price_at("MintA", at(1_700_000_000)).await;
        resolver.price_at("MintA", at(1_700_000_010)).await;

        // Same minute bucket: one provider call, one cache hit
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.cache_stats().hits, 1);
    }

    #[tokio::test]
    async fn current_and_historical_tiers_cache_separately() {
        let provider = Arc::new(FakeProvider::new("only", &[("MintA", 3.0)]));
        let resolver = PriceResolver::with_providers(test_cache(), vec![provider.clone()]);

        resolver.current_price("MintA").await;
        resolver.price_at("MintA", at(1_700_000_000)).await;

        // Different tiers, two provider calls
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }
}
