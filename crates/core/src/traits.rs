//! Trait seams between the orchestrator and its RPC-facing collaborators
//!
//! The engine is wired against these traits instead of concrete clients so
//! tests can substitute in-memory fakes without any global state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{PriceQuote, SignaturePage, SignatureQuery, TransactionBatch};

/// Source of signatures and transaction records for a wallet
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// List signatures for a wallet, paginating backward from the most
    /// recent, within the bounds of `query`
    async fn list_signatures(&self, wallet: &str, query: &SignatureQuery) -> SignaturePage;

    /// Fetch transaction records for the given signatures
    ///
    /// The result is positionally matched to `signatures`; individual
    /// failures surface as `None` plus an accumulated error, never as a
    /// batch failure.
    async fn fetch_transactions(&self, signatures: &[String]) -> TransactionBatch;

    /// Connection health probe: the node's current slot height
    async fn current_slot(&self) -> anyhow::Result<u64>;
}

/// Keyed lookup of token prices in USD
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Price of a mint at a historical timestamp, or `None` when every
    /// provider comes up empty
    async fn price_at(&self, mint: &str, at: DateTime<Utc>) -> Option<PriceQuote>;

    /// Current price of a mint, or `None` when unavailable
    async fn current_price(&self, mint: &str) -> Option<PriceQuote>;
}
