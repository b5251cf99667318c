//! Ledger RPC client for the Wallet Performance Analysis Engine
//!
//! Retrieval of a wallet's transaction history under rate limits and
//! partial failures:
//! - Backward cursor pagination of signature listings
//! - Batched, concurrent transaction fetches with wait-for-all semantics
//! - Bounded retry with a fixed backoff table
//! - Pacing delays between pages and batches
//! - A slot-height health probe and a metrics snapshot for observability
//!
//! Raw RPC payloads are converted into owned [`wallet_perf_core::TransactionRecord`]s
//! at this boundary; nothing downstream touches encoded response shapes.

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::future::join_all;
use serde_json::json;
use solana_client::client_error::ClientError;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_transaction_status::UiTransactionEncoding;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use wallet_perf_core::{
    AnalysisError, SignatureInfo, SignaturePage, SignatureQuery, TransactionBatch,
    TransactionRecord, TransactionSource,
};

mod config;
mod convert;
mod metrics;
mod retry;

pub use config::{LedgerConfig, RetryPolicy};
pub use metrics::{LedgerMetrics, LedgerMetricsSnapshot};

/// Result type for the ledger client
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Error types for the ledger client
#[derive(thiserror::Error, Debug, Clone)]
pub enum LedgerError {
    #[error("rpc call failed: {0}")]
    Call(String),

    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("transaction not found")]
    NotFound,

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetryExhausted { attempts: usize, last: String },
}

impl LedgerError {
    /// Whether the error is worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Call(_) | LedgerError::Timeout(_))
    }
}

fn classify_client_error(err: ClientError) -> LedgerError {
    let message = err.to_string();
    if message.to_lowercase().contains("not found") {
        LedgerError::NotFound
    } else {
        LedgerError::Call(message)
    }
}

/// Client for the ledger RPC collaborator
#[derive(Clone)]
pub struct LedgerClient {
    /// Underlying nonblocking RPC client
    rpc: Arc<RpcClient>,

    /// Configuration
    config: LedgerConfig,

    /// Metrics collector
    metrics: Arc<LedgerMetrics>,
}

impl LedgerClient {
    /// Create a new ledger client
    pub fn new(config: LedgerConfig) -> Self {
        info!(endpoint = %config.endpoint_url, commitment = %config.commitment, "initializing ledger client");

        let rpc = Arc::new(RpcClient::new_with_timeout_and_commitment(
            config.endpoint_url.clone(),
            Duration::from_millis(config.request_timeout_ms),
            config.commitment_config(),
        ));

        Self {
            rpc,
            config,
            metrics: Arc::new(LedgerMetrics::new()),
        }
    }

    /// Snapshot of request/latency metrics (side-effect-free read)
    pub fn metrics(&self) -> LedgerMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Connection health probe: the node's current slot height
    pub async fn current_slot(&self) -> LedgerResult<u64> {
        let this = self.clone();
        retry::with_retry(
            &self.config.retry,
            "getSlot",
            || self.metrics.record_retry(),
            move || {
                let this = this.clone();
                async move {
                    this.metrics.record_request();
                    let started = Instant::now();
                    let timeout_ms = this.config.request_timeout_ms;

                    match timeout(Duration::from_millis(timeout_ms), this.rpc.get_slot()).await {
                        Ok(Ok(slot)) => {
                            this.metrics.record_success(started.elapsed());
                            Ok(slot)
                        }
                        Ok(Err(err)) => {
                            this.metrics.record_failure();
                            Err(classify_client_error(err))
                        }
                        Err(_) => {
                            this.metrics.record_timeout();
                            Err(LedgerError::Timeout(timeout_ms))
                        }
                    }
                }
            },
        )
        .await
    }

    /// List signatures for a wallet, paginating backward from the most
    /// recent until the `until` boundary, an empty page, or the query's
    /// signature ceiling
    ///
    /// A page that still fails after retries is converted into an
    /// `rpc_error` diagnostic and pagination stops early; signatures from
    /// prior pages are retained.
    pub async fn list_signatures(&self, wallet: &str, query: &SignatureQuery) -> SignaturePage {
        let pubkey = match Pubkey::from_str(wallet) {
            Ok(key) => key,
            Err(_) => {
                return SignaturePage {
                    signatures: Vec::new(),
                    errors: vec![AnalysisError::parsing(
                        format!("invalid wallet address: {wallet}"),
                        json!({ "wallet": wallet }),
                    )],
                    complete: false,
                }
            }
        };

        let before = match parse_cursor(query.before.as_deref()) {
            Ok(cursor) => cursor,
            Err(err) => {
                return SignaturePage {
                    signatures: Vec::new(),
                    errors: vec![err],
                    complete: false,
                }
            }
        };
        let until = match parse_cursor(query.until.as_deref()) {
            Ok(cursor) => cursor,
            Err(err) => {
                return SignaturePage {
                    signatures: Vec::new(),
                    errors: vec![err],
                    complete: false,
                }
            }
        };

        let page_delay = Duration::from_millis(self.config.page_delay_ms);
        let page_cap = self.config.signature_page_limit;
        let this = self.clone();

        let page = paginate(query, before, page_delay, page_cap, move |cursor, limit| {
            let this = this.clone();
            async move { this.fetch_signature_page(&pubkey, cursor, until, limit).await }
        })
        .await;

        debug!(
            wallet,
            collected = page.signatures.len(),
            complete = page.complete,
            "signature listing finished"
        );

        page
    }

    /// Fetch transaction records for the given signatures
    ///
    /// Signatures are processed in batches; fetches within a batch run
    /// concurrently and each outcome is kept independently, so one
    /// transaction's failure never fails its siblings. The result is
    /// positionally matched to the input.
    pub async fn fetch_transactions(&self, signatures: &[String]) -> TransactionBatch {
        let mut transactions: Vec<Option<TransactionRecord>> = Vec::with_capacity(signatures.len());
        let mut errors = Vec::new();

        if signatures.is_empty() {
            return TransactionBatch {
                transactions,
                errors,
            };
        }

        let batch_size = self.config.transaction_batch_size.max(1);
        let batch_count = (signatures.len() + batch_size - 1) / batch_size;
        let batch_delay = Duration::from_millis(self.config.batch_delay_ms);

        for (index, chunk) in signatures.chunks(batch_size).enumerate() {
            let outcomes = join_all(chunk.iter().map(|sig| self.fetch_transaction(sig))).await;

            let mut fetched = 0u64;
            for (signature, outcome) in chunk.iter().zip(outcomes) {
                match outcome {
                    Ok(record) => {
                        fetched += 1;
                        transactions.push(Some(record));
                    }
                    Err(LedgerError::Malformed(message)) => {
                        transactions.push(None);
                        errors.push(AnalysisError::parsing(
                            message,
                            json!({ "signature": signature }),
                        ));
                    }
                    Err(err) => {
                        transactions.push(None);
                        errors.push(AnalysisError::rpc(
                            format!("transaction fetch failed: {err}"),
                            json!({ "signature": signature }),
                        ));
                    }
                }
            }
            self.metrics.record_transactions(fetched);

            // Pace the upstream between batches, but not after the last one
            if index + 1 < batch_count {
                sleep(batch_delay).await;
            }
        }

        if !errors.is_empty() {
            warn!(
                requested = signatures.len(),
                failed = errors.len(),
                "transaction batch finished with failures"
            );
        }

        TransactionBatch {
            transactions,
            errors,
        }
    }

    async fn fetch_signature_page(
        &self,
        wallet: &Pubkey,
        before: Option<Signature>,
        until: Option<Signature>,
        limit: usize,
    ) -> LedgerResult<Vec<SignatureInfo>> {
        let this = self.clone();
        let wallet = *wallet;

        let statuses = retry::with_retry(
            &self.config.retry,
            "getSignaturesForAddress",
            || self.metrics.record_retry(),
            move || {
                let this = this.clone();
                async move {
                    this.metrics.record_request();
                    let started = Instant::now();
                    let timeout_ms = this.config.request_timeout_ms;

                    let request = GetConfirmedSignaturesForAddress2Config {
                        before,
                        until,
                        limit: Some(limit),
                        commitment: Some(this.config.commitment_config()),
                    };

                    match timeout(
                        Duration::from_millis(timeout_ms),
                        this.rpc
                            .get_signatures_for_address_with_config(&wallet, request),
                    )
                    .await
                    {
                        Ok(Ok(statuses)) => {
                            this.metrics.record_success(started.elapsed());
                            this.metrics.record_signature_page();
                            Ok(statuses)
                        }
                        Ok(Err(err)) => {
                            this.metrics.record_failure();
                            Err(classify_client_error(err))
                        }
                        Err(_) => {
                            this.metrics.record_timeout();
                            Err(LedgerError::Timeout(timeout_ms))
                        }
                    }
                }
            },
        )
        .await?;

        Ok(statuses
            .into_iter()
            .map(|status| SignatureInfo {
                signature: status.signature,
                slot: status.slot,
                block_time: status
                    .block_time
                    .and_then(|t| Utc.timestamp_opt(t, 0).single()),
                failed: status.err.is_some(),
            })
            .collect())
    }

    async fn fetch_transaction(&self, signature: &str) -> LedgerResult<TransactionRecord> {
        let sig = Signature::from_str(signature)
            .map_err(|_| LedgerError::Malformed(format!("invalid signature: {signature}")))?;

        let this = self.clone();
        let encoded = retry::with_retry(
            &self.config.retry,
            "getTransaction",
            || self.metrics.record_retry(),
            move || {
                let this = this.clone();
                async move {
                    this.metrics.record_request();
                    let started = Instant::now();
                    let timeout_ms = this.config.request_timeout_ms;

                    let request = RpcTransactionConfig {
                        encoding: Some(UiTransactionEncoding::Json),
                        commitment: Some(this.config.commitment_config()),
                        max_supported_transaction_version: Some(0),
                    };

                    match timeout(
                        Duration::from_millis(timeout_ms),
                        this.rpc.get_transaction_with_config(&sig, request),
                    )
                    .await
                    {
                        Ok(Ok(encoded)) => {
                            this.metrics.record_success(started.elapsed());
                            Ok(encoded)
                        }
                        Ok(Err(err)) => {
                            this.metrics.record_failure();
                            Err(classify_client_error(err))
                        }
                        Err(_) => {
                            this.metrics.record_timeout();
                            Err(LedgerError::Timeout(timeout_ms))
                        }
                    }
                }
            },
        )
        .await?;

        convert::transaction_record(signature, encoded)
    }
}

#[async_trait]
impl TransactionSource for LedgerClient {
    async fn list_signatures(&self, wallet: &str, query: &SignatureQuery) -> SignaturePage {
        LedgerClient::list_signatures(self, wallet, query).await
    }

    async fn fetch_transactions(&self, signatures: &[String]) -> TransactionBatch {
        LedgerClient::fetch_transactions(self, signatures).await
    }

    async fn current_slot(&self) -> anyhow::Result<u64> {
        Ok(LedgerClient::current_slot(self).await?)
    }
}

fn parse_cursor(cursor: Option<&str>) -> Result<Option<Signature>, AnalysisError> {
    match cursor {
        None => Ok(None),
        Some(raw) => Signature::from_str(raw).map(Some).map_err(|_| {
            AnalysisError::parsing(
                format!("invalid cursor signature: {raw}"),
                json!({ "signature": raw }),
            )
        }),
    }
}

/// Drive backward pagination over a page-fetching function
///
/// Factored out of [`LedgerClient::list_signatures`] so the loop's
/// termination and failure semantics are testable without an endpoint.
async fn paginate<F, Fut>(
    query: &SignatureQuery,
    start_cursor: Option<Signature>,
    page_delay: Duration,
    page_cap: usize,
    mut fetch: F,
) -> SignaturePage
where
    F: FnMut(Option<Signature>, usize) -> Fut,
    Fut: std::future::Future<Output = LedgerResult<Vec<SignatureInfo>>>,
{
    let mut signatures: Vec<SignatureInfo> = Vec::new();
    let mut errors: Vec<AnalysisError> = Vec::new();
    let mut complete = true;
    let mut cursor = start_cursor;

    loop {
        let remaining = query.max_signatures.saturating_sub(signatures.len());
        if remaining == 0 {
            break;
        }
        let limit = remaining.min(query.limit).min(page_cap).max(1);

        match fetch(cursor, limit).await {
            Ok(page) => {
                let fetched = page.len();
                if fetched == 0 {
                    break;
                }

                let last_signature = page[fetched - 1].signature.clone();
                signatures.extend(page);

                // Short page means the history (or the until boundary) is
                // exhausted; full page at the ceiling means we are done too.
                if fetched < limit || signatures.len() >= query.max_signatures {
                    break;
                }

                match Signature::from_str(&last_signature) {
                    Ok(sig) => cursor = Some(sig),
                    Err(_) => {
                        errors.push(AnalysisError::parsing(
                            "unparseable cursor signature, stopping pagination",
                            json!({ "signature": last_signature }),
                        ));
                        complete = false;
                        break;
                    }
                }

                // Pace the upstream between pages; final pages break above
                // before reaching this point
                sleep(page_delay).await;
            }
            Err(err) => {
                errors.push(AnalysisError::rpc(
                    format!("signature page fetch failed: {err}"),
                    json!({
                        "cursor": cursor.map(|c| c.to_string()),
                        "collected": signatures.len(),
                    }),
                ));
                complete = false;
                break;
            }
        }
    }

    SignaturePage {
        signatures,
        errors,
        complete,
    }
}
