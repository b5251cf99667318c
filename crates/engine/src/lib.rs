//! Analysis orchestrator
//!
//! Sequences the pipeline for one wallet (signatures, transactions, swap
//! extraction, USD enrichment, FIFO accounting, metrics) and fans out
//! across wallets for batch requests under a bounded concurrency ceiling.
//! Errors from every stage accumulate on the result instead of aborting
//! the run; a stage that fails completely degrades the wallet's status,
//! never the process.
//!
//! Collaborators are constructor-injected behind the
//! [`TransactionSource`]/[`PriceSource`] trait seams, so tests run the
//! whole pipeline against in-memory fakes.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use wallet_perf_core::{
    validate_wallet_address, AnalysisError, AnalysisStatus, BatchAnalysisRequest,
    BatchAnalysisResult, BatchSummary, PriceSource, ProcessingStats, SignatureQuery, SwapEvent,
    TransactionRecord, TransactionSource, WalletAnalysisConfig, WalletAnalysisResult,
    WalletPerformanceMetrics,
};
use wallet_perf_extractor::SwapExtractor;
use wallet_perf_fifo::PositionLedger;
use wallet_perf_metrics::{AnalysisWindow, MetricsCalculator};

mod config;
mod enrich;

pub use config::EngineConfig;
pub use enrich::{attach_valuations, Enrichment};

/// Snapshot of engine processing counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatusSnapshot {
    /// Analysis runs started
    pub runs_started: u64,

    /// Runs that completed fully
    pub runs_completed: u64,

    /// Runs that produced a partial report
    pub runs_partial: u64,

    /// Runs with no usable data
    pub runs_failed: u64,

    /// Average per-run processing time in milliseconds
    pub avg_processing_time_ms: u64,

    /// When the engine was constructed
    pub started_at: DateTime<Utc>,

    /// Timestamp of the snapshot
    pub timestamp: DateTime<Utc>,
}

/// Health report for the observability consumer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineHealth {
    /// Whether the ledger collaborator answered the probe
    pub healthy: bool,

    /// Current slot height, when the probe succeeded
    pub current_slot: Option<u64>,

    /// Probe failure message, when it did not
    pub error: Option<String>,

    /// Engine processing counters
    pub status: EngineStatusSnapshot,

    /// When the probe ran
    pub last_check: DateTime<Utc>,
}

#[derive(Default)]
struct EngineCounters {
    runs_started: AtomicU64,
    runs_completed: AtomicU64,
    runs_partial: AtomicU64,
    runs_failed: AtomicU64,
    total_processing_ms: AtomicU64,
}

/// The wallet analysis orchestrator
pub struct AnalysisEngine {
    transactions: Arc<dyn TransactionSource>,
    prices: Arc<dyn PriceSource>,
    extractor: SwapExtractor,
    metrics: MetricsCalculator,
    config: EngineConfig,
    counters: EngineCounters,
    started_at: DateTime<Utc>,
}

impl AnalysisEngine {
    /// Create an engine over the given collaborators
    pub fn new(
        transactions: Arc<dyn TransactionSource>,
        prices: Arc<dyn PriceSource>,
        config: EngineConfig,
    ) -> Self {
        Self {
            transactions,
            prices,
            extractor: SwapExtractor::new(config.extractor.clone()),
            metrics: MetricsCalculator::new(config.metrics.clone()),
            config,
            counters: EngineCounters::default(),
            started_at: Utc::now(),
        }
    }

    /// Snapshot of engine processing counters (side-effect-free read)
    pub fn status(&self) -> EngineStatusSnapshot {
        let started = self.counters.runs_started.load(Ordering::SeqCst);
        let finished = self.counters.runs_completed.load(Ordering::SeqCst)
            + self.counters.runs_partial.load(Ordering::SeqCst)
            + self.counters.runs_failed.load(Ordering::SeqCst);
        let total_ms = self.counters.total_processing_ms.load(Ordering::SeqCst);

        EngineStatusSnapshot {
            runs_started: started,
            runs_completed: self.counters.runs_completed.load(Ordering::SeqCst),
            runs_partial: self.counters.runs_partial.load(Ordering::SeqCst),
            runs_failed: self.counters.runs_failed.load(Ordering::SeqCst),
            avg_processing_time_ms: if finished > 0 { total_ms / finished } else { 0 },
            started_at: self.started_at,
            timestamp: Utc::now(),
        }
    }

    /// Probe the ledger collaborator and report engine health
    pub async fn health(&self) -> EngineHealth {
        let (healthy, current_slot, error) = match self.transactions.current_slot().await {
            Ok(slot) => (true, Some(slot), None),
            Err(err) => (false, None, Some(err.to_string())),
        };

        EngineHealth {
            healthy,
            current_slot,
            error,
            status: self.status(),
            last_check: Utc::now(),
        }
    }

    /// Analyze one wallet
    ///
    /// Always returns a result: a wallet with zero usable transactions
    /// comes back as `status: failed` with an empty metrics object.
    pub async fn analyze_wallet(&self, config: WalletAnalysisConfig) -> WalletAnalysisResult {
        let started = Instant::now();
        self.counters.runs_started.fetch_add(1, Ordering::SeqCst);

        let mut stats = ProcessingStats::default();

        let period_end = config.end_date.unwrap_or_else(Utc::now);
        let period_start = config
            .start_date
            .unwrap_or(period_end - Duration::days(self.config.analysis_window_days));
        let window = AnalysisWindow {
            start: period_start,
            end: period_end,
        };

        if let Err(err) = validate_wallet_address(&config.wallet_address) {
            stats.errors.push(AnalysisError::parsing(
                format!("invalid wallet address: {err}"),
                json!({ "wallet": config.wallet_address }),
            ));
            return self.finish(
                config,
                WalletPerformanceMetrics::empty(window.start, window.end),
                stats,
                AnalysisStatus::Failed,
                started,
            );
        }

        info!(wallet = %config.wallet_address, "starting wallet analysis");

        // Stage 1: signature history
        let query = SignatureQuery {
            before: None,
            until: None,
            limit: 1_000,
            max_signatures: config
                .max_transactions
                .unwrap_or(self.config.default_max_transactions),
        };
        let page = self
            .transactions
            .list_signatures(&config.wallet_address, &query)
            .await;
        let signatures_complete = page.complete;
        stats.errors.extend(page.errors);

        // On-chain failures never parse into swaps, and signatures with a
        // known block time outside the window cannot contribute either;
        // neither is worth a detail fetch
        let signatures: Vec<String> = page
            .signatures
            .iter()
            .filter(|sig| !sig.failed)
            .filter(|sig| match sig.block_time {
                Some(t) => t >= period_start && t <= period_end,
                None => true,
            })
            .map(|sig| sig.signature.clone())
            .collect();

        if signatures.is_empty() {
            debug!(wallet = %config.wallet_address, "no usable signatures in window");
            return self.finish(
                config,
                WalletPerformanceMetrics::empty(window.start, window.end),
                stats,
                AnalysisStatus::Failed,
                started,
            );
        }

        // Stage 2: transaction details
        let batch = self.transactions.fetch_transactions(&signatures).await;
        stats.errors.extend(batch.errors);
        let records: Vec<TransactionRecord> = batch.transactions.into_iter().flatten().collect();
        stats.total_transactions_fetched = records.len();

        // Stage 3: swap extraction
        let extraction = self.extractor.extract(&config.wallet_address, &records);
        stats.errors.extend(extraction.errors);
        let mut events = extraction.events;
        events.retain(|e| e.block_time >= period_start && e.block_time <= period_end);
        apply_token_filters(&mut events, &config);
        stats.valid_swaps_found = events.len();

        // FIFO correctness depends on ascending block-time order
        events.sort_by(|a, b| {
            a.block_time
                .cmp(&b.block_time)
                .then(a.slot.cmp(&b.slot))
                .then(a.signature.cmp(&b.signature))
        });

        // Stage 4: USD enrichment
        let enrichment = attach_valuations(self.prices.as_ref(), &events).await;
        stats.price_data_missing_count = enrichment.price_data_missing;
        stats.errors.extend(enrichment.errors);

        let min_value = config.min_trade_value_usd.unwrap_or(0.0);
        let swaps: Vec<_> = enrichment
            .swaps
            .into_iter()
            .filter(|s| {
                if min_value <= 0.0 {
                    return true;
                }
                // Unvalued swaps cannot be filtered by value; keep them
                s.token_in_usd
                    .or(s.token_out_usd)
                    .map(|v| v >= min_value)
                    .unwrap_or(true)
            })
            .collect();

        // Stage 5: FIFO accounting
        let mut ledger = PositionLedger::new(self.config.fifo.clone());
        let mut trades = Vec::new();
        for swap in &swaps {
            let outcome = ledger.apply(swap);
            trades.extend(outcome.trades);
            stats.errors.extend(outcome.errors);
        }

        // Stage 6: performance report
        let fees_usd: f64 = swaps.iter().filter_map(|s| s.fee_usd).sum();
        let open_positions = ledger.open_positions();
        let metrics = self.metrics.summarize(
            &trades,
            &open_positions,
            &window,
            fees_usd,
            stats.price_data_missing_count,
        );

        let status = if trades.is_empty() {
            AnalysisStatus::Failed
        } else if !signatures_complete
            || !stats.errors.is_empty()
            || trades.len() < self.config.metrics.min_trades
        {
            AnalysisStatus::Partial
        } else {
            AnalysisStatus::Completed
        };

        info!(
            wallet = %config.wallet_address,
            trades = trades.len(),
            swaps = swaps.len(),
            errors = stats.errors.len(),
            ?status,
            "wallet analysis finished"
        );

        self.finish(config, metrics, stats, status, started)
    }

    /// Analyze a batch of wallets independently and concurrently
    ///
    /// One wallet's failure never aborts the batch; the result carries
    /// exactly one entry per requested wallet, in request order.
    pub async fn analyze_batch(&self, request: BatchAnalysisRequest) -> BatchAnalysisResult {
        let started = Instant::now();
        let requested = request.wallet_addresses.len();
        info!(
            wallets = requested,
            priority = ?request.priority,
            "starting batch analysis"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.batch_concurrency.max(1)));
        let cap = self.config.max_batch_wallets;

        let futures = request
            .wallet_addresses
            .iter()
            .enumerate()
            .map(|(index, wallet)| {
                let semaphore = semaphore.clone();
                let wallet = wallet.clone();
                let request = &request;
                async move {
                    if index >= cap {
                        let now = Utc::now();
                        let mut stats = ProcessingStats::default();
                        stats.errors.push(AnalysisError::parsing(
                            format!("batch wallet limit ({cap}) exceeded"),
                            json!({ "wallet": wallet, "index": index }),
                        ));
                        return WalletAnalysisResult {
                            config: WalletAnalysisConfig::for_wallet(wallet),
                            metrics: WalletPerformanceMetrics::empty(now, now),
                            processing_stats: stats,
                            status: AnalysisStatus::Failed,
                            completed_at: now,
                        };
                    }

                    let _permit = semaphore.acquire().await.ok();
                    self.analyze_wallet(WalletAnalysisConfig {
                        wallet_address: wallet,
                        start_date: request.start_date,
                        end_date: request.end_date,
                        min_trade_value_usd: request.min_trade_value_usd,
                        include_tokens: None,
                        exclude_tokens: None,
                        max_transactions: request.max_transactions,
                    })
                    .await
                }
            });

        let results = join_all(futures).await;

        let completed = results
            .iter()
            .filter(|r| r.status == AnalysisStatus::Completed)
            .count();
        let partial = results
            .iter()
            .filter(|r| r.status == AnalysisStatus::Partial)
            .count();
        let failed = results
            .iter()
            .filter(|r| r.status == AnalysisStatus::Failed)
            .count();
        let per_wallet_ms: u64 = results
            .iter()
            .map(|r| r.processing_stats.processing_time_ms)
            .sum();

        let summary = BatchSummary {
            requested,
            completed,
            partial,
            failed,
            avg_processing_time_ms: if requested > 0 {
                per_wallet_ms / requested as u64
            } else {
                0
            },
            total_processing_time_ms: started.elapsed().as_millis() as u64,
        };

        info!(?summary, "batch analysis finished");

        BatchAnalysisResult {
            results,
            summary,
            completed_at: Utc::now(),
        }
    }

    fn finish(
        &self,
        config: WalletAnalysisConfig,
        metrics: WalletPerformanceMetrics,
        mut stats: ProcessingStats,
        status: AnalysisStatus,
        started: Instant,
    ) -> WalletAnalysisResult {
        stats.processing_time_ms = started.elapsed().as_millis() as u64;
        self.counters
            .total_processing_ms
            .fetch_add(stats.processing_time_ms, Ordering::SeqCst);

        let counter = match status {
            AnalysisStatus::Completed => &self.counters.runs_completed,
            AnalysisStatus::Partial => &self.counters.runs_partial,
            AnalysisStatus::Failed => &self.counters.runs_failed,
        };
        counter.fetch_add(1, Ordering::SeqCst);

        if status == AnalysisStatus::Failed {
            warn!(wallet = %config.wallet_address, "analysis produced no usable data");
        }

        WalletAnalysisResult {
            config,
            metrics,
            processing_stats: stats,
            status,
            completed_at: Utc::now(),
        }
    }
}

fn apply_token_filters(events: &mut Vec<SwapEvent>, config: &WalletAnalysisConfig) {
    if let Some(include) = &config.include_tokens {
        let include: HashSet<&str> = include.iter().map(String::as_str).collect();
        events.retain(|e| {
            include.contains(e.token_in.mint.as_str())
                || include.contains(e.token_out.mint.as_str())
        });
    }
    if let Some(exclude) = &config.exclude_tokens {
        let exclude: HashSet<&str> = exclude.iter().map(String::as_str).collect();
        events.retain(|e| {
            !exclude.contains(e.token_in.mint.as_str())
                && !exclude.contains(e.token_out.mint.as_str())
        });
    }
}
