//! Shared types for the analysis pipeline
//!
//! Amount handling: token quantities stay in raw base units (`u64` plus the
//! mint's decimal exponent) until the point of USD conversion, so inventory
//! arithmetic in the FIFO ledger is integer exact. USD values are `f64`.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// A token quantity in raw base units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenAmount {
    /// Token mint address
    pub mint: String,

    /// Amount in raw base units
    pub raw_amount: u64,

    /// Decimal exponent of the mint
    pub decimals: u8,
}

impl TokenAmount {
    /// Convert to UI units (lossy, for USD conversion and display only)
    pub fn ui_amount(&self) -> f64 {
        self.raw_amount as f64 / 10f64.powi(self.decimals as i32)
    }
}

/// Instruction kind observed on the swap transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapInstruction {
    /// Fixed input amount swap
    SwapBaseIn,

    /// Fixed output amount swap
    SwapBaseOut,

    /// Generic swap instruction
    Swap,

    /// Aggregator-routed swap (possibly multi-hop)
    Route,

    /// Instruction kind could not be determined
    Unknown,
}

/// One detected on-chain swap, immutable once extracted
///
/// Keyed by signature: a signature never yields more than one event per
/// pool interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapEvent {
    /// Transaction signature (unique id)
    pub signature: String,

    /// Wallet that performed the swap
    pub wallet: String,

    /// Block timestamp
    pub block_time: DateTime<Utc>,

    /// Slot the transaction landed in
    pub slot: u64,

    /// Leg leaving the wallet
    pub token_in: TokenAmount,

    /// Leg entering the wallet
    pub token_out: TokenAmount,

    /// Transaction fee in lamports
    pub fee_lamports: u64,

    /// Source pool id, when identifiable
    pub pool_id: Option<String>,

    /// Instruction kind
    pub instruction: SwapInstruction,
}

/// A swap with USD valuations attached
///
/// `None` valuation fields mean the price oracle had no answer; they are
/// never substituted with a guess and propagate into a lowered confidence
/// score downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedSwap {
    /// The underlying swap event
    pub swap: SwapEvent,

    /// USD value of the leg leaving the wallet
    pub token_in_usd: Option<f64>,

    /// USD value of the leg entering the wallet
    pub token_out_usd: Option<f64>,

    /// Transaction fee in USD
    pub fee_usd: Option<f64>,

    /// Estimated slippage between the two legs, as a percentage
    pub slippage_pct: Option<f64>,
}

impl EnrichedSwap {
    /// Both legs carry a USD valuation
    pub fn has_complete_valuation(&self) -> bool {
        self.token_in_usd.is_some() && self.token_out_usd.is_some()
    }
}

/// A FIFO accounting unit: one inbound acquisition of a token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseLot {
    /// Remaining quantity in raw base units
    pub raw_amount: u64,

    /// Remaining USD cost basis of the lot
    pub cost_basis_usd: f64,

    /// Acquisition timestamp
    pub acquired_at: DateTime<Utc>,

    /// Signature of the acquiring transaction
    pub signature: String,

    /// False when the acquisition could not be valued in USD
    pub priced: bool,
}

/// Per-mint aggregate of purchase lots, oldest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPosition {
    /// Token mint address
    pub mint: String,

    /// Decimal exponent of the mint
    pub decimals: u8,

    /// Open lots in acquisition order (front = oldest)
    pub lots: VecDeque<PurchaseLot>,

    /// Total remaining quantity in raw base units
    pub total_raw_amount: u64,

    /// Total remaining USD cost basis
    pub total_cost_basis_usd: f64,

    /// First activity on this mint
    pub first_activity: DateTime<Utc>,

    /// Most recent activity on this mint
    pub last_activity: DateTime<Utc>,
}

impl TokenPosition {
    /// Create an empty position for a mint
    pub fn new(mint: impl Into<String>, decimals: u8, at: DateTime<Utc>) -> Self {
        Self {
            mint: mint.into(),
            decimals,
            lots: VecDeque::new(),
            total_raw_amount: 0,
            total_cost_basis_usd: 0.0,
            first_activity: at,
            last_activity: at,
        }
    }

    /// Weighted-average cost basis per UI unit of the token
    pub fn weighted_avg_cost_usd(&self) -> Option<f64> {
        if self.total_raw_amount == 0 {
            return None;
        }
        let ui_total = self.total_raw_amount as f64 / 10f64.powi(self.decimals as i32);
        Some(self.total_cost_basis_usd / ui_total)
    }

    /// Check the aggregate totals against the lot queue
    ///
    /// Quantity must match exactly; USD within epsilon.
    pub fn is_consistent(&self) -> bool {
        let lot_raw: u64 = self.lots.iter().map(|l| l.raw_amount).sum();
        let lot_usd: f64 = self.lots.iter().map(|l| l.cost_basis_usd).sum();
        lot_raw == self.total_raw_amount && (lot_usd - self.total_cost_basis_usd).abs() < 1e-6
    }
}

/// Result of closing (part of) a position against one FIFO lot
///
/// A single disposal that spans several lots emits one record per consumed
/// lot slice; the records share the exit signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedTrade {
    /// Token mint address
    pub mint: String,

    /// Decimal exponent of the mint
    pub decimals: u8,

    /// Quantity closed, in raw base units
    pub quantity_raw: u64,

    /// Acquisition timestamp of the consumed lot
    pub entry_time: DateTime<Utc>,

    /// Disposal timestamp
    pub exit_time: DateTime<Utc>,

    /// USD cost basis consumed from the lot
    pub entry_value_usd: f64,

    /// USD proceeds attributed to this slice
    pub exit_value_usd: f64,

    /// Realized profit or loss in USD
    pub realized_pnl_usd: f64,

    /// Realized return on the consumed basis, as a percentage
    pub roi_pct: f64,

    /// Holding period in seconds
    pub holding_period_secs: i64,

    /// Signature of the acquiring transaction
    pub entry_signature: String,

    /// Signature of the disposing transaction
    pub exit_signature: String,

    /// True when any valuation in the chain was best-effort
    pub flagged: bool,
}

/// Data-quality grade of an analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    /// Enough trades and complete valuations
    Good,

    /// Usable, but with gaps (missing prices, flagged trades)
    Degraded,

    /// Below the minimum trade threshold
    Poor,
}

/// PnL attributed to one calendar month
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyPnl {
    /// Month in `YYYY-MM` form
    pub month: String,

    /// Realized PnL for the month in USD
    pub pnl_usd: f64,
}

/// The final performance report for one analysis run
///
/// Computed fresh per run; never mutated in place. Statistics that are
/// mathematically undefined for the input are `None`, never NaN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletPerformanceMetrics {
    /// Start of the analysis period
    pub period_start: DateTime<Utc>,

    /// End of the analysis period
    pub period_end: DateTime<Utc>,

    /// Number of completed trades
    pub total_trades: usize,

    /// Trades with positive realized PnL
    pub winning_trades: usize,

    /// Trades with negative realized PnL
    pub losing_trades: usize,

    /// Net ROI over the period, as a percentage of deployed cost basis
    pub net_roi_pct: f64,

    /// Largest peak-to-trough decline of the equity curve, as a percentage
    pub max_drawdown_pct: f64,

    /// Sharpe ratio of per-trade returns; `None` below two observations
    pub sharpe_ratio: Option<f64>,

    /// Winning trades per losing trade; `None` when there are no losses
    pub win_loss_ratio: Option<f64>,

    /// Share of winning trades, as a percentage
    pub win_rate_pct: f64,

    /// Gross profit divided by gross loss; `None` when there are no losses
    pub profit_factor: Option<f64>,

    /// Annualized ROI over max drawdown; `None` when drawdown is zero
    pub calmar_ratio: Option<f64>,

    /// Standard deviation of per-trade returns, as a percentage
    pub volatility_pct: f64,

    /// 95% value-at-risk of per-trade PnL in USD (a negative number)
    pub value_at_risk_usd: f64,

    /// Total realized PnL in USD
    pub total_realized_pnl_usd: f64,

    /// Total traded volume in USD (sum of deployed cost bases)
    pub total_volume_usd: f64,

    /// Total transaction fees in USD
    pub total_fees_usd: f64,

    /// Average winning trade in USD
    pub avg_win_usd: f64,

    /// Average losing trade in USD (a negative number)
    pub avg_loss_usd: f64,

    /// Largest single win in USD
    pub largest_win_usd: f64,

    /// Largest single loss in USD (a negative number)
    pub largest_loss_usd: f64,

    /// Average holding period in hours
    pub avg_holding_period_hours: f64,

    /// Best calendar month by realized PnL
    pub best_month: Option<MonthlyPnl>,

    /// Worst calendar month by realized PnL
    pub worst_month: Option<MonthlyPnl>,

    /// Longest run of consecutive winning trades
    pub max_consecutive_wins: usize,

    /// Longest run of consecutive losing trades
    pub max_consecutive_losses: usize,

    /// Data-quality grade
    pub data_quality: DataQuality,

    /// Confidence in the report, 0.0 to 1.0
    pub confidence_score: f64,
}

impl WalletPerformanceMetrics {
    /// An empty report for a run that produced no trades
    pub fn empty(period_start: DateTime<Utc>, period_end: DateTime<Utc>) -> Self {
        Self {
            period_start,
            period_end,
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            net_roi_pct: 0.0,
            max_drawdown_pct: 0.0,
            sharpe_ratio: None,
            win_loss_ratio: None,
            win_rate_pct: 0.0,
            profit_factor: None,
            calmar_ratio: None,
            volatility_pct: 0.0,
            value_at_risk_usd: 0.0,
            total_realized_pnl_usd: 0.0,
            total_volume_usd: 0.0,
            total_fees_usd: 0.0,
            avg_win_usd: 0.0,
            avg_loss_usd: 0.0,
            largest_win_usd: 0.0,
            largest_loss_usd: 0.0,
            avg_holding_period_hours: 0.0,
            best_month: None,
            worst_month: None,
            max_consecutive_wins: 0,
            max_consecutive_losses: 0,
            data_quality: DataQuality::Poor,
            confidence_score: 0.0,
        }
    }
}

/// A price returned by the oracle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Price in USD
    pub price_usd: f64,

    /// Provider that answered
    pub source: String,

    /// Provider confidence, 0.0 to 1.0
    pub confidence: f64,
}

/// One entry from a signature listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureInfo {
    /// Transaction signature
    pub signature: String,

    /// Slot the transaction landed in
    pub slot: u64,

    /// Block timestamp, when the node reported one
    pub block_time: Option<DateTime<Utc>>,

    /// True when the transaction itself failed on chain
    pub failed: bool,
}

/// Bounds for a signature listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureQuery {
    /// Return signatures strictly older than this one
    pub before: Option<String>,

    /// Stop once this signature is reached
    pub until: Option<String>,

    /// Page size per RPC call (provider cap 1000)
    pub limit: usize,

    /// Hard ceiling on signatures collected across all pages
    pub max_signatures: usize,
}

impl Default for SignatureQuery {
    fn default() -> Self {
        Self {
            before: None,
            until: None,
            limit: 1000,
            max_signatures: 5000,
        }
    }
}

/// Outcome of a paginated signature listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignaturePage {
    /// Collected signatures, newest first
    pub signatures: Vec<SignatureInfo>,

    /// Errors accumulated while paginating
    pub errors: Vec<AnalysisError>,

    /// False when pagination stopped early after exhausting retries
    pub complete: bool,
}

/// One token balance entry from transaction metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBalanceRecord {
    /// Owner of the token account, when reported
    pub owner: Option<String>,

    /// Token mint address
    pub mint: String,

    /// Balance in raw base units
    pub raw_amount: u64,

    /// Decimal exponent of the mint
    pub decimals: u8,
}

/// One top-level instruction from a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionRecord {
    /// Program id the instruction invokes
    pub program_id: String,

    /// Indexes into the transaction's account keys
    pub account_indexes: Vec<u8>,
}

/// A transaction parsed into an owned record at the RPC boundary
///
/// Nothing downstream of the ledger client touches raw RPC shapes;
/// malformed payloads become `parsing_error` diagnostics instead of
/// surprises deep in the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Transaction signature
    pub signature: String,

    /// Slot the transaction landed in
    pub slot: u64,

    /// Block timestamp, when the node reported one
    pub block_time: Option<DateTime<Utc>>,

    /// True when the transaction failed on chain
    pub failed: bool,

    /// Transaction fee in lamports
    pub fee_lamports: u64,

    /// All account keys, including loaded lookup-table addresses
    pub account_keys: Vec<String>,

    /// Top-level instructions in execution order
    pub instructions: Vec<InstructionRecord>,

    /// Token balances before execution
    pub pre_token_balances: Vec<TokenBalanceRecord>,

    /// Token balances after execution
    pub post_token_balances: Vec<TokenBalanceRecord>,
}

impl TransactionRecord {
    /// Program ids invoked by top-level instructions
    pub fn program_ids(&self) -> impl Iterator<Item = &str> {
        self.instructions.iter().map(|ix| ix.program_id.as_str())
    }
}

/// Outcome of a batched transaction fetch
///
/// `transactions` is positionally matched to the requested signatures;
/// `None` marks an individual fetch that failed or was not found.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionBatch {
    /// Fetched records, one slot per requested signature
    pub transactions: Vec<Option<TransactionRecord>>,

    /// Errors accumulated while fetching
    pub errors: Vec<AnalysisError>,
}

/// Inbound request shape for a single-wallet analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletAnalysisConfig {
    /// Wallet address to analyze
    pub wallet_address: String,

    /// Only consider activity at or after this time
    pub start_date: Option<DateTime<Utc>>,

    /// Only consider activity at or before this time
    pub end_date: Option<DateTime<Utc>>,

    /// Ignore swaps below this USD value
    pub min_trade_value_usd: Option<f64>,

    /// Restrict accounting to these mints
    pub include_tokens: Option<Vec<String>>,

    /// Exclude these mints from accounting
    pub exclude_tokens: Option<Vec<String>>,

    /// Ceiling on transactions fetched for the wallet
    pub max_transactions: Option<usize>,
}

impl WalletAnalysisConfig {
    /// A config with only the wallet address set
    pub fn for_wallet(wallet_address: impl Into<String>) -> Self {
        Self {
            wallet_address: wallet_address.into(),
            start_date: None,
            end_date: None,
            min_trade_value_usd: None,
            include_tokens: None,
            exclude_tokens: None,
            max_transactions: None,
        }
    }
}

/// Batch request priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPriority {
    Low,
    Normal,
    High,
}

impl Default for BatchPriority {
    fn default() -> Self {
        Self::Normal
    }
}

/// Inbound request shape for a batch analysis (1-50 wallets)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchAnalysisRequest {
    /// Wallets to analyze, each processed independently
    pub wallet_addresses: Vec<String>,

    /// Scheduling priority
    #[serde(default)]
    pub priority: BatchPriority,

    /// Only consider activity at or after this time
    pub start_date: Option<DateTime<Utc>>,

    /// Only consider activity at or before this time
    pub end_date: Option<DateTime<Utc>>,

    /// Ignore swaps below this USD value
    pub min_trade_value_usd: Option<f64>,

    /// Ceiling on transactions fetched per wallet
    pub max_transactions: Option<usize>,
}

/// Per-wallet status classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// All stages succeeded and the minimum trade threshold was met
    Completed,

    /// A report was produced, but data is missing or below threshold
    Partial,

    /// No usable transaction data was obtained
    Failed,
}

/// Counters describing one analysis run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingStats {
    /// Transactions fetched from the ledger
    pub total_transactions_fetched: usize,

    /// Swap events recognized among them
    pub valid_swaps_found: usize,

    /// Price lookups that returned no answer
    pub price_data_missing_count: usize,

    /// Wall-clock processing time in milliseconds
    pub processing_time_ms: u64,

    /// Errors accumulated across every stage
    pub errors: Vec<AnalysisError>,
}

/// Outbound result shape for a single-wallet analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletAnalysisResult {
    /// The request this result answers
    pub config: WalletAnalysisConfig,

    /// The performance report (empty when no trades were found)
    pub metrics: WalletPerformanceMetrics,

    /// Run counters and accumulated errors
    pub processing_stats: ProcessingStats,

    /// Status classification
    pub status: AnalysisStatus,

    /// Completion timestamp
    pub completed_at: DateTime<Utc>,
}

/// Aggregate counters for a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Wallets requested
    pub requested: usize,

    /// Wallets that completed fully
    pub completed: usize,

    /// Wallets that produced a partial report
    pub partial: usize,

    /// Wallets with no usable data
    pub failed: usize,

    /// Average per-wallet processing time in milliseconds
    pub avg_processing_time_ms: u64,

    /// Total batch wall-clock time in milliseconds
    pub total_processing_time_ms: u64,
}

/// Outbound result shape for a batch analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchAnalysisResult {
    /// One result per requested wallet, in request order
    pub results: Vec<WalletAnalysisResult>,

    /// Aggregate counters
    pub summary: BatchSummary,

    /// Completion timestamp
    pub completed_at: DateTime<Utc>,
}
