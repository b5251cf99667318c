//! Core data model for the Wallet Performance Analysis Engine
//!
//! This crate holds everything the pipeline crates share:
//! - Typed records produced at the RPC boundary (signatures, transactions)
//! - Swap events and their USD-enriched form
//! - FIFO accounting entities (lots, positions, completed trades)
//! - The final performance report and its request/result envelopes
//! - The accumulated diagnostic record (`AnalysisError`)
//! - Trait seams (`TransactionSource`, `PriceSource`) so the orchestrator
//!   can be tested against in-memory fakes

mod error;
mod traits;
mod types;
mod validation;

pub use error::{AnalysisError, AnalysisErrorKind};
pub use traits::{PriceSource, TransactionSource};
pub use types::{
    AnalysisStatus, BatchAnalysisRequest, BatchAnalysisResult, BatchPriority, BatchSummary,
    CompletedTrade, DataQuality, EnrichedSwap, InstructionRecord, MonthlyPnl, PriceQuote,
    ProcessingStats, PurchaseLot, SignatureInfo, SignaturePage, SignatureQuery, SwapEvent,
    SwapInstruction, TokenAmount, TokenBalanceRecord, TokenPosition, TransactionBatch,
    TransactionRecord, WalletAnalysisConfig, WalletAnalysisResult, WalletPerformanceMetrics,
};
pub use validation::{validate_wallet_address, AddressError};
