//! Accumulated diagnostics for analysis runs
//!
//! `AnalysisError` is deliberately a plain serializable record rather than a
//! Rust error enum: instances are collected during a run and handed to the
//! persistence collaborator alongside the report, they do not unwind the
//! pipeline. Only a stage that fails completely for a wallet changes that
//! wallet's status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Error taxonomy for accumulated diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisErrorKind {
    /// Transient network or provider failure
    RpcError,

    /// Valuation unavailable from every price provider
    PriceApiError,

    /// Malformed or unrecognized transaction shape
    ParsingError,

    /// FIFO or metric derivation anomaly
    CalculationError,
}

/// A typed diagnostic record accumulated during a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisError {
    /// Error category
    pub kind: AnalysisErrorKind,

    /// Human-readable description
    pub message: String,

    /// When the error was recorded
    pub timestamp: DateTime<Utc>,

    /// Structured context (signatures, mints, quantities)
    pub context: Value,
}

impl AnalysisError {
    /// Create an error record with explicit context
    pub fn new(kind: AnalysisErrorKind, message: impl Into<String>, context: Value) -> Self {
        Self {
            kind,
            message: message.into(),
            timestamp: Utc::now(),
            context,
        }
    }

    /// A transient RPC failure
    pub fn rpc(message: impl Into<String>, context: Value) -> Self {
        Self::new(AnalysisErrorKind::RpcError, message, context)
    }

    /// A missing-valuation diagnostic
    pub fn price_api(message: impl Into<String>, context: Value) -> Self {
        Self::new(AnalysisErrorKind::PriceApiError, message, context)
    }

    /// A skipped-transaction diagnostic
    pub fn parsing(message: impl Into<String>, context: Value) -> Self {
        Self::new(AnalysisErrorKind::ParsingError, message, context)
    }

    /// A FIFO/metric anomaly diagnostic
    pub fn calculation(message: impl Into<String>, context: Value) -> Self {
        Self::new(AnalysisErrorKind::CalculationError, message, context)
    }

    /// Shorthand for a single-signature context
    pub fn for_signature(kind: AnalysisErrorKind, message: impl Into<String>, signature: &str) -> Self {
        Self::new(kind, message, json!({ "signature": signature }))
    }
}
