//! Swap event extraction from transaction records
//!
//! Recognizes transactions that invoke a known AMM program and diffs the
//! wallet's own pre/post token balances to derive the swap's input
//! (decrease) and output (increase) legs. Extraction is deterministic:
//! the same transaction payload always yields the same event or the same
//! skip decision.

use std::collections::{HashMap, HashSet};

use serde_json::json;
use tracing::debug;

use wallet_perf_core::{
    AnalysisError, SwapEvent, SwapInstruction, TokenAmount, TransactionRecord,
};

pub mod programs;

/// Extractor configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExtractorConfig {
    /// AMM program ids to recognize
    pub program_allowlist: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            program_allowlist: programs::default_allowlist(),
        }
    }
}

/// Outcome of extracting a set of transactions
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Normalized swap events
    pub events: Vec<SwapEvent>,

    /// Per-transaction parsing diagnostics
    pub errors: Vec<AnalysisError>,
}

/// Parser of raw transaction records into normalized swap events
pub struct SwapExtractor {
    programs: HashSet<String>,
}

impl SwapExtractor {
    /// Create an extractor with the given allow-list
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            programs: config.program_allowlist.into_iter().collect(),
        }
    }

    /// Extract swap events for `wallet` from a set of transaction records
    ///
    /// Failed transactions and transactions that do not touch a recognized
    /// AMM program are discarded silently. Recognized transactions whose
    /// balance diffs are ambiguous or zero produce a `parsing_error`
    /// diagnostic instead of an event. A signature never yields more than
    /// one event.
    pub fn extract(&self, wallet: &str, transactions: &[TransactionRecord]) -> Extraction {
        let mut extraction = Extraction::default();
        let mut seen: HashSet<&str> = HashSet::new();

        for tx in transactions {
            if tx.failed {
                continue;
            }
            if !seen.insert(tx.signature.as_str()) {
                continue;
            }

            let Some(amm_instruction) = tx
                .instructions
                .iter()
                .find(|ix| self.programs.contains(&ix.program_id))
            else {
                continue;
            };

            match self.diff_balances(wallet, tx) {
                Ok((token_in, token_out)) => {
                    let Some(block_time) = tx.block_time else {
                        extraction.errors.push(AnalysisError::parsing(
                            "transaction missing block time",
                            json!({ "signature": tx.signature }),
                        ));
                        continue;
                    };

                    let instruction =
                        if programs::AGGREGATORS.contains(&amm_instruction.program_id.as_str()) {
                            SwapInstruction::Route
                        } else {
                            SwapInstruction::Swap
                        };

                    extraction.events.push(SwapEvent {
                        signature: tx.signature.clone(),
                        wallet: wallet.to_string(),
                        block_time,
                        slot: tx.slot,
                        token_in,
                        token_out,
                        fee_lamports: tx.fee_lamports,
                        pool_id: pool_id_for(tx, amm_instruction, wallet),
                        instruction,
                    });
                }
                Err(message) => {
                    extraction.errors.push(AnalysisError::parsing(
                        message,
                        json!({ "signature": tx.signature, "wallet": wallet }),
                    ));
                }
            }
        }

        debug!(
            wallet,
            transactions = transactions.len(),
            events = extraction.events.len(),
            skipped = extraction.errors.len(),
            "swap extraction finished"
        );

        extraction
    }

    /// Diff the wallet's own token balances into (input leg, output leg)
    fn diff_balances(
        &self,
        wallet: &str,
        tx: &TransactionRecord,
    ) -> Result<(TokenAmount, TokenAmount), String> {
        // mint -> (signed delta in raw units, decimals)
        let mut deltas: HashMap<&str, (i128, u8)> = HashMap::new();

        for balance in &tx.pre_token_balances {
            if balance.owner.as_deref() != Some(wallet) {
                continue;
            }
            let entry = deltas
                .entry(balance.mint.as_str())
                .or_insert((0, balance.decimals));
            entry.0 -= balance.raw_amount as i128;
        }
        for balance in &tx.post_token_balances {
            if balance.owner.as_deref() != Some(wallet) {
                continue;
            }
            let entry = deltas
                .entry(balance.mint.as_str())
                .or_insert((0, balance.decimals));
            entry.0 += balance.raw_amount as i128;
        }

        let mut decreases: Vec<TokenAmount> = Vec::new();
        let mut increases: Vec<TokenAmount> = Vec::new();

        for (mint, (delta, decimals)) in deltas {
            if delta < 0 {
                decreases.push(TokenAmount {
                    mint: mint.to_string(),
                    raw_amount: (-delta) as u64,
                    decimals,
                });
            } else if delta > 0 {
                increases.push(TokenAmount {
                    mint: mint.to_string(),
                    raw_amount: delta as u64,
                    decimals,
                });
            }
        }

        match (decreases.len(), increases.len()) {
            (1, 1) => Ok((decreases.remove(0), increases.remove(0))),
            (0, 0) => Err("zero balance delta for wallet".to_string()),
            (d, i) => Err(format!(
                "ambiguous balance delta for wallet: {d} decreases, {i} increases"
            )),
        }
    }
}

impl Default for SwapExtractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

/// Best-effort pool identification
///
/// Heuristic: the first account of the AMM instruction that is neither a
/// token program nor the wallet itself. Aggregator routes hop through
/// several pools, so no single pool is attributed to them.
fn pool_id_for(
    tx: &TransactionRecord,
    instruction: &wallet_perf_core::InstructionRecord,
    wallet: &str,
) -> Option<String> {
    if programs::AGGREGATORS.contains(&instruction.program_id.as_str()) {
        return None;
    }

    instruction
        .account_indexes
        .iter()
        .filter_map(|idx| tx.account_keys.get(*idx as usize))
        .find(|key| {
            key.as_str() != programs::TOKEN_PROGRAM
                && key.as_str() != programs::TOKEN_2022_PROGRAM
                && key.as_str() != wallet
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use wallet_perf_core::{AnalysisErrorKind, InstructionRecord, TokenBalanceRecord};

    const WALLET: &str = "WaLLeT1111111111111111111111111111111111111";
    const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
    const MEME: &str = "MemeMint1111111111111111111111111111111111";

    fn balance(owner: &str, mint: &str, raw: u64, decimals: u8) -> TokenBalanceRecord {
        TokenBalanceRecord {
            owner: Some(owner.to_string()),
            mint: mint.to_string(),
            raw_amount: raw,
            decimals,
        }
    }

    fn swap_tx(signature: &str, program_id: &str) -> TransactionRecord {
        TransactionRecord {
            signature: signature.to_string(),
            slot: 1000,
            block_time: Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
            failed: false,
            fee_lamports: 5_000,
            account_keys: vec![
                WALLET.to_string(),
                programs::TOKEN_PROGRAM.to_string(),
                "Poo111111111111111111111111111111111111111".to_string(),
                program_id.to_string(),
            ],
            instructions: vec![InstructionRecord {
                program_id: program_id.to_string(),
                account_indexes: vec![1, 2, 0],
            }],
            // Spends 100 USDC, receives 1000 MEME
            pre_token_balances: vec![
                balance(WALLET, USDC, 150_000_000, 6),
                balance(WALLET, MEME, 0, 9),
            ],
            post_token_balances: vec![
                balance(WALLET, USDC, 50_000_000, 6),
                balance(WALLET, MEME, 1_000_000_000_000, 9),
            ],
        }
    }

    #[test]
    fn extracts_a_buy_swap() {
        let extractor = SwapExtractor::default();
        let tx = swap_tx("sig-1", programs::RAYDIUM_LIQUIDITY_V4);

        let extraction = extractor.extract(WALLET, &[tx]);

        assert_eq!(extraction.events.len(), 1);
        assert!(extraction.errors.is_empty());

        let event = &extraction.events[0];
        assert_eq!(event.token_in.mint, USDC);
        assert_eq!(event.token_in.raw_amount, 100_000_000);
        assert_eq!(event.token_out.mint, MEME);
        assert_eq!(event.token_out.raw_amount, 1_000_000_000_000);
        assert_eq!(event.instruction, SwapInstruction::Swap);
        assert_eq!(
            event.pool_id.as_deref(),
            Some("Poo111111111111111111111111111111111111111")
        );
    }

    #[test]
    fn aggregator_swaps_are_routed_without_a_pool() {
        let extractor = SwapExtractor::default();
        let tx = swap_tx("sig-1", programs::JUPITER_V6);

        let extraction = extractor.extract(WALLET, &[tx]);

        assert_eq!(extraction.events.len(), 1);
        assert_eq!(extraction.events[0].instruction, SwapInstruction::Route);
        assert!(extraction.events[0].pool_id.is_none());
    }

    #[test]
    fn failed_transactions_are_discarded_silently() {
        let extractor = SwapExtractor::default();
        let mut tx = swap_tx("sig-1", programs::RAYDIUM_LIQUIDITY_V4);
        tx.failed = true;

        let extraction = extractor.extract(WALLET, &[tx]);
        assert!(extraction.events.is_empty());
        assert!(extraction.errors.is_empty());
    }

    #[test]
    fn unrecognized_programs_are_skipped_silently() {
        let extractor = SwapExtractor::default();
        let tx = swap_tx("sig-1", "SomeOtherProgram11111111111111111111111111");

        let extraction = extractor.extract(WALLET, &[tx]);
        assert!(extraction.events.is_empty());
        assert!(extraction.errors.is_empty());
    }

    #[test]
    fn zero_delta_is_a_parsing_error() {
        let extractor = SwapExtractor::default();
        let mut tx = swap_tx("sig-1", programs::RAYDIUM_LIQUIDITY_V4);
        tx.post_token_balances = tx.pre_token_balances.clone();

        let extraction = extractor.extract(WALLET, &[tx]);
        assert!(extraction.events.is_empty());
        assert_eq!(extraction.errors.len(), 1);
        assert_eq!(extraction.errors[0].kind, AnalysisErrorKind::ParsingError);
    }

    #[test]
    fn ambiguous_delta_is_a_parsing_error() {
        let extractor = SwapExtractor::default();
        let mut tx = swap_tx("sig-1", programs::RAYDIUM_LIQUIDITY_V4);
        // Two different mints increase at once
        tx.post_token_balances.push(balance(
            WALLET,
            "ThirdMint111111111111111111111111111111111",
            42,
            0,
        ));

        let extraction = extractor.extract(WALLET, &[tx]);
        assert!(extraction.events.is_empty());
        assert_eq!(extraction.errors.len(), 1);
    }

    #[test]
    fn other_wallets_balances_are_ignored() {
        let extractor = SwapExtractor::default();
        let mut tx = swap_tx("sig-1", programs::RAYDIUM_LIQUIDITY_V4);
        // The pool's own vault balances should not affect the diff
        tx.pre_token_balances.push(balance("PoolVault", USDC, 1, 6));
        tx.post_token_balances
            .push(balance("PoolVault", USDC, 999_999_999, 6));

        let extraction = extractor.extract(WALLET, &[tx]);
        assert_eq!(extraction.events.len(), 1);
    }

    #[test]
    fn duplicate_signatures_yield_one_event() {
        let extractor = SwapExtractor::default();
        let tx = swap_tx("sig-1", programs::RAYDIUM_LIQUIDITY_V4);

        let extraction = extractor.extract(WALLET, &[tx.clone(), tx]);
        assert_eq!(extraction.events.len(), 1);
    }

    #[test]
    fn extraction_is_deterministic() {
        let extractor = SwapExtractor::default();
        let tx = swap_tx("sig-1", programs::RAYDIUM_LIQUIDITY_V4);

        let first = extractor.extract(WALLET, std::slice::from_ref(&tx));
        let second = extractor.extract(WALLET, std::slice::from_ref(&tx));

        assert_eq!(first.events.len(), second.events.len());
        assert_eq!(first.events[0].token_in, second.events[0].token_in);
        assert_eq!(first.events[0].token_out, second.events[0].token_out);
    }
}
