//! Program identifiers for Solana AMMs
//!
//! The extractor only recognizes transactions that invoke one of these
//! programs; everything else is ignored without a diagnostic.

// DEX and AMM programs
pub const RAYDIUM_LIQUIDITY_V4: &str = "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8";
pub const RAYDIUM_CONCENTRATED_LIQUIDITY: &str = "CAMMCzo5YL8w4VFF8KVHrK22GGUsp5VTaW7grrKgrWqK";

pub const ORCA_WHIRLPOOL: &str = "whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc";
pub const ORCA_SWAP_V2: &str = "9W959DqEETiGZocYWCQPaJ6sBmUzgfxXfqGeTEdp3aQP";

pub const JUPITER_V6: &str = "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4";
pub const JUPITER_AGGREGATOR_V4: &str = "JUP4Fb2cqiRUcaTHdrPC8h2gNsA2ETXiPDD33WcGuJB";

pub const METEORA_DLMM: &str = "LBUZKhRxPF3XUpBCjp4YzTKgLccjZhTSDM9YuVaPwxo";
pub const PHOENIX_DEX: &str = "PhoeNiXZ8ByJGLkxNfZRnkUfjvmuYqLR89jjFHGqdXY";

// Token programs (never pool accounts; used to filter heuristics)
pub const TOKEN_PROGRAM: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
pub const TOKEN_2022_PROGRAM: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";

/// Aggregator programs route through other pools; their swaps are tagged
/// as routed rather than direct
pub const AGGREGATORS: &[&str] = &[JUPITER_V6, JUPITER_AGGREGATOR_V4];

/// Default allow-list of recognized AMM programs
pub fn default_allowlist() -> Vec<String> {
    [
        RAYDIUM_LIQUIDITY_V4,
        RAYDIUM_CONCENTRATED_LIQUIDITY,
        ORCA_WHIRLPOOL,
        ORCA_SWAP_V2,
        JUPITER_V6,
        JUPITER_AGGREGATOR_V4,
        METEORA_DLMM,
        PHOENIX_DEX,
    ]
    .iter()
    .map(|id| id.to_string())
    .collect()
}
