//! The price-attach stage of the pipeline
//!
//! Values both legs of every swap at its block time through the injected
//! price source, plus the transaction fee through the SOL price. Missing
//! valuations are counted and recorded as `price_api_error` diagnostics;
//! they are never substituted with a guess.

use serde_json::json;

use wallet_perf_core::{AnalysisError, EnrichedSwap, PriceSource, SwapEvent};

const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;
const WRAPPED_SOL: &str = "So11111111111111111111111111111111111111112";

/// Outcome of attaching USD valuations to a set of swap events
#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    /// Enriched swaps, in input order
    pub swaps: Vec<EnrichedSwap>,

    /// Leg valuations the price source could not answer
    pub price_data_missing: usize,

    /// Missing-valuation diagnostics
    pub errors: Vec<AnalysisError>,
}

/// Attach USD valuations to swap events
pub async fn attach_valuations(prices: &dyn PriceSource, events: &[SwapEvent]) -> Enrichment {
    let mut enrichment = Enrichment::default();

    for event in events {
        let token_in_usd = prices
            .price_at(&event.token_in.mint, event.block_time)
            .await
            .map(|quote| quote.price_usd * event.token_in.ui_amount());
        let token_out_usd = prices
            .price_at(&event.token_out.mint, event.block_time)
            .await
            .map(|quote| quote.price_usd * event.token_out.ui_amount());

        for (mint, valued) in [
            (&event.token_in.mint, token_in_usd.is_some()),
            (&event.token_out.mint, token_out_usd.is_some()),
        ] {
            if !valued {
                enrichment.price_data_missing += 1;
                enrichment.errors.push(AnalysisError::price_api(
                    format!("no price available for mint {mint}"),
                    json!({
                        "mint": mint,
                        "signature": event.signature,
                        "block_time": event.block_time.to_rfc3339(),
                    }),
                ));
            }
        }

        let fee_usd = prices
            .price_at(WRAPPED_SOL, event.block_time)
            .await
            .map(|quote| quote.price_usd * (event.fee_lamports as f64 / LAMPORTS_PER_SOL));

        let slippage_pct = match (token_in_usd, token_out_usd) {
            (Some(input), Some(output)) if input > 0.0 => Some((input - output) / input * 100.0),
            _ => None,
        };

        enrichment.swaps.push(EnrichedSwap {
            swap: event.clone(),
            token_in_usd,
            token_out_usd,
            fee_usd,
            slippage_pct,
        });
    }

    enrichment
}
