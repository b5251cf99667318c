//! Performance statistics over completed trades
//!
//! Aggregates a run's completed trades and equity curve into the final
//! report: ROI, drawdown, Sharpe, win/loss statistics, profit factor,
//! Calmar, volatility, value-at-risk, monthly buckets, streaks, and a
//! data-quality grade. Pure, non-suspending computation; statistics that
//! are undefined for the input are reported as `None`, never NaN.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::debug;

use wallet_perf_core::{
    CompletedTrade, DataQuality, MonthlyPnl, TokenPosition, WalletPerformanceMetrics,
};

const HOURS_PER_YEAR: f64 = 24.0 * 365.25;

/// Metrics calculator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Per-trade risk-free hurdle subtracted in the Sharpe numerator,
    /// as a return fraction
    pub risk_free_rate: f64,

    /// Minimum trade count for a run to qualify as full-quality
    pub min_trades: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.0,
            min_trades: 10,
        }
    }
}

/// The analysis window a report covers
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnalysisWindow {
    /// Start of the window
    pub start: DateTime<Utc>,

    /// End of the window
    pub end: DateTime<Utc>,
}

/// Calculator of wallet performance reports
pub struct MetricsCalculator {
    config: MetricsConfig,
}

impl MetricsCalculator {
    /// Create a calculator with the given configuration
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Summarize a run into a fresh performance report
    ///
    /// `fees_usd` is the run's total transaction fees (tracked alongside
    /// per-trade PnL, not folded into cost basis) and
    /// `price_data_missing` the number of leg valuations the oracle could
    /// not answer; both only affect the reported totals and the
    /// data-quality grading.
    pub fn summarize(
        &self,
        trades: &[CompletedTrade],
        open_positions: &[TokenPosition],
        window: &AnalysisWindow,
        fees_usd: f64,
        price_data_missing: usize,
    ) -> WalletPerformanceMetrics {
        if trades.is_empty() {
            let mut metrics = WalletPerformanceMetrics::empty(window.start, window.end);
            metrics.total_fees_usd = fees_usd;
            return metrics;
        }

        // Equity and streak statistics depend on exit order
        let mut ordered: Vec<&CompletedTrade> = trades.iter().collect();
        ordered.sort_by_key(|t| t.exit_time);

        let total_trades = ordered.len();
        let total_pnl: f64 = ordered.iter().map(|t| t.realized_pnl_usd).sum();
        let total_volume: f64 = ordered.iter().map(|t| t.entry_value_usd).sum();

        let net_roi_pct = if total_volume > 0.0 {
            total_pnl / total_volume * 100.0
        } else {
            0.0
        };

        let max_drawdown_pct = max_drawdown(&ordered);

        // Per-trade returns on consumed basis; zero-basis slices carry no
        // return information
        let returns: Vec<f64> = ordered
            .iter()
            .filter(|t| t.entry_value_usd > 0.0)
            .map(|t| t.realized_pnl_usd / t.entry_value_usd)
            .collect();

        let (sharpe_ratio, volatility_pct) = if returns.len() >= 2 {
            let mean = (&returns).mean();
            let std_dev = (&returns).std_dev();
            let sharpe = if std_dev > 0.0 {
                Some((mean - self.config.risk_free_rate) / std_dev)
            } else {
                None
            };
            (sharpe, std_dev * 100.0)
        } else {
            (None, 0.0)
        };

        let wins: Vec<f64> = ordered
            .iter()
            .filter(|t| t.realized_pnl_usd > 0.0)
            .map(|t| t.realized_pnl_usd)
            .collect();
        let losses: Vec<f64> = ordered
            .iter()
            .filter(|t| t.realized_pnl_usd < 0.0)
            .map(|t| t.realized_pnl_usd)
            .collect();

        let gross_profit: f64 = wins.iter().sum();
        let gross_loss: f64 = losses.iter().sum::<f64>().abs();

        let win_rate_pct = wins.len() as f64 / total_trades as f64 * 100.0;
        let win_loss_ratio = if losses.is_empty() {
            None
        } else {
            Some(wins.len() as f64 / losses.len() as f64)
        };
        let profit_factor = if gross_loss > 0.0 {
            Some(gross_profit / gross_loss)
        } else {
            None
        };

        let avg_holding_period_hours = ordered
            .iter()
            .map(|t| t.holding_period_secs as f64 / 3600.0)
            .sum::<f64>()
            / total_trades as f64;

        // Annualize against the window, then express per unit of drawdown
        let window_hours =
            (window.end - window.start).num_seconds().max(3600) as f64 / 3600.0;
        let annualized_roi_pct = net_roi_pct * (HOURS_PER_YEAR / window_hours);
        let calmar_ratio = if max_drawdown_pct > 0.0 {
            Some(annualized_roi_pct / max_drawdown_pct)
        } else {
            None
        };

        let value_at_risk_usd = value_at_risk(&ordered, 0.95);
        let (best_month, worst_month) = monthly_extremes(&ordered);
        let (max_consecutive_wins, max_consecutive_losses) = streaks(&ordered);

        let flagged = ordered.iter().filter(|t| t.flagged).count();
        let (data_quality, confidence_score) =
            self.grade(total_trades, flagged, price_data_missing);

        debug!(
            total_trades,
            open_positions = open_positions.len(),
            net_roi_pct,
            max_drawdown_pct,
            ?data_quality,
            "performance report computed"
        );

        WalletPerformanceMetrics {
            period_start: window.start,
            period_end: window.end,
            total_trades,
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            net_roi_pct,
            max_drawdown_pct,
            sharpe_ratio,
            win_loss_ratio,
            win_rate_pct,
            profit_factor,
            calmar_ratio,
            volatility_pct,
            value_at_risk_usd,
            total_realized_pnl_usd: total_pnl,
            total_volume_usd: total_volume,
            total_fees_usd: fees_usd,
            avg_win_usd: if wins.is_empty() {
                0.0
            } else {
                gross_profit / wins.len() as f64
            },
            avg_loss_usd: if losses.is_empty() {
                0.0
            } else {
                losses.iter().sum::<f64>() / losses.len() as f64
            },
            largest_win_usd: wins.iter().copied().fold(0.0, f64::max),
            largest_loss_usd: losses.iter().copied().fold(0.0, f64::min),
            avg_holding_period_hours,
            best_month,
            worst_month,
            max_consecutive_wins,
            max_consecutive_losses,
            data_quality,
            confidence_score,
        }
    }

    /// Grade data quality and derive a confidence score
    fn grade(
        &self,
        total_trades: usize,
        flagged: usize,
        price_data_missing: usize,
    ) -> (DataQuality, f64) {
        let flagged_share = flagged as f64 / total_trades.max(1) as f64;

        let quality = if total_trades < self.config.min_trades {
            DataQuality::Poor
        } else if flagged > 0 || price_data_missing > 0 {
            DataQuality::Degraded
        } else {
            DataQuality::Good
        };

        let trade_factor =
            (total_trades as f64 / self.config.min_trades.max(1) as f64).min(1.0);
        let price_penalty = (price_data_missing as f64 * 0.05).min(0.5);
        let confidence =
            (trade_factor * (1.0 - flagged_share * 0.5) * (1.0 - price_penalty)).clamp(0.0, 1.0);

        (quality, confidence)
    }
}

impl Default for MetricsCalculator {
    fn default() -> Self {
        Self::new(MetricsConfig::default())
    }
}

/// Largest peak-to-trough decline of the cumulative realized-PnL curve,
/// as a percentage of the peak
fn max_drawdown(ordered: &[&CompletedTrade]) -> f64 {
    let mut equity = 0.0f64;
    let mut peak = 0.0f64;
    let mut max_dd_pct = 0.0f64;

    for trade in ordered {
        equity += trade.realized_pnl_usd;
        if equity > peak {
            peak = equity;
        }
        if peak > 0.0 {
            let dd_pct = (peak - equity) / peak * 100.0;
            if dd_pct > max_dd_pct {
                max_dd_pct = dd_pct;
            }
        }
    }

    max_dd_pct
}

/// Lower-tail percentile of per-trade PnL (zero when the tail is positive)
fn value_at_risk(ordered: &[&CompletedTrade], confidence: f64) -> f64 {
    let mut pnls: Vec<f64> = ordered.iter().map(|t| t.realized_pnl_usd).collect();
    pnls.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = ((1.0 - confidence) * pnls.len() as f64).ceil() as usize;
    let index = rank.saturating_sub(1).min(pnls.len() - 1);
    pnls.get(index).copied().unwrap_or(0.0).min(0.0)
}

/// Best and worst calendar month by realized PnL
fn monthly_extremes(ordered: &[&CompletedTrade]) -> (Option<MonthlyPnl>, Option<MonthlyPnl>) {
    use std::collections::BTreeMap;

    let mut buckets: BTreeMap<String, f64> = BTreeMap::new();
    for trade in ordered {
        let month = trade.exit_time.format("%Y-%m").to_string();
        *buckets.entry(month).or_insert(0.0) += trade.realized_pnl_usd;
    }

    let best = buckets
        .iter()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(month, pnl)| MonthlyPnl {
            month: month.clone(),
            pnl_usd: *pnl,
        });
    let worst = buckets
        .iter()
        .min_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(month, pnl)| MonthlyPnl {
            month: month.clone(),
            pnl_usd: *pnl,
        });

    (best, worst)
}

/// Longest winning and losing runs in exit order; break-even trades reset
/// both counters
fn streaks(ordered: &[&CompletedTrade]) -> (usize, usize) {
    let mut wins = 0usize;
    let mut losses = 0usize;
    let mut max_wins = 0usize;
    let mut max_losses = 0usize;

    for trade in ordered {
        if trade.realized_pnl_usd > 0.0 {
            wins += 1;
            losses = 0;
        } else if trade.realized_pnl_usd < 0.0 {
            losses += 1;
            wins = 0;
        } else {
            wins = 0;
            losses = 0;
        }
        max_wins = max_wins.max(wins);
        max_losses = max_losses.max(losses);
    }

    (max_wins, max_losses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn window() -> AnalysisWindow {
        AnalysisWindow {
            start: at(0),
            end: at(90 * 86_400),
        }
    }

    fn trade(index: i64, pnl: f64, entry_value: f64) -> CompletedTrade {
        CompletedTrade {
            mint: "TokenX".to_string(),
            decimals: 6,
            quantity_raw: 1_000_000,
            entry_time: at(index * 3_600),
            exit_time: at(index * 3_600 + 1_800),
            entry_value_usd: entry_value,
            exit_value_usd: entry_value + pnl,
            realized_pnl_usd: pnl,
            roi_pct: if entry_value > 0.0 {
                pnl / entry_value * 100.0
            } else {
                0.0
            },
            holding_period_secs: 1_800,
            entry_signature: format!("entry-{index}"),
            exit_signature: format!("exit-{index}"),
            flagged: false,
        }
    }

    #[test]
    fn win_rate_and_profit_factor_scenario() {
        // 7 wins at +$10, 3 losses at -$5
        let mut trades: Vec<CompletedTrade> = (0..7).map(|i| trade(i, 10.0, 100.0)).collect();
        trades.extend((7..10).map(|i| trade(i, -5.0, 100.0)));

        let metrics =
            MetricsCalculator::default().summarize(&trades, &[], &window(), 0.0, 0);

        assert_eq!(metrics.total_trades, 10);
        assert_eq!(metrics.winning_trades, 7);
        assert_eq!(metrics.losing_trades, 3);
        assert!((metrics.win_rate_pct - 70.0).abs() < 1e-9);
        assert!((metrics.profit_factor.unwrap() - 70.0 / 15.0).abs() < 1e-9);
        assert!((metrics.win_loss_ratio.unwrap() - 7.0 / 3.0).abs() < 1e-9);
        assert!((metrics.total_realized_pnl_usd - 55.0).abs() < 1e-9);
        assert_eq!(metrics.data_quality, DataQuality::Good);
    }

    #[test]
    fn empty_input_yields_an_empty_report() {
        let metrics =
            MetricsCalculator::default().summarize(&[], &[], &window(), 1.25, 0);

        assert_eq!(metrics.total_trades, 0);
        assert_eq!(metrics.net_roi_pct, 0.0);
        assert!(metrics.sharpe_ratio.is_none());
        assert_eq!(metrics.data_quality, DataQuality::Poor);
        assert_eq!(metrics.total_fees_usd, 1.25);
    }

    #[test]
    fn drawdown_is_peak_to_trough_of_the_equity_curve() {
        // Equity: 10, 5, -5, 15 -> peak 10, trough -5, drawdown 150% of peak
        let trades = vec![
            trade(0, 10.0, 100.0),
            trade(1, -5.0, 100.0),
            trade(2, -10.0, 100.0),
            trade(3, 20.0, 100.0),
        ];

        let metrics =
            MetricsCalculator::default().summarize(&trades, &[], &window(), 0.0, 0);

        assert!((metrics.max_drawdown_pct - 150.0).abs() < 1e-9);
    }

    #[test]
    fn sharpe_is_undefined_below_two_observations() {
        let trades = vec![trade(0, 10.0, 100.0)];
        let metrics =
            MetricsCalculator::default().summarize(&trades, &[], &window(), 0.0, 0);

        assert!(metrics.sharpe_ratio.is_none());
        assert_eq!(metrics.volatility_pct, 0.0);
    }

    #[test]
    fn calmar_is_undefined_when_drawdown_is_zero() {
        // Monotonically rising equity: no drawdown
        let trades = vec![trade(0, 5.0, 100.0), trade(1, 5.0, 100.0)];
        let metrics =
            MetricsCalculator::default().summarize(&trades, &[], &window(), 0.0, 0);

        assert_eq!(metrics.max_drawdown_pct, 0.0);
        assert!(metrics.calmar_ratio.is_none());
    }

    #[test]
    fn below_threshold_runs_are_poor_with_reduced_confidence() {
        let trades = vec![trade(0, 10.0, 100.0), trade(1, 10.0, 100.0)];
        let metrics =
            MetricsCalculator::default().summarize(&trades, &[], &window(), 0.0, 0);

        assert_eq!(metrics.data_quality, DataQuality::Poor);
        assert!((metrics.confidence_score - 0.2).abs() < 1e-9);
    }

    #[test]
    fn missing_prices_degrade_quality_and_confidence() {
        let trades: Vec<CompletedTrade> = (0..12).map(|i| trade(i, 10.0, 100.0)).collect();
        let metrics =
            MetricsCalculator::default().summarize(&trades, &[], &window(), 0.0, 4);

        assert_eq!(metrics.data_quality, DataQuality::Degraded);
        assert!(metrics.confidence_score < 1.0);
    }

    #[test]
    fn streak_counting() {
        let pnls = [10.0, 10.0, 10.0, -5.0, -5.0, 10.0, -5.0];
        let trades: Vec<CompletedTrade> = pnls
            .iter()
            .enumerate()
            .map(|(i, pnl)| trade(i as i64, *pnl, 100.0))
            .collect();

        let metrics =
            MetricsCalculator::default().summarize(&trades, &[], &window(), 0.0, 0);

        assert_eq!(metrics.max_consecutive_wins, 3);
        assert_eq!(metrics.max_consecutive_losses, 2);
    }

    #[test]
    fn monthly_extremes_bucket_by_exit_month() {
        let mut january = trade(0, 100.0, 100.0);
        january.exit_time = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let mut february = trade(1, -40.0, 100.0);
        february.exit_time = Utc.with_ymd_and_hms(2024, 2, 15, 0, 0, 0).unwrap();

        let metrics = MetricsCalculator::default().summarize(
            &[january, february],
            &[],
            &window(),
            0.0,
            0,
        );

        assert_eq!(metrics.best_month.unwrap().month, "2024-01");
        assert_eq!(metrics.worst_month.unwrap().month, "2024-02");
    }

    #[test]
    fn value_at_risk_is_the_lower_tail() {
        let mut trades: Vec<CompletedTrade> =
            (0..19).map(|i| trade(i, 10.0, 100.0)).collect();
        trades.push(trade(19, -50.0, 100.0));

        let metrics =
            MetricsCalculator::default().summarize(&trades, &[], &window(), 0.0, 0);

        assert!((metrics.value_at_risk_usd - (-50.0)).abs() < 1e-9);
    }

    #[test]
    fn roi_is_pnl_over_deployed_basis() {
        // $55 profit on $1000 deployed
        let mut trades: Vec<CompletedTrade> = (0..7).map(|i| trade(i, 10.0, 100.0)).collect();
        trades.extend((7..10).map(|i| trade(i, -5.0, 100.0)));

        let metrics =
            MetricsCalculator::default().summarize(&trades, &[], &window(), 0.0, 0);

        assert!((metrics.net_roi_pct - 5.5).abs() < 1e-9);
    }
}
