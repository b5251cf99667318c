//! Command line interface for the Wallet Performance Analysis Engine
//!
//! - Analyze a single wallet or a batch of wallets
//! - Probe collaborator health and dump client metrics
//! - Generate a default configuration file

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wallet_perf_core::{
    AnalysisStatus, BatchAnalysisRequest, WalletAnalysisConfig, WalletAnalysisResult,
};
use wallet_perf_engine::AnalysisEngine;
use wallet_perf_pricing::PriceResolver;
use wallet_perf_rpc::LedgerClient;

mod config;

use config::{load_or_default, save_config, AppConfig};

/// Wallet performance analysis CLI
#[derive(Parser, Debug)]
#[clap(name = "wallet-perf", version, about, long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[clap(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,

    /// Sets log level
    #[clap(short, long, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

/// CLI commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze one wallet's trading performance
    Analyze {
        /// Wallet address (base58)
        wallet: String,

        /// Start of the analysis window (YYYY-MM-DD or RFC 3339)
        #[clap(long)]
        start: Option<String>,

        /// End of the analysis window (YYYY-MM-DD or RFC 3339)
        #[clap(long)]
        end: Option<String>,

        /// Ceiling on transactions fetched
        #[clap(long)]
        max_transactions: Option<usize>,

        /// Ignore swaps below this USD value
        #[clap(long)]
        min_trade_value: Option<f64>,

        /// Output format
        #[clap(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Analyze a batch of wallets listed in a file, one address per line
    Batch {
        /// File with wallet addresses
        #[clap(value_name = "FILE")]
        wallets: PathBuf,

        /// Start of the analysis window (YYYY-MM-DD or RFC 3339)
        #[clap(long)]
        start: Option<String>,

        /// End of the analysis window (YYYY-MM-DD or RFC 3339)
        #[clap(long)]
        end: Option<String>,

        /// Output format
        #[clap(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Probe collaborator health and show engine counters
    Health,

    /// Write a default configuration file
    GenerateConfig {
        /// Output file
        #[clap(short, long, value_name = "FILE")]
        output: PathBuf,
    },
}

/// Output format
#[derive(ValueEnum, Debug, Clone, Copy)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app_config = load_or_default(&cli.config)?;

    match cli.command {
        Commands::Analyze {
            wallet,
            start,
            end,
            max_transactions,
            min_trade_value,
            format,
        } => {
            let (engine, _ledger) = build_engine(&app_config);

            let request = WalletAnalysisConfig {
                wallet_address: wallet,
                start_date: parse_date(start.as_deref())?,
                end_date: parse_date(end.as_deref())?,
                min_trade_value_usd: min_trade_value,
                include_tokens: None,
                exclude_tokens: None,
                max_transactions,
            };

            let result = engine.analyze_wallet(request).await;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
                OutputFormat::Text => print_result(&result),
            }
        }

        Commands::Batch {
            wallets,
            start,
            end,
            format,
        } => {
            let addresses = read_wallet_list(&wallets)?;
            info!(wallets = addresses.len(), "running batch analysis");

            let (engine, _ledger) = build_engine(&app_config);

            let request = BatchAnalysisRequest {
                wallet_addresses: addresses,
                priority: Default::default(),
                start_date: parse_date(start.as_deref())?,
                end_date: parse_date(end.as_deref())?,
                min_trade_value_usd: None,
                max_transactions: None,
            };

            let batch = engine.analyze_batch(request).await;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&batch)?),
                OutputFormat::Text => {
                    for result in &batch.results {
                        print_result(result);
                        println!();
                    }
                    println!(
                        "{} {} completed, {} partial, {} failed of {} in {}ms",
                        style("batch:").bold(),
                        batch.summary.completed,
                        batch.summary.partial,
                        batch.summary.failed,
                        batch.summary.requested,
                        batch.summary.total_processing_time_ms,
                    );
                }
            }
        }

        Commands::Health => {
            let (engine, ledger) = build_engine(&app_config);

            let health = engine.health().await;
            println!("{}", serde_json::to_string_pretty(&health)?);
            println!("{}", serde_json::to_string_pretty(&ledger.metrics())?);
        }

        Commands::GenerateConfig { output } => {
            save_config(&AppConfig::default(), &output)?;
            println!(
                "{} wrote default configuration to {}",
                style("ok:").green().bold(),
                output.display()
            );
        }
    }

    Ok(())
}

/// Wire the engine to its live collaborators
fn build_engine(config: &AppConfig) -> (AnalysisEngine, Arc<LedgerClient>) {
    let ledger = Arc::new(LedgerClient::new(config.ledger.clone()));
    let prices = Arc::new(PriceResolver::new(config.pricing.clone()));
    let engine = AnalysisEngine::new(ledger.clone(), prices, config.engine.clone());
    (engine, ledger)
}

/// Parse a YYYY-MM-DD or RFC 3339 date
fn parse_date(raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("unparseable date: {raw}"))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .context("date has no midnight representation")?;
    Ok(Some(Utc.from_utc_datetime(&midnight)))
}

/// Read a wallet list file, one address per line, ignoring blanks and
/// `#` comments
fn read_wallet_list(path: &PathBuf) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read wallet list {}", path.display()))?;

    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Render one wallet result as text
fn print_result(result: &WalletAnalysisResult) {
    let status = match result.status {
        AnalysisStatus::Completed => style("completed").green(),
        AnalysisStatus::Partial => style("partial").yellow(),
        AnalysisStatus::Failed => style("failed").red(),
    };

    println!(
        "{} {} [{}]",
        style("wallet:").bold(),
        result.config.wallet_address,
        status
    );

    let m = &result.metrics;
    println!("  trades:        {} ({} wins / {} losses)", m.total_trades, m.winning_trades, m.losing_trades);
    println!("  realized pnl:  ${:.2}", m.total_realized_pnl_usd);
    println!("  net roi:       {:.2}%", m.net_roi_pct);
    println!("  max drawdown:  {:.2}%", m.max_drawdown_pct);
    match m.sharpe_ratio {
        Some(sharpe) => println!("  sharpe:        {sharpe:.3}"),
        None => println!("  sharpe:        n/a"),
    }
    println!("  win rate:      {:.1}%", m.win_rate_pct);
    match m.profit_factor {
        Some(pf) => println!("  profit factor: {pf:.2}"),
        None => println!("  profit factor: n/a"),
    }
    println!("  volume:        ${:.2}", m.total_volume_usd);
    println!("  fees:          ${:.2}", m.total_fees_usd);
    println!(
        "  data quality:  {:?} (confidence {:.2})",
        m.data_quality, m.confidence_score
    );
    println!(
        "  processed {} txs, {} swaps, {} errors in {}ms",
        result.processing_stats.total_transactions_fetched,
        result.processing_stats.valid_swaps_found,
        result.processing_stats.errors.len(),
        result.processing_stats.processing_time_ms,
    );
}
