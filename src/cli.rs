//! CLI definition and dispatch.

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_snapshot_feed::CsvSnapshotFeed;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::paper_exchange::PaperExchange;
use crate::adapters::sqlite_store::SqliteStore;
use crate::domain::engine::{Engine, EngineConfig};
use crate::domain::error::KestrelError;
use crate::domain::exit_rules::RiskParams;
use crate::domain::policy::EntryPolicy;
use crate::domain::report::PerformanceReport;
use crate::domain::records::TradeRecord;
use crate::ports::config_port::ConfigPort;
use crate::ports::state_port::StatePort;
use crate::runner::{Runner, RunnerConfig};

#[derive(Parser, Debug)]
#[command(name = "kestrel", about = "Single-instrument position lifecycle engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the tick loop against a snapshot feed
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// CSV snapshot feed to replay
        #[arg(short, long)]
        feed: PathBuf,
    },
    /// Show the persisted bot state
    Status {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List recent trades, newest first
    Trades {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, default_value_t = 20)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        /// Write the listed trades to a CSV file
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// List recent signal journal entries, newest first
    Signals {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Performance report over a lookback window
    Report {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, default_value_t = 30)]
        window_days: u32,
    },
    /// Recompute and show one day's aggregate metrics
    Daily {
        #[arg(short, long)]
        config: PathBuf,
        /// Day to aggregate (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run { config, feed } => run_loop(&config, &feed),
        Command::Status { config } => run_status(&config),
        Command::Trades {
            config,
            limit,
            offset,
            export,
        } => run_trades(&config, limit, offset, export.as_ref()),
        Command::Signals { config, limit } => run_signals(&config, limit),
        Command::Report {
            config,
            window_days,
        } => run_report(&config, window_days),
        Command::Daily { config, date } => run_daily(&config, date.as_deref()),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

fn open_store(config: &dyn ConfigPort) -> Result<SqliteStore, ExitCode> {
    let store = SqliteStore::from_config(config).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    store.initialize_schema().map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    Ok(store)
}

pub fn build_engine_config(config: &dyn ConfigPort) -> Result<EngineConfig, KestrelError> {
    let policy_name = config
        .get_string("strategy", "policy")
        .unwrap_or_else(|| "triple_filter".to_string());
    let rsi_threshold = config.get_double("strategy", "rsi_threshold", 35.0);
    if !(0.0..=100.0).contains(&rsi_threshold) {
        return Err(KestrelError::ConfigInvalid {
            section: "strategy".into(),
            key: "rsi_threshold".into(),
            reason: "must be between 0 and 100".into(),
        });
    }

    let entry_policy = EntryPolicy::from_name(&policy_name, rsi_threshold).ok_or_else(|| {
        KestrelError::ConfigInvalid {
            section: "strategy".into(),
            key: "policy".into(),
            reason: format!("unknown policy '{policy_name}'"),
        }
    })?;

    let position_size_fraction = config.get_double("sizing", "position_size_fraction", 0.95);
    if !(position_size_fraction > 0.0 && position_size_fraction <= 1.0) {
        return Err(KestrelError::ConfigInvalid {
            section: "sizing".into(),
            key: "position_size_fraction".into(),
            reason: "must be in (0, 1]".into(),
        });
    }

    Ok(EngineConfig {
        entry_policy,
        risk: RiskParams {
            stop_loss_pct: config.get_double("risk", "stop_loss_pct", 0.01),
            take_profit_pct: config.get_double("risk", "take_profit_pct", 0.015),
            trailing_pct: config.get_double("risk", "trailing_pct", 0.005),
        },
        position_size_fraction,
        min_notional_usd: config.get_double("sizing", "min_notional_usd", 10.0),
        balance_floor_usd: config.get_double("sizing", "balance_floor_usd", 15.0),
        quote_asset: config
            .get_string("sizing", "quote_asset")
            .unwrap_or_else(|| "USDT".to_string()),
    })
}

fn run_loop(config_path: &PathBuf, feed_path: &PathBuf) -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let engine_config = match build_engine_config(&config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let store = match open_store(&config) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let exchange = PaperExchange::from_config(&config);

    let mut feed = match CsvSnapshotFeed::from_file(feed_path.clone()) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let engine = Engine::new(&exchange, &store, engine_config);
    let runner = Runner::new(engine, &exchange, &store, RunnerConfig::from_config(&config));

    match runner.run(&mut feed) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_status(config_path: &PathBuf) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let store = match open_store(&config) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let state = match store.load_state() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    println!("position_open:            {}", state.position_open);
    if state.position_open {
        println!("entry_price:              {:.2}", state.entry_price);
        println!("quantity:                 {}", state.quantity);
        println!("high_water_mark:          {:.2}", state.high_water_mark);
        if let Some(entry_ts) = state.entry_ts {
            println!("entry_ts:                 {entry_ts}");
        }
        if let Some(rsi) = state.entry_rsi {
            println!("entry_rsi:                {rsi:.1}");
        }
    }
    println!("trades_today:             {}", state.trades_today);
    println!(
        "cumulative_pnl_pct_today: {:+.3}%",
        state.cumulative_pnl_pct_today
    );
    println!("last_update:              {}", state.last_update);

    ExitCode::SUCCESS
}

fn run_trades(
    config_path: &PathBuf,
    limit: u32,
    offset: u32,
    export: Option<&PathBuf>,
) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let store = match open_store(&config) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let trades = match store.recent_trades(limit, offset) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    if trades.is_empty() {
        eprintln!("no trades recorded");
        return ExitCode::SUCCESS;
    }

    for trade in &trades {
        let flag = if trade.unreconciled { " [unreconciled]" } else { "" };
        println!(
            "{}  {:>13}  entry {:.2}  exit {:.2}  pnl {:+.2} ({:+.3}%)  {}m{}",
            trade.exit_ts,
            trade.exit_reason.as_str(),
            trade.entry_price,
            trade.exit_price,
            trade.pnl_usd,
            trade.pnl_pct * 100.0,
            trade.duration_minutes,
            flag,
        );
    }

    if let Some(path) = export {
        if let Err(e) = export_trades_csv(&trades, path) {
            eprintln!("error: {e}");
            return (&e).into();
        }
        eprintln!("{} trades written to {}", trades.len(), path.display());
    }

    ExitCode::SUCCESS
}

fn export_trades_csv(trades: &[TradeRecord], path: &PathBuf) -> Result<(), KestrelError> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|e| KestrelError::Io(std::io::Error::other(e.to_string())))?;

    wtr.write_record([
        "entry_ts",
        "exit_ts",
        "entry_price",
        "exit_price",
        "quantity",
        "pnl_usd",
        "pnl_pct",
        "exit_reason",
        "high_water_mark",
        "entry_rsi",
        "duration_minutes",
        "unreconciled",
    ])
    .map_err(|e| KestrelError::Io(std::io::Error::other(e.to_string())))?;

    for trade in trades {
        wtr.write_record([
            trade.entry_ts.to_rfc3339(),
            trade.exit_ts.to_rfc3339(),
            trade.entry_price.to_string(),
            trade.exit_price.to_string(),
            trade.quantity.to_string(),
            trade.pnl_usd.to_string(),
            trade.pnl_pct.to_string(),
            trade.exit_reason.as_str().to_string(),
            trade.high_water_mark.to_string(),
            trade.entry_rsi.map(|r| r.to_string()).unwrap_or_default(),
            trade.duration_minutes.to_string(),
            trade.unreconciled.to_string(),
        ])
        .map_err(|e| KestrelError::Io(std::io::Error::other(e.to_string())))?;
    }

    wtr.flush().map_err(KestrelError::Io)?;
    Ok(())
}

fn run_signals(config_path: &PathBuf, limit: u32) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let store = match open_store(&config) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let signals = match store.recent_signals(limit) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    if signals.is_empty() {
        eprintln!("no signals recorded");
        return ExitCode::SUCCESS;
    }

    for signal in &signals {
        println!(
            "{}  {:>7}  close {:.2}  rsi {}  {}",
            signal.timestamp,
            signal.kind.as_str(),
            signal.price,
            signal
                .rsi
                .map(|r| format!("{r:.1}"))
                .unwrap_or_else(|| "-".to_string()),
            signal.reason,
        );
    }

    ExitCode::SUCCESS
}

fn run_report(config_path: &PathBuf, window_days: u32) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let store = match open_store(&config) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let cutoff = Utc::now() - chrono::Duration::days(window_days as i64);
    let trades = match store.trades_since(cutoff) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let report = PerformanceReport::compute(&trades, window_days);

    println!("=== Performance ({window_days}d window) ===");
    println!("Total Trades:     {}", report.total_trades);
    println!(
        "Win Rate:         {:.1}% ({} won / {} lost)",
        report.win_rate * 100.0,
        report.trades_won,
        report.trades_lost
    );
    println!("Net Profit:       {:+.2} USD", report.net_profit_usd);
    println!("Sharpe Ratio:     {:.2}", report.sharpe_ratio);
    println!(
        "Max Drawdown:     -{:.2}%",
        report.max_drawdown.max_fraction * 100.0
    );
    println!("Profit Factor:    {:.2}", report.profit_factor);
    println!("Expectancy:       {:+.2} USD", report.expectancy_usd);
    println!("Recovery Factor:  {:.2}", report.recovery_factor);
    println!("Best Trade:       {:+.2} USD", report.best_trade_usd);
    println!("Worst Trade:      {:+.2} USD", report.worst_trade_usd);
    println!("Avg Duration:     {:.0}m", report.avg_duration_minutes);

    ExitCode::SUCCESS
}

fn run_daily(config_path: &PathBuf, date: Option<&str>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let store = match open_store(&config) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let date = match date {
        Some(s) => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            Ok(d) => d,
            Err(_) => {
                eprintln!("error: invalid date '{s}' (expected YYYY-MM-DD)");
                return ExitCode::from(2);
            }
        },
        None => Utc::now().date_naive(),
    };

    let metrics = match store.upsert_daily_metrics(date) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    println!("=== Daily Metrics {date} ===");
    println!("Trades:        {}", metrics.trades_total);
    println!(
        "Won / Lost:    {} / {}",
        metrics.trades_won, metrics.trades_lost
    );
    println!("Net PnL:       {:+.2} USD", metrics.pnl_total_usd);
    println!("Avg PnL:       {:+.3}%", metrics.avg_pnl_pct * 100.0);
    println!("Win Rate:      {:.1}%", metrics.win_rate * 100.0);
    println!("Profit Factor: {:.2}", metrics.profit_factor);
    println!("Best Trade:    {:+.2} USD", metrics.best_trade_usd);
    println!("Worst Trade:   {:+.2} USD", metrics.worst_trade_usd);

    ExitCode::SUCCESS
}
