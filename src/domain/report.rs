//! Performance analytics over the trade log.

use chrono::{DateTime, Utc};

use super::records::TradeRecord;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Notional baseline for the equity curve used by drawdown and recovery.
pub const EQUITY_BASELINE_USD: f64 = 10_000.0;

/// Maximum drawdown of the running equity curve.
#[derive(Debug, Clone, PartialEq)]
pub struct Drawdown {
    /// Fraction of the peak lost at the deepest trough, 0.0..=1.0.
    pub max_fraction: f64,
    pub peak_ts: Option<DateTime<Utc>>,
    pub trough_ts: Option<DateTime<Utc>>,
}

/// On-demand statistics over a lookback window of trades.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceReport {
    pub window_days: u32,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub win_rate: f64,
    pub net_profit_usd: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: Drawdown,
    pub profit_factor: f64,
    pub expectancy_usd: f64,
    pub recovery_factor: f64,
    pub best_trade_usd: f64,
    pub worst_trade_usd: f64,
    pub avg_duration_minutes: f64,
}

impl PerformanceReport {
    /// Compute the full report over the window's trades, ordered oldest
    /// first. O(n) in the number of trades.
    pub fn compute(trades: &[TradeRecord], window_days: u32) -> Self {
        let mut won = 0usize;
        let mut lost = 0usize;
        let mut gains = 0.0f64;
        let mut losses = 0.0f64;
        let mut net_profit = 0.0f64;
        let mut best = 0.0f64;
        let mut worst = 0.0f64;
        let mut duration_total = 0i64;

        for trade in trades {
            net_profit += trade.pnl_usd;
            duration_total += trade.duration_minutes;
            if trade.pnl_usd > 0.0 {
                won += 1;
                gains += trade.pnl_usd;
            } else {
                lost += 1;
                losses += trade.pnl_usd.abs();
            }
            if trade.pnl_usd > best {
                best = trade.pnl_usd;
            }
            if trade.pnl_usd < worst {
                worst = trade.pnl_usd;
            }
        }

        let total = trades.len();
        let win_rate = if total > 0 {
            won as f64 / total as f64
        } else {
            0.0
        };

        let profit_factor = if losses > 0.0 {
            gains / losses
        } else if gains > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if won > 0 { gains / won as f64 } else { 0.0 };
        let avg_loss = if lost > 0 { losses / lost as f64 } else { 0.0 };
        let expectancy = if total > 0 {
            win_rate * avg_win - (1.0 - win_rate) * avg_loss
        } else {
            0.0
        };

        let max_drawdown = compute_drawdown(trades);

        let dd_usd = max_drawdown.max_fraction * EQUITY_BASELINE_USD;
        let recovery_factor = if dd_usd > 0.0 { net_profit / dd_usd } else { 0.0 };

        let avg_duration = if total > 0 {
            duration_total as f64 / total as f64
        } else {
            0.0
        };

        PerformanceReport {
            window_days,
            total_trades: total,
            trades_won: won,
            trades_lost: lost,
            win_rate,
            net_profit_usd: net_profit,
            sharpe_ratio: compute_sharpe(trades, window_days),
            max_drawdown,
            profit_factor,
            expectancy_usd: expectancy,
            recovery_factor,
            best_trade_usd: best,
            worst_trade_usd: worst,
            avg_duration_minutes: avg_duration,
        }
    }
}

/// Annualized Sharpe ratio over per-trade returns, sample stdev (n − 1).
/// Zero for fewer than two trades or zero variance.
fn compute_sharpe(trades: &[TradeRecord], window_days: u32) -> f64 {
    if trades.len() < 2 || window_days == 0 {
        return 0.0;
    }

    let n = trades.len() as f64;
    let mean = trades.iter().map(|t| t.pnl_pct).sum::<f64>() / n;
    let variance = trades
        .iter()
        .map(|t| (t.pnl_pct - mean).powi(2))
        .sum::<f64>()
        / (n - 1.0);
    let stddev = variance.sqrt();

    if stddev <= 0.0 {
        return 0.0;
    }

    (mean / stddev) * (TRADING_DAYS_PER_YEAR / window_days as f64).sqrt()
}

/// Running-equity drawdown from the fixed notional baseline, applying each
/// trade's `pnl_usd` in exit order.
fn compute_drawdown(trades: &[TradeRecord]) -> Drawdown {
    let mut equity = EQUITY_BASELINE_USD;
    let mut peak = equity;
    let mut peak_ts_current: Option<DateTime<Utc>> = None;
    let mut max_dd = 0.0f64;
    let mut peak_ts = None;
    let mut trough_ts = None;

    for trade in trades {
        equity += trade.pnl_usd;
        if equity > peak {
            peak = equity;
            peak_ts_current = Some(trade.exit_ts);
        } else if peak > 0.0 {
            let dd = (peak - equity) / peak;
            if dd > max_dd {
                max_dd = dd;
                peak_ts = peak_ts_current;
                trough_ts = Some(trade.exit_ts);
            }
        }
    }

    Drawdown {
        max_fraction: max_dd,
        peak_ts,
        trough_ts,
    }
}
