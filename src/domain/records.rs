//! Append-only ledger records and derived daily aggregates.

use chrono::{DateTime, NaiveDate, Utc};

/// Why an open position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    TrailingStop,
    TakeProfit,
    StopLoss,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::StopLoss => "stop_loss",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "trailing_stop" => Some(ExitReason::TrailingStop),
            "take_profit" => Some(ExitReason::TakeProfit),
            "stop_loss" => Some(ExitReason::StopLoss),
            _ => None,
        }
    }
}

/// One completed round-trip. Immutable once written; unique on
/// `(entry_ts, exit_ts)` so retried writes after a crash are no-ops.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub entry_ts: DateTime<Utc>,
    pub exit_ts: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub pnl_usd: f64,
    pub pnl_pct: f64,
    pub exit_reason: ExitReason,
    pub high_water_mark: f64,
    pub entry_rsi: Option<f64>,
    pub duration_minutes: i64,
    /// Set when the liquidation order failed and the exit price is the last
    /// observed price rather than a confirmed fill.
    pub unreconciled: bool,
}

/// What kind of event a signal row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Entry,
    Exit,
    Skipped,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Entry => "entry",
            SignalKind::Exit => "exit",
            SignalKind::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "entry" => Some(SignalKind::Entry),
            "exit" => Some(SignalKind::Exit),
            "skipped" => Some(SignalKind::Skipped),
            _ => None,
        }
    }
}

/// Audit-trail row for every acted-on or skipped signal. Unique on
/// `(timestamp, kind)` with replace-on-conflict semantics.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: SignalKind,
    pub price: f64,
    pub rsi: Option<f64>,
    pub bb_lower: Option<f64>,
    pub bb_mid: Option<f64>,
    pub bb_upper: Option<f64>,
    pub ema: Option<f64>,
    pub position_open: bool,
    pub reason: String,
}

/// Aggregates for one calendar day, recomputed idempotently from that day's
/// trades and upserted by date.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyMetrics {
    pub date: NaiveDate,
    pub trades_total: i64,
    pub trades_won: i64,
    pub trades_lost: i64,
    pub pnl_total_usd: f64,
    pub avg_pnl_pct: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub best_trade_usd: f64,
    pub worst_trade_usd: f64,
}

impl DailyMetrics {
    /// Compute the day's row from its trades. `trades` must all belong to
    /// `date`; an empty slice yields the zero row.
    pub fn from_trades(date: NaiveDate, trades: &[TradeRecord]) -> Self {
        let mut won = 0i64;
        let mut lost = 0i64;
        let mut gains = 0.0f64;
        let mut losses = 0.0f64;
        let mut pnl_total = 0.0f64;
        let mut pct_total = 0.0f64;
        let mut best = 0.0f64;
        let mut worst = 0.0f64;

        for trade in trades {
            pnl_total += trade.pnl_usd;
            pct_total += trade.pnl_pct;
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

        let total = trades.len() as i64;
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
        let avg_pnl_pct = if total > 0 {
            pct_total / total as f64
        } else {
            0.0
        };

        DailyMetrics {
            date,
            trades_total: total,
            trades_won: won,
            trades_lost: lost,
            pnl_total_usd: pnl_total,
            avg_pnl_pct,
            win_rate,
            profit_factor,
            best_trade_usd: best,
            worst_trade_usd: worst,
        }
    }
}
