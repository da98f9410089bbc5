//! Singleton bot state: the one logical row the engine mutates.

use chrono::{DateTime, Utc};

/// Persistent state of the bot. Exactly one logical instance exists; the
/// state machine is its sole writer.
///
/// Invariants: while `position_open`, `high_water_mark >= entry_price`;
/// while flat, `entry_price`, `quantity` and `high_water_mark` are zero and
/// the entry context fields are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct BotState {
    pub position_open: bool,
    pub entry_price: f64,
    pub quantity: f64,
    pub high_water_mark: f64,
    /// When the open position was entered; carried so a restart can still
    /// emit a complete trade record.
    pub entry_ts: Option<DateTime<Utc>>,
    /// RSI observed at entry, for the trade record.
    pub entry_rsi: Option<f64>,
    pub cumulative_pnl_pct_today: f64,
    pub trades_today: i64,
    pub last_update: DateTime<Utc>,
}

impl BotState {
    /// Flat default, used on first load and as the corruption fallback.
    pub fn flat(now: DateTime<Utc>) -> Self {
        BotState {
            position_open: false,
            entry_price: 0.0,
            quantity: 0.0,
            high_water_mark: 0.0,
            entry_ts: None,
            entry_rsi: None,
            cumulative_pnl_pct_today: 0.0,
            trades_today: 0,
            last_update: now,
        }
    }

    /// Open notional at entry (`quantity * entry_price`).
    pub fn notional(&self) -> f64 {
        self.quantity * self.entry_price
    }

    /// Zero the entry fields after a round-trip, keeping the daily counters.
    pub fn close_position(&mut self, now: DateTime<Utc>) {
        self.position_open = false;
        self.entry_price = 0.0;
        self.quantity = 0.0;
        self.high_water_mark = 0.0;
        self.entry_ts = None;
        self.entry_rsi = None;
        self.last_update = now;
    }

    /// Reset the per-day counters at a calendar-day rollover.
    pub fn reset_daily_counters(&mut self, now: DateTime<Utc>) {
        self.trades_today = 0;
        self.cumulative_pnl_pct_today = 0.0;
        self.last_update = now;
    }
}
