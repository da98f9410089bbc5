//! Persistent state store port trait.

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::error::KestrelError;
use crate::domain::records::{DailyMetrics, SignalRecord, TradeRecord};
use crate::domain::state::BotState;

/// Crash-consistent store for the singleton state row and the append-only
/// trade/signal logs. Every write commits before returning. The engine is
/// the sole writer; readers tolerate eventually-consistent snapshots.
pub trait StatePort {
    /// Load the singleton state row, creating and persisting a flat default
    /// if absent. Idempotent; safe on every cold start.
    fn load_state(&self) -> Result<BotState, KestrelError>;

    /// Atomic full replace of the singleton row.
    fn save_state(&self, state: &BotState) -> Result<(), KestrelError>;

    /// Insert a completed round-trip. A duplicate `(entry_ts, exit_ts)` is
    /// ignored, not an error — safe under retried writes after a crash.
    fn record_trade(&self, trade: &TradeRecord) -> Result<(), KestrelError>;

    /// Insert-or-replace keyed by `(timestamp, kind)`.
    fn record_signal(&self, signal: &SignalRecord) -> Result<(), KestrelError>;

    /// Persist an opened position and its entry signal atomically: both
    /// land or neither does.
    fn commit_open(&self, state: &BotState, signal: &SignalRecord) -> Result<(), KestrelError>;

    /// Persist a completed round trip — trade row, exit signal and the flat
    /// state — atomically. A partial commit would let the next tick close
    /// the same position again under a fresh `exit_ts`.
    fn commit_close(
        &self,
        trade: &TradeRecord,
        signal: &SignalRecord,
        state: &BotState,
    ) -> Result<(), KestrelError>;

    /// Most recent trades, newest first, paginated.
    fn recent_trades(&self, limit: u32, offset: u32) -> Result<Vec<TradeRecord>, KestrelError>;

    /// Trades with `exit_ts >= cutoff`, oldest first (equity-curve order).
    fn trades_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<TradeRecord>, KestrelError>;

    /// Trades exited on the given calendar day, oldest first.
    fn trades_on(&self, date: NaiveDate) -> Result<Vec<TradeRecord>, KestrelError>;

    /// Most recent signals, newest first.
    fn recent_signals(&self, limit: u32) -> Result<Vec<SignalRecord>, KestrelError>;

    /// Recompute the day's aggregate row from its trades and upsert it.
    /// Idempotent: recomputing an unchanged day rewrites the same row.
    fn upsert_daily_metrics(&self, date: NaiveDate) -> Result<DailyMetrics, KestrelError>;

    /// Read back a previously computed daily row, if any.
    fn daily_metrics(&self, date: NaiveDate) -> Result<Option<DailyMetrics>, KestrelError>;
}
