//! Exit rule resolution for an open position.
//!
//! Rules are checked in a fixed priority — trailing stop, take-profit,
//! stop-loss — and at most one trigger fires per call. Profit-protecting
//! rules outrank the catastrophic stop-loss when several thresholds are
//! breached in the same tick; the ordering is a contract, pinned by tests.

use super::records::ExitReason;

/// Risk parameters governing exits. Percentages are fractions
/// (0.01 = 1%). `trailing_pct = 0` disables the trailing stop, matching the
/// pre-trailing generation of the strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskParams {
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub trailing_pct: f64,
}

impl Default for RiskParams {
    fn default() -> Self {
        RiskParams {
            stop_loss_pct: 0.01,
            take_profit_pct: 0.015,
            trailing_pct: 0.005,
        }
    }
}

/// Outcome of one exit evaluation: the (possibly advanced) high-water mark
/// and the trigger, if any fired.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitDecision {
    pub high_water_mark: f64,
    pub trigger: Option<ExitReason>,
}

/// Advance the high-water mark, then evaluate the exit ladder.
///
/// The mark is monotone: it never moves down, and the caller persists it
/// even when no trigger fires.
pub fn resolve_exit(
    entry_price: f64,
    high_water_mark: f64,
    price: f64,
    params: &RiskParams,
) -> ExitDecision {
    let hwm = high_water_mark.max(price);

    let trigger = if params.trailing_pct > 0.0 && price <= hwm * (1.0 - params.trailing_pct) {
        Some(ExitReason::TrailingStop)
    } else if params.take_profit_pct > 0.0
        && price >= entry_price * (1.0 + params.take_profit_pct)
    {
        Some(ExitReason::TakeProfit)
    } else if params.stop_loss_pct > 0.0 && price <= entry_price * (1.0 - params.stop_loss_pct) {
        Some(ExitReason::StopLoss)
    } else {
        None
    };

    ExitDecision {
        high_water_mark: hwm,
        trigger,
    }
}
