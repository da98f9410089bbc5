//! Entry signal evaluation.
//!
//! The entry policy is versioned: earlier generations of the strategy used
//! fewer filters, and all variants stay selectable so a run can be pinned to
//! the policy it was tuned against.

use super::snapshot::IndicatorSnapshot;

/// Decision produced by an entry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySignal {
    Hold,
    Open,
}

/// Versioned entry policies. Every variant is a pure predicate over a
/// snapshot; any `None` indicator forces `Hold` regardless of version.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntryPolicy {
    /// v1: RSI oversold only.
    RsiOversold { rsi_threshold: f64 },
    /// v2: RSI oversold and price under the lower Bollinger band.
    RsiBollinger { rsi_threshold: f64 },
    /// v3: v2 plus an EMA trend filter — only buy dips in an uptrend.
    TripleFilter { rsi_threshold: f64 },
}

impl EntryPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            EntryPolicy::RsiOversold { .. } => "rsi_oversold",
            EntryPolicy::RsiBollinger { .. } => "rsi_bollinger",
            EntryPolicy::TripleFilter { .. } => "triple_filter",
        }
    }

    /// Look up a policy by its configured name.
    pub fn from_name(name: &str, rsi_threshold: f64) -> Option<Self> {
        match name {
            "rsi_oversold" => Some(EntryPolicy::RsiOversold { rsi_threshold }),
            "rsi_bollinger" => Some(EntryPolicy::RsiBollinger { rsi_threshold }),
            "triple_filter" => Some(EntryPolicy::TripleFilter { rsi_threshold }),
            _ => None,
        }
    }

    /// Evaluate the policy against a snapshot. Stateless and side-effect
    /// free; returns `Hold` whenever a position is already open or any
    /// required indicator is still warming up.
    pub fn evaluate(&self, snapshot: &IndicatorSnapshot, position_open: bool) -> EntrySignal {
        if position_open || !snapshot.warmed_up() {
            return EntrySignal::Hold;
        }

        // warmed_up() guarantees these are present.
        let (Some(rsi), Some(bb_lower), Some(ema)) =
            (snapshot.rsi, snapshot.bb_lower, snapshot.ema)
        else {
            return EntrySignal::Hold;
        };

        let fires = match *self {
            EntryPolicy::RsiOversold { rsi_threshold } => rsi < rsi_threshold,
            EntryPolicy::RsiBollinger { rsi_threshold } => {
                rsi < rsi_threshold && snapshot.close < bb_lower
            }
            EntryPolicy::TripleFilter { rsi_threshold } => {
                rsi < rsi_threshold && snapshot.close < bb_lower && snapshot.close > ema
            }
        };

        if fires { EntrySignal::Open } else { EntrySignal::Hold }
    }
}
