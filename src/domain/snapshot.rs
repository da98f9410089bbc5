//! Market snapshot with precomputed indicator values.
//!
//! The indicator collaborator returns a fixed structure with named fields.
//! Any field may be `None` while its indicator is still warming up.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub rsi: Option<f64>,
    pub bb_lower: Option<f64>,
    pub bb_mid: Option<f64>,
    pub bb_upper: Option<f64>,
    pub ema: Option<f64>,
}

impl IndicatorSnapshot {
    /// True once every indicator the entry policies can read has a value.
    pub fn warmed_up(&self) -> bool {
        self.rsi.is_some() && self.bb_lower.is_some() && self.ema.is_some()
    }
}
