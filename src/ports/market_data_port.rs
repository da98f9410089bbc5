//! Market data port trait.

use crate::domain::error::KestrelError;
use crate::domain::snapshot::IndicatorSnapshot;

/// Source of indicator snapshots, one per tick. Returns `None` once the
/// feed is exhausted, which ends the run.
pub trait MarketDataPort {
    fn next_snapshot(&mut self) -> Result<Option<IndicatorSnapshot>, KestrelError>;
}
