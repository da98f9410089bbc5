//! CSV indicator snapshot feed.
//!
//! Replays pre-computed indicator rows from a CSV file, one per call. Used
//! for paper runs and deterministic replay of recorded market data.
//!
//! Expected header: `timestamp,close,rsi,bb_lower,bb_mid,bb_upper,ema`.
//! Indicator columns may be empty during warm-up.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::domain::error::KestrelError;
use crate::domain::snapshot::IndicatorSnapshot;
use crate::ports::market_data_port::MarketDataPort;

pub struct CsvSnapshotFeed {
    rows: Vec<IndicatorSnapshot>,
    cursor: usize,
}

fn feed_err(reason: String) -> KestrelError {
    KestrelError::Feed { reason }
}

fn parse_optional(record: &csv::StringRecord, index: usize, name: &str) -> Result<Option<f64>, KestrelError> {
    let Some(raw) = record.get(index) else {
        return Err(feed_err(format!("missing {name} column")));
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    raw.trim()
        .parse::<f64>()
        .map(Some)
        .map_err(|e| feed_err(format!("invalid {name} value: {e}")))
}

impl CsvSnapshotFeed {
    pub fn from_file(path: PathBuf) -> Result<Self, KestrelError> {
        let content = fs::read_to_string(&path)
            .map_err(|e| feed_err(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_string(&content)
    }

    pub fn from_string(content: &str) -> Result<Self, KestrelError> {
        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut rows = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| feed_err(format!("CSV parse error: {e}")))?;

            let ts_str = record
                .get(0)
                .ok_or_else(|| feed_err("missing timestamp column".into()))?;
            let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(ts_str)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| feed_err(format!("invalid timestamp: {e}")))?;

            let close: f64 = record
                .get(1)
                .ok_or_else(|| feed_err("missing close column".into()))?
                .parse()
                .map_err(|e| feed_err(format!("invalid close value: {e}")))?;

            rows.push(IndicatorSnapshot {
                timestamp,
                close,
                rsi: parse_optional(&record, 2, "rsi")?,
                bb_lower: parse_optional(&record, 3, "bb_lower")?,
                bb_mid: parse_optional(&record, 4, "bb_mid")?,
                bb_upper: parse_optional(&record, 5, "bb_upper")?,
                ema: parse_optional(&record, 6, "ema")?,
            });
        }

        rows.sort_by_key(|r| r.timestamp);
        Ok(Self { rows, cursor: 0 })
    }
}

impl MarketDataPort for CsvSnapshotFeed {
    fn next_snapshot(&mut self) -> Result<Option<IndicatorSnapshot>, KestrelError> {
        let Some(snapshot) = self.rows.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        Ok(Some(snapshot.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = "timestamp,close,rsi,bb_lower,bb_mid,bb_upper,ema\n\
        2024-06-01T10:00:00+00:00,90000.0,,,,,\n\
        2024-06-01T10:01:00+00:00,90100.0,32.5,90500.0,91000.0,91500.0,89000.0\n\
        2024-06-01T10:02:00+00:00,90200.0,34.0,90600.0,91100.0,91600.0,89100.0\n";

    #[test]
    fn replays_rows_in_timestamp_order() {
        let mut feed = CsvSnapshotFeed::from_string(FEED).unwrap();

        let first = feed.next_snapshot().unwrap().unwrap();
        assert!((first.close - 90_000.0).abs() < f64::EPSILON);
        assert!(first.rsi.is_none());
        assert!(!first.warmed_up());

        let second = feed.next_snapshot().unwrap().unwrap();
        assert_eq!(second.rsi, Some(32.5));
        assert!(second.warmed_up());

        let third = feed.next_snapshot().unwrap().unwrap();
        assert!((third.close - 90_200.0).abs() < f64::EPSILON);

        assert!(feed.next_snapshot().unwrap().is_none());
    }

    #[test]
    fn out_of_order_rows_are_sorted() {
        let content = "timestamp,close,rsi,bb_lower,bb_mid,bb_upper,ema\n\
            2024-06-01T10:05:00+00:00,2.0,,,,,\n\
            2024-06-01T10:00:00+00:00,1.0,,,,,\n";
        let mut feed = CsvSnapshotFeed::from_string(content).unwrap();
        assert!((feed.next_snapshot().unwrap().unwrap().close - 1.0).abs() < f64::EPSILON);
        assert!((feed.next_snapshot().unwrap().unwrap().close - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bad_timestamp_is_an_error() {
        let content = "timestamp,close,rsi,bb_lower,bb_mid,bb_upper,ema\n\
            not-a-time,1.0,,,,,\n";
        let result = CsvSnapshotFeed::from_string(content);
        assert!(matches!(result, Err(KestrelError::Feed { .. })));
    }

    #[test]
    fn bad_indicator_value_is_an_error() {
        let content = "timestamp,close,rsi,bb_lower,bb_mid,bb_upper,ema\n\
            2024-06-01T10:00:00+00:00,1.0,abc,,,,\n";
        let result = CsvSnapshotFeed::from_string(content);
        assert!(matches!(result, Err(KestrelError::Feed { .. })));
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = CsvSnapshotFeed::from_file(PathBuf::from("/nonexistent/feed.csv"));
        assert!(matches!(result, Err(KestrelError::Feed { .. })));
    }
}
