//! SQLite state store adapter.
//!
//! One singleton state row, append-only trade/signal logs, and a derived
//! daily-metrics table. Every write commits synchronously before returning.

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Row, params};
use tracing::warn;

use crate::domain::error::KestrelError;
use crate::domain::records::{DailyMetrics, ExitReason, SignalKind, SignalRecord, TradeRecord};
use crate::domain::state::BotState;
use crate::ports::config_port::ConfigPort;
use crate::ports::state_port::StatePort;

pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_err(e: r2d2::Error) -> KestrelError {
    KestrelError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> KestrelError {
    KestrelError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// Row writes against an already-held connection, shared by the single-call
// StatePort methods and the transactional commits.

fn write_state(conn: &rusqlite::Connection, state: &BotState) -> Result<(), KestrelError> {
    conn.execute(
        "INSERT OR REPLACE INTO bot_state (
            id, position_open, entry_price, quantity, high_water_mark,
            entry_ts, entry_rsi, cumulative_pnl_pct_today, trades_today, last_update
        ) VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            state.position_open as i64,
            state.entry_price,
            state.quantity,
            state.high_water_mark,
            state.entry_ts.map(format_ts),
            state.entry_rsi,
            state.cumulative_pnl_pct_today,
            state.trades_today,
            format_ts(state.last_update),
        ],
    )
    .map_err(query_err)?;
    Ok(())
}

fn insert_trade(conn: &rusqlite::Connection, trade: &TradeRecord) -> Result<(), KestrelError> {
    conn.execute(
        "INSERT OR IGNORE INTO trades (
            entry_ts, exit_ts, entry_price, exit_price, quantity, pnl_usd,
            pnl_pct, exit_reason, high_water_mark, entry_rsi,
            duration_minutes, unreconciled
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            format_ts(trade.entry_ts),
            format_ts(trade.exit_ts),
            trade.entry_price,
            trade.exit_price,
            trade.quantity,
            trade.pnl_usd,
            trade.pnl_pct,
            trade.exit_reason.as_str(),
            trade.high_water_mark,
            trade.entry_rsi,
            trade.duration_minutes,
            trade.unreconciled as i64,
        ],
    )
    .map_err(query_err)?;
    Ok(())
}

fn insert_signal(conn: &rusqlite::Connection, signal: &SignalRecord) -> Result<(), KestrelError> {
    conn.execute(
        "INSERT OR REPLACE INTO signals (
            timestamp, kind, price, rsi, bb_lower, bb_mid, bb_upper, ema,
            position_open, reason
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            format_ts(signal.timestamp),
            signal.kind.as_str(),
            signal.price,
            signal.rsi,
            signal.bb_lower,
            signal.bb_mid,
            signal.bb_upper,
            signal.ema,
            signal.position_open as i64,
            signal.reason,
        ],
    )
    .map_err(query_err)?;
    Ok(())
}

impl SqliteStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, KestrelError> {
        let db_path = config
            .get_string("sqlite", "path")
            .ok_or_else(|| KestrelError::ConfigMissing {
                section: "sqlite".into(),
                key: "path".into(),
            })?;
        let pool_size = config.get_int("sqlite", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, KestrelError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), KestrelError> {
        let conn = self.pool.get().map_err(pool_err)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS bot_state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                position_open INTEGER NOT NULL DEFAULT 0,
                entry_price REAL NOT NULL DEFAULT 0,
                quantity REAL NOT NULL DEFAULT 0,
                high_water_mark REAL NOT NULL DEFAULT 0,
                entry_ts TEXT,
                entry_rsi REAL,
                cumulative_pnl_pct_today REAL NOT NULL DEFAULT 0,
                trades_today INTEGER NOT NULL DEFAULT 0,
                last_update TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entry_ts TEXT NOT NULL,
                exit_ts TEXT NOT NULL,
                entry_price REAL NOT NULL,
                exit_price REAL NOT NULL,
                quantity REAL NOT NULL,
                pnl_usd REAL NOT NULL,
                pnl_pct REAL NOT NULL,
                exit_reason TEXT NOT NULL,
                high_water_mark REAL NOT NULL,
                entry_rsi REAL,
                duration_minutes INTEGER NOT NULL,
                unreconciled INTEGER NOT NULL DEFAULT 0,
                UNIQUE(entry_ts, exit_ts)
            );
            CREATE INDEX IF NOT EXISTS idx_trades_exit_ts ON trades(exit_ts);
            CREATE TABLE IF NOT EXISTS signals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                kind TEXT NOT NULL,
                price REAL NOT NULL,
                rsi REAL,
                bb_lower REAL,
                bb_mid REAL,
                bb_upper REAL,
                ema REAL,
                position_open INTEGER NOT NULL,
                reason TEXT NOT NULL,
                UNIQUE(timestamp, kind)
            );
            CREATE INDEX IF NOT EXISTS idx_signals_timestamp ON signals(timestamp);
            CREATE TABLE IF NOT EXISTS daily_metrics (
                date TEXT PRIMARY KEY,
                trades_total INTEGER NOT NULL DEFAULT 0,
                trades_won INTEGER NOT NULL DEFAULT 0,
                trades_lost INTEGER NOT NULL DEFAULT 0,
                pnl_total_usd REAL NOT NULL DEFAULT 0.0,
                avg_pnl_pct REAL NOT NULL DEFAULT 0.0,
                win_rate REAL NOT NULL DEFAULT 0.0,
                profit_factor REAL NOT NULL DEFAULT 0.0,
                best_trade_usd REAL NOT NULL DEFAULT 0.0,
                worst_trade_usd REAL NOT NULL DEFAULT 0.0
            );",
        )
        .map_err(query_err)?;

        Ok(())
    }

    fn trade_from_row(row: &Row<'_>) -> rusqlite::Result<TradeRecord> {
        let entry_str: String = row.get(0)?;
        let exit_str: String = row.get(1)?;
        let reason_str: String = row.get(7)?;

        let conversion = |col: usize, s: &str| {
            rusqlite::Error::FromSqlConversionFailure(
                col,
                rusqlite::types::Type::Text,
                format!("unparseable value: {s}").into(),
            )
        };

        Ok(TradeRecord {
            entry_ts: parse_ts(&entry_str).ok_or_else(|| conversion(0, &entry_str))?,
            exit_ts: parse_ts(&exit_str).ok_or_else(|| conversion(1, &exit_str))?,
            entry_price: row.get(2)?,
            exit_price: row.get(3)?,
            quantity: row.get(4)?,
            pnl_usd: row.get(5)?,
            pnl_pct: row.get(6)?,
            exit_reason: ExitReason::parse(&reason_str)
                .ok_or_else(|| conversion(7, &reason_str))?,
            high_water_mark: row.get(8)?,
            entry_rsi: row.get(9)?,
            duration_minutes: row.get(10)?,
            unreconciled: row.get::<_, i64>(11)? != 0,
        })
    }

    fn query_trades(
        &self,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<TradeRecord>, KestrelError> {
        let conn = self.pool.get().map_err(pool_err)?;
        let mut stmt = conn.prepare(sql).map_err(query_err)?;
        let rows = stmt
            .query_map(args, Self::trade_from_row)
            .map_err(query_err)?;

        let mut trades = Vec::new();
        for row in rows {
            trades.push(row.map_err(query_err)?);
        }
        Ok(trades)
    }
}

const TRADE_COLUMNS: &str = "entry_ts, exit_ts, entry_price, exit_price, quantity, pnl_usd, \
     pnl_pct, exit_reason, high_water_mark, entry_rsi, duration_minutes, unreconciled";

impl StatePort for SqliteStore {
    fn load_state(&self) -> Result<BotState, KestrelError> {
        let conn = self.pool.get().map_err(pool_err)?;

        let row: Option<(i64, f64, f64, f64, Option<String>, Option<f64>, f64, i64, String)> =
            conn.query_row(
                "SELECT position_open, entry_price, quantity, high_water_mark, entry_ts,
                        entry_rsi, cumulative_pnl_pct_today, trades_today, last_update
                 FROM bot_state WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                        row.get(8)?,
                    ))
                },
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(query_err(other)),
            })?;

        let Some((open, entry_price, quantity, hwm, entry_ts, entry_rsi, pnl_today, trades, last)) =
            row
        else {
            // First cold start: create and persist the default row so a
            // second load is stable. Written through the connection already
            // in hand; a second pool checkout would deadlock a size-1 pool.
            let state = BotState::flat(Utc::now());
            write_state(&conn, &state)?;
            return Ok(state);
        };

        let Some(last_update) = parse_ts(&last) else {
            // Malformed on-disk state degrades to a flat default rather
            // than failing startup.
            warn!(value = %last, "corrupt last_update in state row, resetting to defaults");
            let state = BotState::flat(Utc::now());
            write_state(&conn, &state)?;
            return Ok(state);
        };

        Ok(BotState {
            position_open: open != 0,
            entry_price,
            quantity,
            high_water_mark: hwm,
            entry_ts: entry_ts.as_deref().and_then(parse_ts),
            entry_rsi,
            cumulative_pnl_pct_today: pnl_today,
            trades_today: trades,
            last_update,
        })
    }

    fn save_state(&self, state: &BotState) -> Result<(), KestrelError> {
        let conn = self.pool.get().map_err(pool_err)?;
        write_state(&conn, state)
    }

    fn record_trade(&self, trade: &TradeRecord) -> Result<(), KestrelError> {
        let conn = self.pool.get().map_err(pool_err)?;
        insert_trade(&conn, trade)
    }

    fn record_signal(&self, signal: &SignalRecord) -> Result<(), KestrelError> {
        let conn = self.pool.get().map_err(pool_err)?;
        insert_signal(&conn, signal)
    }

    fn commit_open(&self, state: &BotState, signal: &SignalRecord) -> Result<(), KestrelError> {
        let mut conn = self.pool.get().map_err(pool_err)?;
        let tx = conn.transaction().map_err(query_err)?;
        write_state(&tx, state)?;
        insert_signal(&tx, signal)?;
        tx.commit().map_err(query_err)
    }

    fn commit_close(
        &self,
        trade: &TradeRecord,
        signal: &SignalRecord,
        state: &BotState,
    ) -> Result<(), KestrelError> {
        let mut conn = self.pool.get().map_err(pool_err)?;
        let tx = conn.transaction().map_err(query_err)?;
        insert_trade(&tx, trade)?;
        insert_signal(&tx, signal)?;
        write_state(&tx, state)?;
        tx.commit().map_err(query_err)
    }

    fn recent_trades(&self, limit: u32, offset: u32) -> Result<Vec<TradeRecord>, KestrelError> {
        self.query_trades(
            &format!(
                "SELECT {TRADE_COLUMNS} FROM trades
                 ORDER BY exit_ts DESC LIMIT ?1 OFFSET ?2"
            ),
            &[&limit, &offset],
        )
    }

    fn trades_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<TradeRecord>, KestrelError> {
        self.query_trades(
            &format!(
                "SELECT {TRADE_COLUMNS} FROM trades
                 WHERE exit_ts >= ?1 ORDER BY exit_ts ASC"
            ),
            &[&format_ts(cutoff)],
        )
    }

    fn trades_on(&self, date: NaiveDate) -> Result<Vec<TradeRecord>, KestrelError> {
        self.query_trades(
            &format!(
                "SELECT {TRADE_COLUMNS} FROM trades
                 WHERE date(exit_ts) = ?1 ORDER BY exit_ts ASC"
            ),
            &[&date.format("%Y-%m-%d").to_string()],
        )
    }

    fn recent_signals(&self, limit: u32) -> Result<Vec<SignalRecord>, KestrelError> {
        let conn = self.pool.get().map_err(pool_err)?;

        let mut stmt = conn
            .prepare(
                "SELECT timestamp, kind, price, rsi, bb_lower, bb_mid, bb_upper, ema,
                        position_open, reason
                 FROM signals ORDER BY timestamp DESC LIMIT ?1",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![limit], |row| {
                let ts_str: String = row.get(0)?;
                let kind_str: String = row.get(1)?;
                let conversion = |col: usize, s: &str| {
                    rusqlite::Error::FromSqlConversionFailure(
                        col,
                        rusqlite::types::Type::Text,
                        format!("unparseable value: {s}").into(),
                    )
                };
                Ok(SignalRecord {
                    timestamp: parse_ts(&ts_str).ok_or_else(|| conversion(0, &ts_str))?,
                    kind: SignalKind::parse(&kind_str)
                        .ok_or_else(|| conversion(1, &kind_str))?,
                    price: row.get(2)?,
                    rsi: row.get(3)?,
                    bb_lower: row.get(4)?,
                    bb_mid: row.get(5)?,
                    bb_upper: row.get(6)?,
                    ema: row.get(7)?,
                    position_open: row.get::<_, i64>(8)? != 0,
                    reason: row.get(9)?,
                })
            })
            .map_err(query_err)?;

        let mut signals = Vec::new();
        for row in rows {
            signals.push(row.map_err(query_err)?);
        }
        Ok(signals)
    }

    fn upsert_daily_metrics(&self, date: NaiveDate) -> Result<DailyMetrics, KestrelError> {
        let trades = self.trades_on(date)?;
        let metrics = DailyMetrics::from_trades(date, &trades);

        let conn = self.pool.get().map_err(pool_err)?;
        conn.execute(
            "INSERT OR REPLACE INTO daily_metrics (
                date, trades_total, trades_won, trades_lost, pnl_total_usd,
                avg_pnl_pct, win_rate, profit_factor, best_trade_usd, worst_trade_usd
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                date.format("%Y-%m-%d").to_string(),
                metrics.trades_total,
                metrics.trades_won,
                metrics.trades_lost,
                metrics.pnl_total_usd,
                metrics.avg_pnl_pct,
                metrics.win_rate,
                metrics.profit_factor,
                metrics.best_trade_usd,
                metrics.worst_trade_usd,
            ],
        )
        .map_err(query_err)?;

        Ok(metrics)
    }

    fn daily_metrics(&self, date: NaiveDate) -> Result<Option<DailyMetrics>, KestrelError> {
        let conn = self.pool.get().map_err(pool_err)?;

        conn.query_row(
            "SELECT trades_total, trades_won, trades_lost, pnl_total_usd, avg_pnl_pct,
                    win_rate, profit_factor, best_trade_usd, worst_trade_usd
             FROM daily_metrics WHERE date = ?1",
            params![date.format("%Y-%m-%d").to_string()],
            |row| {
                Ok(DailyMetrics {
                    date,
                    trades_total: row.get(0)?,
                    trades_won: row.get(1)?,
                    trades_lost: row.get(2)?,
                    pnl_total_usd: row.get(3)?,
                    avg_pnl_pct: row.get(4)?,
                    win_rate: row.get(5)?,
                    profit_factor: row.get(6)?,
                    best_trade_usd: row.get(7)?,
                    worst_trade_usd: row.get(8)?,
                })
            },
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(query_err(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::records::ExitReason;
    use chrono::TimeZone;

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }
        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }
    }

    struct SingleConnConfig {
        path: String,
    }

    impl ConfigPort for SingleConnConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            (section == "sqlite" && key == "path").then(|| self.path.clone())
        }
        fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
            if section == "sqlite" && key == "pool_size" {
                1
            } else {
                default
            }
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }
        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }
    }

    fn store() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize_schema().unwrap();
        store
    }

    fn ts(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, min, 0).unwrap()
    }

    fn make_trade(entry: DateTime<Utc>, exit: DateTime<Utc>, pnl_usd: f64) -> TradeRecord {
        TradeRecord {
            entry_ts: entry,
            exit_ts: exit,
            entry_price: 90_000.0,
            exit_price: 90_000.0 + pnl_usd * 100.0,
            quantity: 0.01,
            pnl_usd,
            pnl_pct: pnl_usd / 900.0,
            exit_reason: ExitReason::TakeProfit,
            high_water_mark: 91_000.0,
            entry_rsi: Some(31.5),
            duration_minutes: (exit - entry).num_minutes(),
            unreconciled: false,
        }
    }

    fn make_signal(timestamp: DateTime<Utc>, kind: SignalKind) -> SignalRecord {
        SignalRecord {
            timestamp,
            kind,
            price: 90_000.0,
            rsi: Some(31.5),
            bb_lower: Some(91_000.0),
            bb_mid: Some(92_000.0),
            bb_upper: Some(93_000.0),
            ema: Some(89_000.0),
            position_open: false,
            reason: "triple_filter entry".into(),
        }
    }

    #[test]
    fn from_config_missing_path() {
        let result = SqliteStore::from_config(&EmptyConfig);
        match result {
            Err(KestrelError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn load_state_creates_flat_default() {
        let store = store();
        let state = store.load_state().unwrap();
        assert!(!state.position_open);
        assert!((state.entry_price - 0.0).abs() < f64::EPSILON);
        assert_eq!(state.trades_today, 0);

        // Second load reads the row created by the first — stable.
        let again = store.load_state().unwrap();
        assert_eq!(again.position_open, state.position_open);
        assert_eq!(again.trades_today, state.trades_today);
    }

    #[test]
    fn save_state_round_trip() {
        let store = store();
        let mut state = store.load_state().unwrap();
        state.position_open = true;
        state.entry_price = 90_000.0;
        state.quantity = 0.01;
        state.high_water_mark = 91_000.0;
        state.entry_ts = Some(ts(10, 0));
        state.entry_rsi = Some(31.5);
        state.trades_today = 3;
        state.cumulative_pnl_pct_today = 1.25;
        state.last_update = ts(10, 5);

        store.save_state(&state).unwrap();
        let loaded = store.load_state().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn corrupt_state_row_falls_back_to_default() {
        let store = store();
        store.load_state().unwrap();

        let conn = store.pool.get().unwrap();
        conn.execute("UPDATE bot_state SET last_update = 'garbage' WHERE id = 1", [])
            .unwrap();
        drop(conn);

        let state = store.load_state().unwrap();
        assert!(!state.position_open);

        // The fallback was persisted; the row is healthy again.
        let again = store.load_state().unwrap();
        assert_eq!(again.position_open, state.position_open);
    }

    #[test]
    fn cold_start_on_single_connection_file_pool() {
        // load_state must create the default row without checking out a
        // second connection; with pool_size = 1 that would hang the pool.
        let dir = tempfile::TempDir::new().unwrap();
        let config = SingleConnConfig {
            path: dir.path().join("kestrel.db").display().to_string(),
        };
        let store = SqliteStore::from_config(&config).unwrap();
        store.initialize_schema().unwrap();

        let state = store.load_state().unwrap();
        assert!(!state.position_open);
        assert_eq!(store.load_state().unwrap(), state);
    }

    #[test]
    fn commit_open_persists_state_and_signal_together() {
        let store = store();
        let mut state = store.load_state().unwrap();
        state.position_open = true;
        state.entry_price = 90_000.0;
        state.quantity = 0.01;
        state.high_water_mark = 90_000.0;
        state.entry_ts = Some(ts(10, 0));
        state.last_update = ts(10, 0);

        store
            .commit_open(&state, &make_signal(ts(10, 0), SignalKind::Entry))
            .unwrap();

        assert_eq!(store.load_state().unwrap(), state);
        assert_eq!(store.recent_signals(10).unwrap().len(), 1);
    }

    #[test]
    fn commit_close_persists_trade_signal_and_state_together() {
        let store = store();
        let mut flat = store.load_state().unwrap();
        flat.trades_today = 1;
        flat.last_update = ts(10, 45);

        store
            .commit_close(
                &make_trade(ts(10, 0), ts(10, 45), 10.0),
                &make_signal(ts(10, 45), SignalKind::Exit),
                &flat,
            )
            .unwrap();

        assert_eq!(store.recent_trades(10, 0).unwrap().len(), 1);
        assert_eq!(store.recent_signals(10).unwrap().len(), 1);
        let loaded = store.load_state().unwrap();
        assert!(!loaded.position_open);
        assert_eq!(loaded.trades_today, 1);
    }

    #[test]
    fn duplicate_trade_is_ignored() {
        let store = store();
        let trade = make_trade(ts(10, 0), ts(10, 45), 10.0);

        store.record_trade(&trade).unwrap();
        store.record_trade(&trade).unwrap();

        let trades = store.recent_trades(10, 0).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0], trade);
    }

    #[test]
    fn recent_trades_newest_first_with_pagination() {
        let store = store();
        for i in 0..5 {
            store
                .record_trade(&make_trade(ts(9 + i, 0), ts(9 + i, 30), i as f64))
                .unwrap();
        }

        let page = store.recent_trades(2, 0).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].exit_ts, ts(13, 30));
        assert_eq!(page[1].exit_ts, ts(12, 30));

        let next = store.recent_trades(2, 2).unwrap();
        assert_eq!(next[0].exit_ts, ts(11, 30));
    }

    #[test]
    fn trades_since_is_oldest_first() {
        let store = store();
        for i in 0..4 {
            store
                .record_trade(&make_trade(ts(9 + i, 0), ts(9 + i, 30), 1.0))
                .unwrap();
        }

        let trades = store.trades_since(ts(10, 30)).unwrap();
        assert_eq!(trades.len(), 3);
        assert_eq!(trades[0].exit_ts, ts(10, 30));
        assert_eq!(trades[2].exit_ts, ts(12, 30));
    }

    #[test]
    fn signal_insert_or_replace_by_timestamp_kind() {
        let store = store();
        let mut signal = make_signal(ts(10, 0), SignalKind::Entry);
        store.record_signal(&signal).unwrap();

        signal.reason = "revised".into();
        store.record_signal(&signal).unwrap();

        let signals = store.recent_signals(10).unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].reason, "revised");

        // Same timestamp, different kind is a distinct row.
        store
            .record_signal(&make_signal(ts(10, 0), SignalKind::Exit))
            .unwrap();
        assert_eq!(store.recent_signals(10).unwrap().len(), 2);
    }

    #[test]
    fn daily_metrics_upsert_is_idempotent() {
        let store = store();
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        store.record_trade(&make_trade(ts(10, 0), ts(10, 30), 10.0)).unwrap();
        store.record_trade(&make_trade(ts(11, 0), ts(11, 30), -4.0)).unwrap();

        let first = store.upsert_daily_metrics(date).unwrap();
        let second = store.upsert_daily_metrics(date).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.trades_total, 2);
        assert_eq!(first.trades_won, 1);
        assert!((first.pnl_total_usd - 6.0).abs() < 1e-9);

        let stored = store.daily_metrics(date).unwrap().unwrap();
        assert_eq!(stored, first);
    }

    #[test]
    fn daily_metrics_missing_date_is_none() {
        let store = store();
        let date = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        assert!(store.daily_metrics(date).unwrap().is_none());
    }

    #[test]
    fn unreconciled_flag_round_trips() {
        let store = store();
        let mut trade = make_trade(ts(10, 0), ts(10, 45), -3.0);
        trade.unreconciled = true;
        store.record_trade(&trade).unwrap();

        let trades = store.recent_trades(1, 0).unwrap();
        assert!(trades[0].unreconciled);
    }
}
