//! Single-threaded tick loop.
//!
//! Pulls one snapshot per interval, hands it to the state machine, and
//! absorbs failures with a cooldown instead of exiting. A calendar-day
//! rollover between ticks finalizes the previous day's metrics row and
//! resets the per-day counters before the new day's first evaluation.

use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::domain::engine::{Engine, TickOutcome};
use crate::domain::error::KestrelError;
use crate::domain::snapshot::IndicatorSnapshot;
use crate::domain::state::BotState;
use crate::ports::config_port::ConfigPort;
use crate::ports::exchange_port::ExchangePort;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::state_port::StatePort;

const DEFAULT_INTERVAL_SECS: u64 = 60;
const DEFAULT_ERROR_COOLDOWN_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Pause between ticks. Zero means replay as fast as possible.
    pub interval: Duration,
    /// Pause after a failed tick before trying again.
    pub error_cooldown: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            error_cooldown: Duration::from_secs(DEFAULT_ERROR_COOLDOWN_SECS),
        }
    }
}

impl RunnerConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        RunnerConfig {
            interval: Duration::from_secs(
                config.get_int("runner", "interval_secs", DEFAULT_INTERVAL_SECS as i64) as u64,
            ),
            error_cooldown: Duration::from_secs(config.get_int(
                "runner",
                "error_cooldown_secs",
                DEFAULT_ERROR_COOLDOWN_SECS as i64,
            ) as u64),
        }
    }
}

pub struct Runner<'a> {
    engine: Engine<'a>,
    exchange: &'a dyn ExchangePort,
    store: &'a dyn StatePort,
    config: RunnerConfig,
}

impl<'a> Runner<'a> {
    pub fn new(
        engine: Engine<'a>,
        exchange: &'a dyn ExchangePort,
        store: &'a dyn StatePort,
        config: RunnerConfig,
    ) -> Self {
        Runner {
            engine,
            exchange,
            store,
            config,
        }
    }

    /// Run until the feed is exhausted. Tick failures are logged and waited
    /// out; only a failure to load the initial state is fatal.
    pub fn run(&self, feed: &mut dyn MarketDataPort) -> Result<(), KestrelError> {
        let mut state = self.store.load_state()?;
        info!(
            position_open = state.position_open,
            trades_today = state.trades_today,
            "state loaded, entering tick loop"
        );

        loop {
            let snapshot = match feed.next_snapshot() {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => {
                    info!("feed exhausted, stopping");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "snapshot fetch failed, cooling down");
                    thread::sleep(self.config.error_cooldown);
                    continue;
                }
            };

            if let Err(e) = self.rollover_if_needed(&mut state, snapshot.timestamp) {
                warn!(error = %e, "daily rollover failed, retrying next tick");
                thread::sleep(self.config.error_cooldown);
                continue;
            }

            self.exchange.observe_price(snapshot.close);

            match self.engine.tick(&mut state, &snapshot) {
                Ok(outcome) => log_outcome(&snapshot, &outcome),
                Err(e) => {
                    error!(error = %e, "tick failed, cooling down");
                    // Re-sync with the store so the retry follows the same
                    // path a restart would.
                    match self.store.load_state() {
                        Ok(reloaded) => state = reloaded,
                        Err(load_err) => {
                            warn!(error = %load_err, "state reload failed, keeping in-memory state");
                        }
                    }
                    thread::sleep(self.config.error_cooldown);
                    continue;
                }
            }

            if !self.config.interval.is_zero() {
                thread::sleep(self.config.interval);
            }
        }

        // Finalize the metrics row for the last day seen.
        self.store
            .upsert_daily_metrics(state.last_update.date_naive())?;
        Ok(())
    }

    fn rollover_if_needed(
        &self,
        state: &mut BotState,
        now: DateTime<Utc>,
    ) -> Result<(), KestrelError> {
        let previous_day = state.last_update.date_naive();
        if now.date_naive() <= previous_day {
            return Ok(());
        }

        let metrics = self.store.upsert_daily_metrics(previous_day)?;
        info!(
            date = %previous_day,
            trades = metrics.trades_total,
            pnl_usd = metrics.pnl_total_usd,
            "day closed"
        );

        let mut next = state.clone();
        next.reset_daily_counters(now);
        self.store.save_state(&next)?;
        *state = next;
        Ok(())
    }
}

fn log_outcome(snapshot: &IndicatorSnapshot, outcome: &TickOutcome) {
    match outcome {
        TickOutcome::WarmingUp => debug!(close = snapshot.close, "warming up"),
        TickOutcome::NoSignal => debug!(close = snapshot.close, "no entry signal"),
        TickOutcome::EntrySkipped { reason } => info!(%reason, "entry skipped"),
        TickOutcome::Opened {
            fill_price,
            quantity,
        } => info!(fill_price, quantity, "opened"),
        TickOutcome::Holding => debug!(close = snapshot.close, "holding"),
        TickOutcome::MarkAdvanced { high_water_mark } => {
            debug!(high_water_mark, "mark advanced")
        }
        TickOutcome::Closed { trade } => info!(
            exit_reason = trade.exit_reason.as_str(),
            pnl_usd = trade.pnl_usd,
            "closed"
        ),
    }
}
