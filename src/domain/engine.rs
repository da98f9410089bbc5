//! Position state machine: FLAT ⇄ OPEN transitions and their persistence.
//!
//! One tick is strictly ordered: evaluate → resolve → persist. Transitions
//! are computed on a copy of the state and only committed to the caller's
//! state after every store write succeeded, so a failed tick leaves the
//! in-memory state untouched.

use tracing::{debug, info, warn};

use super::error::KestrelError;
use super::exit_rules::{RiskParams, resolve_exit};
use super::policy::{EntryPolicy, EntrySignal};
use super::records::{SignalKind, SignalRecord, TradeRecord};
use super::snapshot::IndicatorSnapshot;
use super::state::BotState;
use crate::ports::exchange_port::{ExchangePort, OrderSide};
use crate::ports::state_port::StatePort;

/// Strategy and sizing parameters for the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub entry_policy: EntryPolicy,
    pub risk: RiskParams,
    /// Fraction of the free quote balance committed per entry.
    pub position_size_fraction: f64,
    /// Exchange-imposed minimum notional for an order, in quote units.
    pub min_notional_usd: f64,
    /// Safety floor: no entry when the free balance is below this.
    pub balance_floor_usd: f64,
    /// Quote asset queried for the free balance.
    pub quote_asset: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            entry_policy: EntryPolicy::TripleFilter {
                rsi_threshold: 35.0,
            },
            risk: RiskParams::default(),
            position_size_fraction: 0.95,
            min_notional_usd: 10.0,
            balance_floor_usd: 15.0,
            quote_asset: "USDT".to_string(),
        }
    }
}

/// What a tick did, for the caller's logging.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Indicators still warming up; nothing evaluated.
    WarmingUp,
    /// Flat, no entry signal.
    NoSignal,
    /// Entry signal fired but a sizing precondition failed or the order was
    /// rejected; stays flat.
    EntrySkipped { reason: String },
    /// FLAT → OPEN.
    Opened { fill_price: f64, quantity: f64 },
    /// OPEN, no trigger, high-water mark unchanged.
    Holding,
    /// OPEN, no trigger, high-water mark advanced and persisted.
    MarkAdvanced { high_water_mark: f64 },
    /// OPEN → FLAT.
    Closed { trade: TradeRecord },
}

pub struct Engine<'a> {
    exchange: &'a dyn ExchangePort,
    store: &'a dyn StatePort,
    config: EngineConfig,
}

impl<'a> Engine<'a> {
    pub fn new(exchange: &'a dyn ExchangePort, store: &'a dyn StatePort, config: EngineConfig) -> Self {
        Engine {
            exchange,
            store,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Process one snapshot. On `Ok` the state reflects the committed
    /// transition; on `Err` no mutation happened.
    pub fn tick(
        &self,
        state: &mut BotState,
        snapshot: &IndicatorSnapshot,
    ) -> Result<TickOutcome, KestrelError> {
        if state.position_open {
            self.tick_open(state, snapshot)
        } else {
            self.tick_flat(state, snapshot)
        }
    }

    fn tick_flat(
        &self,
        state: &mut BotState,
        snapshot: &IndicatorSnapshot,
    ) -> Result<TickOutcome, KestrelError> {
        if !snapshot.warmed_up() {
            debug!(close = snapshot.close, "indicators warming up, skipping tick");
            return Ok(TickOutcome::WarmingUp);
        }

        match self.config.entry_policy.evaluate(snapshot, false) {
            EntrySignal::Hold => Ok(TickOutcome::NoSignal),
            EntrySignal::Open => self.try_enter(state, snapshot),
        }
    }

    fn try_enter(
        &self,
        state: &mut BotState,
        snapshot: &IndicatorSnapshot,
    ) -> Result<TickOutcome, KestrelError> {
        let price = snapshot.close;

        let balance = match self.exchange.free_balance(&self.config.quote_asset) {
            Ok(b) => b,
            Err(e) => {
                // Adapter failure during entry: abort with no state mutation.
                let reason = format!("balance check failed: {e}");
                warn!(%reason, "abandoning entry");
                self.store
                    .record_signal(&skip_signal(snapshot, state.position_open, &reason))?;
                return Ok(TickOutcome::EntrySkipped { reason });
            }
        };

        if balance < self.config.balance_floor_usd {
            let reason = format!(
                "free balance ${balance:.2} below safety floor ${:.2}",
                self.config.balance_floor_usd
            );
            warn!(%reason, "entry skipped");
            self.store
                .record_signal(&skip_signal(snapshot, state.position_open, &reason))?;
            return Ok(TickOutcome::EntrySkipped { reason });
        }

        let quantity = self
            .exchange
            .round_quantity(balance * self.config.position_size_fraction / price);
        let notional = quantity * price;

        if notional < self.config.min_notional_usd {
            let reason = format!(
                "notional ${notional:.2} below exchange minimum ${:.2}",
                self.config.min_notional_usd
            );
            warn!(%reason, "entry skipped");
            self.store
                .record_signal(&skip_signal(snapshot, state.position_open, &reason))?;
            return Ok(TickOutcome::EntrySkipped { reason });
        }

        let fill = match self.exchange.place_market_order(OrderSide::Buy, quantity) {
            Ok(fill) => fill,
            Err(e) => {
                warn!(error = %e, quantity, "entry order rejected");
                return Ok(TickOutcome::EntrySkipped {
                    reason: format!("entry order rejected: {e}"),
                });
            }
        };

        let mut next = state.clone();
        next.position_open = true;
        next.entry_price = fill.fill_price;
        next.quantity = fill.quantity;
        next.high_water_mark = fill.fill_price;
        next.entry_ts = Some(snapshot.timestamp);
        next.entry_rsi = snapshot.rsi;
        next.last_update = snapshot.timestamp;

        self.store.commit_open(
            &next,
            &SignalRecord {
                timestamp: snapshot.timestamp,
                kind: SignalKind::Entry,
                price,
                rsi: snapshot.rsi,
                bb_lower: snapshot.bb_lower,
                bb_mid: snapshot.bb_mid,
                bb_upper: snapshot.bb_upper,
                ema: snapshot.ema,
                position_open: true,
                reason: format!("{} entry", self.config.entry_policy.name()),
            },
        )?;

        info!(
            fill_price = fill.fill_price,
            quantity = fill.quantity,
            rsi = ?snapshot.rsi,
            "position opened"
        );

        *state = next;
        Ok(TickOutcome::Opened {
            fill_price: fill.fill_price,
            quantity: fill.quantity,
        })
    }

    fn tick_open(
        &self,
        state: &mut BotState,
        snapshot: &IndicatorSnapshot,
    ) -> Result<TickOutcome, KestrelError> {
        let price = snapshot.close;
        let decision = resolve_exit(
            state.entry_price,
            state.high_water_mark,
            price,
            &self.config.risk,
        );

        let Some(trigger) = decision.trigger else {
            if decision.high_water_mark > state.high_water_mark {
                let mut next = state.clone();
                next.high_water_mark = decision.high_water_mark;
                next.last_update = snapshot.timestamp;
                self.store.save_state(&next)?;
                debug!(high_water_mark = next.high_water_mark, "mark advanced");
                *state = next;
                return Ok(TickOutcome::MarkAdvanced {
                    high_water_mark: decision.high_water_mark,
                });
            }
            return Ok(TickOutcome::Holding);
        };

        // Liquidate. A failed sell is non-fatal: the round-trip is still
        // recorded at the observed price and flagged unreconciled.
        let (exit_price, unreconciled) = match self
            .exchange
            .place_market_order(OrderSide::Sell, state.quantity)
        {
            Ok(fill) => (fill.fill_price, false),
            Err(e) => {
                warn!(error = %e, "exit order failed, recording unreconciled close");
                (price, true)
            }
        };

        let pnl_pct = (exit_price - state.entry_price) / state.entry_price;
        let pnl_usd = state.notional() * pnl_pct;
        let entry_ts = state.entry_ts.unwrap_or(snapshot.timestamp);

        let trade = TradeRecord {
            entry_ts,
            exit_ts: snapshot.timestamp,
            entry_price: state.entry_price,
            exit_price,
            quantity: state.quantity,
            pnl_usd,
            pnl_pct,
            exit_reason: trigger,
            high_water_mark: decision.high_water_mark,
            entry_rsi: state.entry_rsi,
            duration_minutes: (snapshot.timestamp - entry_ts).num_minutes(),
            unreconciled,
        };

        let mut next = state.clone();
        next.high_water_mark = decision.high_water_mark;
        next.trades_today += 1;
        next.cumulative_pnl_pct_today += pnl_pct * 100.0;
        next.close_position(snapshot.timestamp);

        // One transaction: a partial write here would leave the state row
        // OPEN with the trade already ledgered, and the retry would record
        // the same round trip a second time.
        self.store.commit_close(
            &trade,
            &SignalRecord {
                timestamp: snapshot.timestamp,
                kind: SignalKind::Exit,
                price,
                rsi: snapshot.rsi,
                bb_lower: snapshot.bb_lower,
                bb_mid: snapshot.bb_mid,
                bb_upper: snapshot.bb_upper,
                ema: snapshot.ema,
                position_open: false,
                reason: trigger.as_str().to_string(),
            },
            &next,
        )?;

        info!(
            exit_reason = trigger.as_str(),
            exit_price,
            pnl_pct = pnl_pct * 100.0,
            pnl_usd,
            unreconciled,
            "position closed"
        );

        *state = next;
        Ok(TickOutcome::Closed { trade })
    }
}

fn skip_signal(snapshot: &IndicatorSnapshot, position_open: bool, reason: &str) -> SignalRecord {
    SignalRecord {
        timestamp: snapshot.timestamp,
        kind: SignalKind::Skipped,
        price: snapshot.close,
        rsi: snapshot.rsi,
        bb_lower: snapshot.bb_lower,
        bb_mid: snapshot.bb_mid,
        bb_upper: snapshot.bb_upper,
        ema: snapshot.ema,
        position_open,
        reason: reason.to_string(),
    }
}
