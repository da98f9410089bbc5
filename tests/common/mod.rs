#![allow(dead_code)]

use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use kestrel::domain::error::ExchangeError;
use kestrel::domain::snapshot::IndicatorSnapshot;
use kestrel::ports::exchange_port::{ExchangePort, OrderFill, OrderSide};

/// Scripted exchange double. Fills at a preset price and can be told to fail
/// balance checks or specific order sides.
pub struct MockExchange {
    balance: f64,
    fill_price: Mutex<f64>,
    balance_error: Option<String>,
    buy_error: Option<String>,
    sell_error: Option<String>,
    quantity_step: f64,
    pub orders: Mutex<Vec<(OrderSide, f64)>>,
}

impl MockExchange {
    pub fn new(balance: f64) -> Self {
        Self {
            balance,
            fill_price: Mutex::new(0.0),
            balance_error: None,
            buy_error: None,
            sell_error: None,
            quantity_step: 0.000_01,
            orders: Mutex::new(Vec::new()),
        }
    }

    pub fn with_balance_error(mut self, reason: &str) -> Self {
        self.balance_error = Some(reason.to_string());
        self
    }

    pub fn with_buy_error(mut self, reason: &str) -> Self {
        self.buy_error = Some(reason.to_string());
        self
    }

    pub fn with_sell_error(mut self, reason: &str) -> Self {
        self.sell_error = Some(reason.to_string());
        self
    }

    pub fn order_count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }
}

impl ExchangePort for MockExchange {
    fn free_balance(&self, _asset: &str) -> Result<f64, ExchangeError> {
        match &self.balance_error {
            Some(reason) => Err(ExchangeError::Network {
                reason: reason.clone(),
            }),
            None => Ok(self.balance),
        }
    }

    fn place_market_order(&self, side: OrderSide, quantity: f64) -> Result<OrderFill, ExchangeError> {
        self.orders.lock().unwrap().push((side, quantity));

        let error = match side {
            OrderSide::Buy => &self.buy_error,
            OrderSide::Sell => &self.sell_error,
        };
        if let Some(reason) = error {
            return Err(ExchangeError::Network {
                reason: reason.clone(),
            });
        }

        Ok(OrderFill {
            fill_price: *self.fill_price.lock().unwrap(),
            quantity,
        })
    }

    fn round_quantity(&self, quantity: f64) -> f64 {
        (quantity / self.quantity_step).floor() * self.quantity_step
    }

    fn observe_price(&self, price: f64) {
        *self.fill_price.lock().unwrap() = price;
    }
}

pub fn ts(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 10, minute, 0).unwrap()
}

/// Fully warmed snapshot with a triple-filter-friendly indicator layout.
pub fn snap(minute: u32, close: f64, rsi: f64, bb_lower: f64, ema: f64) -> IndicatorSnapshot {
    IndicatorSnapshot {
        timestamp: ts(minute),
        close,
        rsi: Some(rsi),
        bb_lower: Some(bb_lower),
        bb_mid: Some(bb_lower + 1_000.0),
        bb_upper: Some(bb_lower + 2_000.0),
        ema: Some(ema),
    }
}

/// Snapshot with no indicators yet.
pub fn warmup_snap(minute: u32, close: f64) -> IndicatorSnapshot {
    IndicatorSnapshot {
        timestamp: ts(minute),
        close,
        rsi: None,
        bb_lower: None,
        bb_mid: None,
        bb_upper: None,
        ema: None,
    }
}
