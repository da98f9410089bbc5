//! Exchange access port trait.

use crate::domain::error::ExchangeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Fill report for an executed market order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderFill {
    pub fill_price: f64,
    pub quantity: f64,
}

/// Blocking exchange adapter with bounded timeouts. Retry/backoff is the
/// adapter's own concern; the state machine never retries internally.
pub trait ExchangePort {
    /// Free balance of the quote asset (e.g. USDT).
    fn free_balance(&self, asset: &str) -> Result<f64, ExchangeError>;

    fn place_market_order(&self, side: OrderSide, quantity: f64)
    -> Result<OrderFill, ExchangeError>;

    /// Round a raw quantity down to the exchange's lot precision.
    fn round_quantity(&self, quantity: f64) -> f64;

    /// Latest observed market price. Simulated venues mark fills to it;
    /// live venues ignore it.
    fn observe_price(&self, _price: f64) {}
}
