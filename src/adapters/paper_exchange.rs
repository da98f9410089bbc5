//! Simulated exchange adapter.
//!
//! Fills market orders instantly at the current mark price against a local
//! quote balance. The runner refreshes the mark price from each snapshot
//! before handing it to the engine.

use std::sync::Mutex;

use tracing::warn;

use crate::domain::error::ExchangeError;
use crate::ports::config_port::ConfigPort;
use crate::ports::exchange_port::{ExchangePort, OrderFill, OrderSide};

const DEFAULT_STARTING_BALANCE_USD: f64 = 1_000.0;
const DEFAULT_QUANTITY_STEP: f64 = 0.000_01;

#[derive(Debug)]
struct Book {
    quote_balance: f64,
    base_balance: f64,
    mark_price: Option<f64>,
}

pub struct PaperExchange {
    book: Mutex<Book>,
    quantity_step: f64,
}

impl PaperExchange {
    pub fn new(starting_balance_usd: f64, quantity_step: f64) -> Self {
        Self {
            book: Mutex::new(Book {
                quote_balance: starting_balance_usd,
                base_balance: 0.0,
                mark_price: None,
            }),
            quantity_step,
        }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Self {
        Self::new(
            config.get_double("paper", "starting_balance_usd", DEFAULT_STARTING_BALANCE_USD),
            config.get_double("paper", "quantity_step", DEFAULT_QUANTITY_STEP),
        )
    }

    /// Update the price at which subsequent market orders fill.
    pub fn set_mark_price(&self, price: f64) -> Result<(), ExchangeError> {
        self.lock()?.mark_price = Some(price);
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Book>, ExchangeError> {
        self.book.lock().map_err(|_| ExchangeError::Exchange {
            reason: "paper exchange book lock poisoned".into(),
        })
    }
}

impl ExchangePort for PaperExchange {
    fn free_balance(&self, _asset: &str) -> Result<f64, ExchangeError> {
        Ok(self.lock()?.quote_balance)
    }

    fn place_market_order(&self, side: OrderSide, quantity: f64) -> Result<OrderFill, ExchangeError> {
        if quantity <= 0.0 {
            return Err(ExchangeError::InvalidOrder {
                reason: format!("non-positive quantity {quantity}"),
            });
        }

        let mut book = self.lock()?;
        let price = book.mark_price.ok_or_else(|| ExchangeError::Exchange {
            reason: "no mark price set".into(),
        })?;
        let notional = quantity * price;

        match side {
            OrderSide::Buy => {
                if notional > book.quote_balance {
                    return Err(ExchangeError::InsufficientFunds {
                        reason: format!(
                            "order notional ${notional:.2} exceeds free balance ${:.2}",
                            book.quote_balance
                        ),
                    });
                }
                book.quote_balance -= notional;
                book.base_balance += quantity;
            }
            OrderSide::Sell => {
                if quantity > book.base_balance + f64::EPSILON {
                    return Err(ExchangeError::InsufficientFunds {
                        reason: format!(
                            "sell quantity {quantity} exceeds held {}",
                            book.base_balance
                        ),
                    });
                }
                book.base_balance -= quantity;
                book.quote_balance += notional;
            }
        }

        Ok(OrderFill {
            fill_price: price,
            quantity,
        })
    }

    fn round_quantity(&self, quantity: f64) -> f64 {
        if self.quantity_step <= 0.0 {
            return quantity;
        }
        (quantity / self.quantity_step).floor() * self.quantity_step
    }

    fn observe_price(&self, price: f64) {
        if let Err(e) = self.set_mark_price(price) {
            warn!(error = %e, "mark price update dropped");
        }
    }
}
