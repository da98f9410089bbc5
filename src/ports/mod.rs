//! Port traits for external collaborators.

pub mod config_port;
pub mod exchange_port;
pub mod market_data_port;
pub mod state_port;
