//! Concrete adapters behind the port traits.

pub mod csv_snapshot_feed;
pub mod file_config_adapter;
pub mod paper_exchange;
pub mod sqlite_store;
