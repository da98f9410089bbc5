//! Core domain types and logic.

pub mod engine;
pub mod error;
pub mod exit_rules;
pub mod policy;
pub mod records;
pub mod report;
pub mod snapshot;
pub mod state;
