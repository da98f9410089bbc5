//! kestrel — single-instrument position lifecycle engine with a persistent
//! performance ledger.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in
//! [`ports`], concrete implementations in [`adapters`]. The [`runner`] drives
//! the tick loop; [`cli`] wires everything together.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
pub mod runner;
