//! quantledger — single-account trading ledger for backtesting.
//!
//! Hexagonal architecture: ledger logic in [`domain`], port traits in
//! [`ports`], concrete implementations in [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
