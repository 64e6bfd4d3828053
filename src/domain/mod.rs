//! Core ledger types and logic.

pub mod account;
pub mod bar;
pub mod error;
pub mod order;
pub mod position;
