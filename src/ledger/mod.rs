//! Deposit and statistics ledgers

pub mod deposit;
pub mod statistics;

pub use deposit::{available_tokens, ensure_denom, Bank, DepositLedger, Pool};
pub use statistics::StatisticsLedger;
