//! Deposit ledger
//!
//! Escrow accounting on top of the bank: stake moves between SP funding
//! accounts and module-held pools. The bank performs the actual transfers.

use crate::error::{Error, Result};
use crate::types::{Address, Coin};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Module-held escrow pools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pool {
    /// Deposits backing global virtual groups
    VirtualGroup,
    /// Stake of registered storage providers
    StorageProvider,
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pool::VirtualGroup => f.write_str("virtualgroup"),
            Pool::StorageProvider => f.write_str("sp"),
        }
    }
}

/// Token transfer primitives provided by the host ledger
pub trait Bank: Send + Sync {
    /// Move coins from an account into a module pool
    fn send_to_pool(&self, from: &Address, pool: Pool, coin: &Coin) -> Result<()>;

    /// Move coins from a module pool into an account
    fn send_from_pool(&self, pool: Pool, to: &Address, coin: &Coin) -> Result<()>;

    /// Current pool balance in a denomination
    fn pool_balance(&self, pool: Pool, denom: &str) -> u128;
}

/// Typed escrow operations over a [`Bank`]
#[derive(Clone)]
pub struct DepositLedger {
    bank: Arc<dyn Bank>,
}

impl DepositLedger {
    pub fn new(bank: Arc<dyn Bank>) -> Self {
        Self { bank }
    }

    /// Escrow a group deposit from an SP's funding account
    pub fn deposit(&self, funding: &Address, coin: &Coin) -> Result<()> {
        if coin.is_zero() {
            return Ok(());
        }
        self.bank.send_to_pool(funding, Pool::VirtualGroup, coin)?;
        debug!("Escrowed {} from {}", coin, funding);
        Ok(())
    }

    /// Release escrowed group deposit back to an SP's funding account
    pub fn withdraw(&self, funding: &Address, coin: &Coin) -> Result<()> {
        if coin.is_zero() {
            return Ok(());
        }
        self.bank.send_from_pool(Pool::VirtualGroup, funding, coin)?;
        debug!("Released {} to {}", coin, funding);
        Ok(())
    }

    /// Pay out SP stake held in the SP pool, either as a refund to the SP or
    /// as a forfeiture to governance
    pub fn transfer(&self, pool: Pool, to: &Address, coin: &Coin) -> Result<()> {
        if coin.is_zero() {
            return Ok(());
        }
        self.bank.send_from_pool(pool, to, coin)?;
        debug!("Transferred {} from {} pool to {}", coin, pool, to);
        Ok(())
    }

    pub fn pool_balance(&self, pool: Pool, denom: &str) -> u128 {
        self.bank.pool_balance(pool, denom)
    }
}

/// Compute the stake a primary may withdraw from a group.
///
/// A deposit below the required stake means accounting has already gone
/// wrong; processing stops rather than continuing on corrupt balances.
pub fn available_tokens(total_deposit: u128, required: u128) -> u128 {
    match total_deposit.checked_sub(required) {
        Some(available) => available,
        None => panic!(
            "the available tokens is negative when withdraw: deposit {}, required {}",
            total_deposit, required
        ),
    }
}

/// Reject coins in the wrong denomination
pub fn ensure_denom(expected: &str, coin: &Coin) -> Result<()> {
    if coin.denom != expected {
        return Err(Error::InvalidDenom {
            expected: expected.to_string(),
            got: coin.denom.clone(),
        });
    }
    Ok(())
}
