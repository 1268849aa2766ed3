//! Request handlers
//!
//! The [`Keeper`] validates a request, loads records from the group store,
//! mutates copies, moves tokens through the deposit ledger and commits every
//! record write of the request in one batch. Each handler returns the events
//! of the committed transition.

pub mod events;
pub mod gates;
pub mod msg;

mod exit;
mod group_ops;
mod params;
mod settle;
mod swap;

#[cfg(test)]
pub(crate) mod testkit;

use crate::error::{Error, Result};
use crate::group::GroupStore;
use crate::ledger::{Bank, DepositLedger, Pool};
use crate::policy::StoragePolicy;
use crate::provider::ProviderRegistry;
use crate::types::Address;
use std::sync::Arc;
use tracing::{error, info};

pub use events::{Event, Receipt};
pub use gates::{FeatureGates, Upgrade, UpgradeSet};
pub use msg::*;
pub use settle::PaymentDistributor;

/// Per-request execution context supplied by the host
#[derive(Clone, Copy)]
pub struct Context<'a> {
    /// Block time in unix seconds
    pub block_time: i64,
    pub gates: &'a dyn FeatureGates,
}

impl<'a> Context<'a> {
    pub fn new(block_time: i64, gates: &'a dyn FeatureGates) -> Self {
        Self { block_time, gates }
    }

    pub fn is_active(&self, upgrade: Upgrade) -> bool {
        self.gates.is_active(upgrade)
    }
}

/// Collaborators owned by other subsystems
#[derive(Clone)]
pub struct Collaborators {
    pub providers: Arc<dyn ProviderRegistry>,
    pub bank: Arc<dyn Bank>,
    pub policy: Arc<dyn StoragePolicy>,
    pub payments: Arc<dyn PaymentDistributor>,
}

/// Recorded group deposits against the escrow pool balance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscrowAudit {
    /// Sum of `total_deposit` over all groups
    pub recorded: u128,
    /// Balance of the group deposit pool
    pub pool_balance: u128,
}

impl EscrowAudit {
    pub fn is_balanced(&self) -> bool {
        self.recorded == self.pool_balance
    }
}

/// Finish a request whose tokens have already moved: run `commit`, and when
/// it fails run `revert` to move the tokens back before returning the commit
/// error.
fn commit_or_revert(
    commit: impl FnOnce() -> Result<()>,
    revert: impl FnOnce() -> Result<()>,
) -> Result<()> {
    if let Err(e) = commit() {
        if let Err(revert_err) = revert() {
            error!("Reverting token movement after failed commit: {}", revert_err);
        }
        return Err(e);
    }
    Ok(())
}

/// Virtual group keeper
pub struct Keeper {
    store: GroupStore,
    /// Governance signer for params and forced exits
    authority: Address,
    /// Recipient of stake forfeited by forced exits
    governance_address: Address,
    providers: Arc<dyn ProviderRegistry>,
    ledger: DepositLedger,
    policy: Arc<dyn StoragePolicy>,
    payments: Arc<dyn PaymentDistributor>,
}

impl Keeper {
    pub fn new(
        store: GroupStore,
        authority: Address,
        governance_address: Address,
        collaborators: Collaborators,
    ) -> Self {
        info!("Keeper ready, authority {}", authority);
        Self {
            store,
            authority,
            governance_address,
            providers: collaborators.providers,
            ledger: DepositLedger::new(collaborators.bank),
            policy: collaborators.policy,
            payments: collaborators.payments,
        }
    }

    pub fn store(&self) -> &GroupStore {
        &self.store
    }

    pub fn authority(&self) -> &Address {
        &self.authority
    }

    /// Compare recorded group deposits with the escrow pool
    pub fn audit_escrow(&self) -> Result<EscrowAudit> {
        let denom = self.store.params()?.deposit_denom;
        let recorded = self
            .store
            .gvgs()?
            .iter()
            .try_fold(0u128, |sum, gvg| sum.checked_add(gvg.total_deposit))
            .ok_or_else(|| Error::Internal("recorded deposits overflow".to_string()))?;
        Ok(EscrowAudit {
            recorded,
            pool_balance: self.ledger.pool_balance(Pool::VirtualGroup, &denom),
        })
    }

    fn ensure_authority(&self, got: &Address) -> Result<()> {
        if *got != self.authority {
            return Err(Error::InvalidAuthority {
                expected: self.authority.to_string(),
                got: got.to_string(),
            });
        }
        Ok(())
    }
}
