//! Exit coordinator
//!
//! SP lifecycle: `IN_SERVICE -> GRACEFUL_EXITING -> EXITED` for voluntary
//! exits, and `any -> FORCED_EXITING -> EXITED` when governance removes an
//! SP. Only a bounded number of SPs may be exiting at once.

use super::events::{Event, Receipt};
use super::gates::Upgrade;
use super::msg::{MsgCompleteStorageProviderExit, MsgStorageProviderExit, MsgStorageProviderForcedExit};
use super::{Context, Keeper};
use crate::error::{Error, Result};
use crate::ledger::Pool;
use crate::provider::{ProviderStatus, ResolvedIdentity};
use crate::types::Coin;
use tracing::{info, warn};

impl Keeper {
    /// Fail when the exiting population already meets the concurrency cap.
    ///
    /// Read-then-write: the count is taken before the caller's status write,
    /// so requests must be serialized by the host.
    fn ensure_exit_capacity(&self) -> Result<()> {
        let limit = self.store.params()?.sp_concurrent_exit_num;
        let exiting = self
            .providers
            .providers()
            .iter()
            .filter(|sp| sp.status.is_exiting())
            .count() as u32;
        if exiting >= limit {
            warn!("{} SPs exiting, cap is {}", exiting, limit);
            return Err(Error::ExitConcurrencyExceeded { exiting, limit });
        }
        Ok(())
    }

    /// Begin a voluntary exit
    pub fn storage_provider_exit(
        &self,
        ctx: &Context<'_>,
        msg: MsgStorageProviderExit,
    ) -> Result<Receipt> {
        let mut sp =
            ResolvedIdentity::operator(self.providers.as_ref(), &msg.storage_provider)?.provider;
        if sp.status != ProviderStatus::InService {
            return Err(Error::ExitFailed {
                sp_id: sp.id,
                reason: format!("not in service, status: {}", sp.status),
            });
        }

        if ctx.is_active(Upgrade::ExitAdmission) {
            if let Some(stat) = self.store.get_statistics(sp.id)? {
                if stat.break_redundancy_reqmt_gvg_count != 0 {
                    warn!(
                        "SP {} cannot exit with {} under-replicated groups",
                        sp.id, stat.break_redundancy_reqmt_gvg_count
                    );
                    return Err(Error::RedundancyBroken {
                        sp_id: sp.id,
                        count: stat.break_redundancy_reqmt_gvg_count,
                    });
                }
            }
            self.ensure_exit_capacity()?;
        }

        sp.status = ProviderStatus::GracefulExiting;
        self.providers.set_provider(sp.clone());

        info!("SP {} is gracefully exiting", sp.id);
        Ok(Receipt::single(Event::StorageProviderExit {
            storage_provider_id: sp.id,
            operator_address: sp.operator_address,
        }))
    }

    /// Put an SP into forced exit, whatever its status
    pub fn storage_provider_forced_exit(&self, msg: MsgStorageProviderForcedExit) -> Result<Receipt> {
        self.ensure_authority(&msg.authority)?;
        let mut sp =
            ResolvedIdentity::operator(self.providers.as_ref(), &msg.storage_provider)?.provider;
        self.ensure_exit_capacity()?;

        let previous = sp.status;
        sp.status = ProviderStatus::ForcedExiting;
        self.providers.set_provider(sp.clone());

        info!("SP {} forced to exit (was {})", sp.id, previous);
        Ok(Receipt::single(Event::StorageProviderForcedExit {
            storage_provider_id: sp.id,
        }))
    }

    /// Finish an exit once the SP has handed off everything.
    ///
    /// A graceful exit refunds the SP's stake to its funding account; a
    /// forced exit forfeits it to the governance account.
    pub fn complete_storage_provider_exit(
        &self,
        ctx: &Context<'_>,
        msg: MsgCompleteStorageProviderExit,
    ) -> Result<Receipt> {
        let sp =
            ResolvedIdentity::operator(self.providers.as_ref(), &msg.storage_provider)?.provider;
        if !sp.status.is_exiting() {
            return Err(Error::ExitFailed {
                sp_id: sp.id,
                reason: format!(
                    "operator {} is not in the process of exiting, status: {}",
                    sp.operator_address, sp.status
                ),
            });
        }
        if !self.providers.exitable(sp.id) {
            return Err(Error::NotExitable(sp.id));
        }

        let forced = sp.status == ProviderStatus::ForcedExiting;
        let recipient = if forced {
            self.governance_address
        } else {
            sp.funding_address
        };
        let stake = Coin::new(self.providers.deposit_denom(), sp.total_deposit);

        // Stake moves only once the registry has accepted the exit
        self.providers.exit(&sp).map_err(|reason| Error::ExitFailed {
            sp_id: sp.id,
            reason,
        })?;
        if let Err(e) = self.ledger.transfer(Pool::StorageProvider, &recipient, &stake) {
            warn!("Paying out stake of SP {} failed, restoring its record: {}", sp.id, e);
            self.providers.set_provider(sp);
            return Err(e);
        }

        if forced {
            info!("SP {} exited, stake {} forfeited to {}", sp.id, stake, recipient);
        } else {
            info!("SP {} exited, stake {} refunded", sp.id, stake);
        }

        let event = if ctx.is_active(Upgrade::ExitAdmission) {
            Event::CompleteStorageProviderExit {
                storage_provider_id: sp.id,
                operator_address: msg.operator,
                storage_provider_address: Some(sp.operator_address),
                total_deposit: sp.total_deposit,
                forced_exit: Some(forced),
            }
        } else {
            Event::CompleteStorageProviderExit {
                storage_provider_id: sp.id,
                operator_address: sp.operator_address,
                storage_provider_address: None,
                total_deposit: sp.total_deposit,
                forced_exit: None,
            }
        };
        Ok(Receipt::single(event))
    }
}
