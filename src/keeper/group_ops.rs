//! Group lifecycle: create, delete, deposit, withdraw

use super::events::{Event, Receipt};
use super::gates::Upgrade;
use super::msg::{MsgCreateGlobalVirtualGroup, MsgDeleteGlobalVirtualGroup, MsgDeposit, MsgWithdraw};
use super::{commit_or_revert, Context, Keeper};
use crate::error::{Error, Result};
use crate::group::{Batch, FamilyManager, GlobalVirtualGroup, SwapScope};
use crate::ledger::{available_tokens, ensure_denom, StatisticsLedger};
use crate::provider::ResolvedIdentity;
use crate::types::Coin;
use std::collections::HashSet;
use tracing::info;

impl Keeper {
    /// Create a group owned by the calling SP, allocating a family when none
    /// is named
    pub fn create_global_virtual_group(
        &self,
        ctx: &Context<'_>,
        msg: MsgCreateGlobalVirtualGroup,
    ) -> Result<Receipt> {
        if ctx.is_active(Upgrade::ValidatedSecondaries) {
            let expected = self.policy.expected_secondary_count(ctx.block_time);
            if msg.secondary_sp_ids.len() != expected {
                return Err(Error::InvalidSecondarySpCount {
                    expected,
                    got: msg.secondary_sp_ids.len(),
                });
            }
            let mut seen = HashSet::with_capacity(msg.secondary_sp_ids.len());
            for id in &msg.secondary_sp_ids {
                if !seen.insert(*id) {
                    return Err(Error::DuplicateSecondarySp(*id));
                }
            }
        }

        let sp = ResolvedIdentity::operator(self.providers.as_ref(), &msg.storage_provider)?.provider;
        if !sp.status.is_serving() {
            return Err(Error::ProviderNotInService {
                sp_id: sp.id,
                status: sp.status.to_string(),
            });
        }

        let params = self.store.params()?;
        ensure_denom(&params.deposit_denom, &msg.deposit)?;

        for id in &msg.secondary_sp_ids {
            let secondary = self
                .providers
                .provider(*id)
                .ok_or_else(|| Error::ProviderNotFound(format!("secondary SP {}", id)))?;
            if !secondary.status.is_serving() {
                return Err(Error::ProviderNotInService {
                    sp_id: secondary.id,
                    status: secondary.status.to_string(),
                });
            }
        }

        let mut batch = Batch::new();
        let families = FamilyManager::new(&self.store);
        let resolved = families.get_or_create_empty(msg.family_id, sp.id, &mut batch)?;
        let mut family = resolved.family;

        if ctx.is_active(Upgrade::UniqueTopology) {
            for gvg_id in &family.global_virtual_group_ids {
                let existing = self.store.gvg_required(*gvg_id)?;
                if existing.secondary_sp_ids == msg.secondary_sp_ids {
                    return Err(Error::DuplicateGvg {
                        family_id: family.id,
                    });
                }
            }
        }

        let gvg_id = self.store.next_gvg_id(&mut batch)?;
        families.attach(
            &mut family,
            gvg_id,
            params.max_global_virtual_group_num_per_family,
        )?;

        let gvg = GlobalVirtualGroup::new(
            gvg_id,
            family.id,
            sp.id,
            msg.secondary_sp_ids,
            msg.deposit.amount,
        );

        let mut stats = StatisticsLedger::new(&self.store);
        stats.add_group(&gvg)?;
        stats.stage_into(&mut batch)?;
        batch.put_gvg(&gvg)?;
        batch.put_family(&family)?;

        self.ledger.deposit(&sp.funding_address, &msg.deposit)?;
        commit_or_revert(
            || self.store.commit(batch),
            || self.ledger.withdraw(&sp.funding_address, &msg.deposit),
        )?;

        info!(
            "Created gvg {} in family {} (primary {}, secondaries {:?}, deposit {})",
            gvg.id, family.id, sp.id, gvg.secondary_sp_ids, msg.deposit
        );

        let mut receipt = Receipt::single(Event::gvg_created(&gvg));
        if resolved.created {
            receipt.push(Event::family_created(&family));
        }
        Ok(receipt)
    }

    /// Delete an empty group, refunding its deposit to the primary
    pub fn delete_global_virtual_group(&self, msg: MsgDeleteGlobalVirtualGroup) -> Result<Receipt> {
        let sp = ResolvedIdentity::operator(self.providers.as_ref(), &msg.storage_provider)?.provider;
        let gvg = self.store.gvg_required(msg.global_virtual_group_id)?;
        if gvg.primary_sp_id != sp.id {
            return Err(Error::Unauthorized(format!(
                "SP {} is not the primary of gvg {}",
                sp.id, gvg.id
            )));
        }
        if gvg.stored_size != 0 {
            return Err(Error::GvgNotEmpty {
                id: gvg.id,
                stored_size: gvg.stored_size,
            });
        }

        self.settle_gvg_with(&gvg)?;

        let params = self.store.params()?;
        let mut family = self.store.family_required(gvg.family_id)?;
        let mut batch = Batch::new();

        let mut stats = StatisticsLedger::new(&self.store);
        stats.remove_group(&gvg)?;
        stats.stage_into(&mut batch)?;

        batch.delete_gvg(gvg.id);
        batch.delete_swap_out(SwapScope::Group(gvg.id));
        batch.delete_swap_in(SwapScope::Group(gvg.id));

        family.remove_gvg(gvg.id);
        let family_emptied = family.is_empty();
        if family_emptied {
            batch.delete_family(family.id);
            batch.delete_swap_out(SwapScope::Family(family.id));
            batch.delete_swap_in(SwapScope::Family(family.id));
        } else {
            batch.put_family(&family)?;
        }

        let refund = Coin::new(params.deposit_denom, gvg.total_deposit);
        self.ledger.withdraw(&sp.funding_address, &refund)?;
        commit_or_revert(
            || self.store.commit(batch),
            || self.ledger.deposit(&sp.funding_address, &refund),
        )?;

        info!(
            "Deleted gvg {} of SP {}, refunded {}",
            gvg.id, sp.id, gvg.total_deposit
        );

        let mut receipt = Receipt::single(Event::DeleteGlobalVirtualGroup {
            id: gvg.id,
            primary_sp_id: sp.id,
        });
        if family_emptied {
            info!("Deleted empty family {}", family.id);
            receipt.push(Event::DeleteGlobalVirtualGroupFamily {
                id: family.id,
                primary_sp_id: family.primary_sp_id,
            });
        }
        Ok(receipt)
    }

    /// Add stake to a group from the caller's funding account
    pub fn deposit(&self, msg: MsgDeposit) -> Result<Receipt> {
        let caller = ResolvedIdentity::operator_or_funding(self.providers.as_ref(), &msg.storage_provider)?;
        let sp = &caller.provider;
        let mut gvg = self.store.gvg_required(msg.global_virtual_group_id)?;

        let params = self.store.params()?;
        ensure_denom(&params.deposit_denom, &msg.deposit)?;

        gvg.total_deposit = gvg
            .total_deposit
            .checked_add(msg.deposit.amount)
            .ok_or_else(|| Error::Internal(format!("deposit of gvg {} overflows", gvg.id)))?;

        let mut batch = Batch::new();
        batch.put_gvg(&gvg)?;
        self.ledger.deposit(&sp.funding_address, &msg.deposit)?;
        commit_or_revert(
            || self.store.commit(batch),
            || self.ledger.withdraw(&sp.funding_address, &msg.deposit),
        )?;

        info!(
            "SP {} deposited {} into gvg {} via its {} address, total {}",
            sp.id, msg.deposit, gvg.id, caller.role, gvg.total_deposit
        );
        Ok(Receipt::single(Event::gvg_updated(&gvg)))
    }

    /// Release stake above the group's required minimum to its primary.
    ///
    /// # Panics
    ///
    /// Panics when the recorded deposit is below the required stake.
    pub fn withdraw(&self, msg: MsgWithdraw) -> Result<Receipt> {
        let caller = ResolvedIdentity::operator_or_funding(self.providers.as_ref(), &msg.storage_provider)?;
        let sp = &caller.provider;
        let mut gvg = self.store.gvg_required(msg.global_virtual_group_id)?;
        if gvg.primary_sp_id != sp.id {
            return Err(Error::Unauthorized(format!(
                "withdrawer SP {} is not the primary SP {} of gvg {}",
                sp.id, gvg.primary_sp_id, gvg.id
            )));
        }

        let params = self.store.params()?;
        ensure_denom(&params.deposit_denom, &msg.withdraw)?;

        let required = self.policy.required_stake(&gvg, &params);
        let available = available_tokens(gvg.total_deposit, required);
        let amount = if msg.withdraw.is_zero() {
            available
        } else if msg.withdraw.amount > available {
            return Err(Error::WithdrawAmountTooLarge {
                requested: msg.withdraw.amount,
                available,
            });
        } else {
            msg.withdraw.amount
        };

        // amount <= available <= total_deposit
        gvg.total_deposit -= amount;

        let mut batch = Batch::new();
        batch.put_gvg(&gvg)?;
        let released = Coin::new(params.deposit_denom, amount);
        self.ledger.withdraw(&sp.funding_address, &released)?;
        commit_or_revert(
            || self.store.commit(batch),
            || self.ledger.deposit(&sp.funding_address, &released),
        )?;

        info!(
            "SP {} withdrew {} from gvg {} via its {} address, total {}",
            sp.id, amount, gvg.id, caller.role, gvg.total_deposit
        );
        Ok(Receipt::single(Event::gvg_updated(&gvg)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::NO_SPECIFIED_FAMILY_ID;
    use crate::keeper::gates::UpgradeSet;
    use crate::keeper::testkit::{Harness, DENOM};

    fn create_msg(h: &Harness, primary: u32, family_id: u32, secondaries: &[u32]) -> MsgCreateGlobalVirtualGroup {
        MsgCreateGlobalVirtualGroup {
            storage_provider: h.operator(primary),
            family_id,
            secondary_sp_ids: secondaries.to_vec(),
            deposit: Coin::new(DENOM, 100),
        }
    }

    #[test]
    fn test_create_allocates_family_and_counts() {
        let h = Harness::new();
        let receipt = h
            .keeper
            .create_global_virtual_group(&h.ctx(), create_msg(&h, 1, NO_SPECIFIED_FAMILY_ID, &[2, 3, 4]))
            .unwrap();

        assert_eq!(receipt.events.len(), 2);
        assert!(matches!(receipt.events[0], Event::CreateGlobalVirtualGroup { id: 1, family_id: 1, .. }));
        assert!(matches!(receipt.events[1], Event::CreateGlobalVirtualGroupFamily { id: 1, primary_sp_id: 1, .. }));

        assert_eq!(h.stat(1).primary_count, 1);
        for sp in [2, 3, 4] {
            assert_eq!(h.stat(sp).secondary_count, 1);
        }
        assert_eq!(h.bank.balance(&h.funding(1), DENOM), h.initial_balance() - 100);
        assert!(h.keeper.audit_escrow().unwrap().is_balanced());
    }

    #[test]
    fn test_create_in_existing_family_emits_no_family_event() {
        let h = Harness::new();
        let (_, family_id) = h.create_gvg(1, NO_SPECIFIED_FAMILY_ID, &[2, 3, 4], 0);

        let receipt = h
            .keeper
            .create_global_virtual_group(&h.ctx(), create_msg(&h, 1, family_id, &[5, 6, 7]))
            .unwrap();
        assert_eq!(receipt.events.len(), 1);
        assert_eq!(h.keeper.store().family_required(family_id).unwrap().len(), 2);
    }

    #[test]
    fn test_secondary_counter_sum_matches_groups() {
        let h = Harness::new();
        let topologies: [&[u32]; 4] = [&[2, 3, 4], &[3, 4, 5], &[4, 5, 6], &[2, 5, 7]];
        for secondaries in topologies {
            h.create_gvg(1, NO_SPECIFIED_FAMILY_ID, secondaries, 0);
        }

        let stats = h.keeper.store().all_statistics().unwrap();
        let secondary_sum: u32 = stats.iter().map(|s| s.secondary_count).sum();
        assert_eq!(secondary_sum as usize, topologies.len() * Harness::SECONDARIES);
        assert_eq!(h.stat(1).primary_count, 4);
    }

    #[test]
    fn test_create_validates_secondaries() {
        let h = Harness::new();
        let err = h
            .keeper
            .create_global_virtual_group(&h.ctx(), create_msg(&h, 1, 0, &[2, 3]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSecondarySpCount { expected: 3, got: 2 }));

        let err = h
            .keeper
            .create_global_virtual_group(&h.ctx(), create_msg(&h, 1, 0, &[2, 3, 2]))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateSecondarySp(2)));

        let err = h
            .keeper
            .create_global_virtual_group(&h.ctx(), create_msg(&h, 1, 0, &[2, 3, 99]))
            .unwrap_err();
        assert!(matches!(err, Error::ProviderNotFound(_)));

        // Nothing was written by the failed attempts
        assert!(h.keeper.store().gvgs().unwrap().is_empty());
        assert!(h.keeper.store().get_statistics(1).unwrap().is_none());
    }

    #[test]
    fn test_legacy_create_skips_secondary_checks() {
        let h = Harness::new();
        let legacy = UpgradeSet::none();
        let ctx = Context::new(h.now(), &legacy);
        h.keeper
            .create_global_virtual_group(&ctx, create_msg(&h, 1, 0, &[2, 2]))
            .unwrap();
        assert_eq!(h.stat(2).secondary_count, 2);
    }

    #[test]
    fn test_create_rejects_unserving_sps() {
        let h = Harness::new();
        h.set_status(3, crate::provider::ProviderStatus::GracefulExiting);
        let err = h
            .keeper
            .create_global_virtual_group(&h.ctx(), create_msg(&h, 1, 0, &[2, 3, 4]))
            .unwrap_err();
        assert!(matches!(err, Error::ProviderNotInService { sp_id: 3, .. }));

        h.set_status(2, crate::provider::ProviderStatus::InMaintenance);
        h.keeper
            .create_global_virtual_group(&h.ctx(), create_msg(&h, 1, 0, &[2, 4, 5]))
            .unwrap();
    }

    #[test]
    fn test_create_rejects_wrong_denom() {
        let h = Harness::new();
        let mut msg = create_msg(&h, 1, 0, &[2, 3, 4]);
        msg.deposit = Coin::new("ETH", 1);
        assert!(matches!(
            h.keeper.create_global_virtual_group(&h.ctx(), msg),
            Err(Error::InvalidDenom { .. })
        ));
    }

    #[test]
    fn test_duplicate_topology_requires_full_sequence_match() {
        let h = Harness::new();
        let (_, family_id) = h.create_gvg(1, 0, &[2, 3, 4], 0);

        // Same prefix, different tail: accepted
        h.create_gvg(1, family_id, &[2, 3, 5], 0);
        // Different first element, same tail: accepted
        h.create_gvg(1, family_id, &[6, 3, 4], 0);
        // Same set in another order: accepted
        h.create_gvg(1, family_id, &[4, 3, 2], 0);

        // Exact repeat of the first group: rejected even though other groups
        // mismatch earlier positions
        let err = h
            .keeper
            .create_global_virtual_group(&h.ctx(), create_msg(&h, 1, family_id, &[2, 3, 4]))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateGvg { family_id: f } if f == family_id));

        // Exact repeat of a later group
        let err = h
            .keeper
            .create_global_virtual_group(&h.ctx(), create_msg(&h, 1, family_id, &[6, 3, 4]))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateGvg { .. }));
    }

    #[test]
    fn test_duplicate_topology_allowed_before_upgrade() {
        let h = Harness::new();
        let gates = UpgradeSet::all().without(Upgrade::UniqueTopology);
        let ctx = Context::new(h.now(), &gates);
        let (_, family_id) = h.create_gvg(1, 0, &[2, 3, 4], 0);
        h.keeper
            .create_global_virtual_group(&ctx, create_msg(&h, 1, family_id, &[2, 3, 4]))
            .unwrap();
    }

    #[test]
    fn test_family_limit() {
        let h = Harness::with_max_groups(2);
        let (_, family_id) = h.create_gvg(1, 0, &[2, 3, 4], 0);
        h.create_gvg(1, family_id, &[3, 4, 5], 0);

        let err = h
            .keeper
            .create_global_virtual_group(&h.ctx(), create_msg(&h, 1, family_id, &[4, 5, 6]))
            .unwrap_err();
        assert!(matches!(err, Error::LimitExceeded { limit: 2, .. }));
    }

    #[test]
    fn test_foreign_family_rejected() {
        let h = Harness::new();
        let (_, family_id) = h.create_gvg(1, 0, &[2, 3, 4], 0);
        let err = h
            .keeper
            .create_global_virtual_group(&h.ctx(), create_msg(&h, 5, family_id, &[2, 3, 4]))
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));

        assert!(matches!(
            h.keeper
                .create_global_virtual_group(&h.ctx(), create_msg(&h, 5, 42, &[2, 3, 4])),
            Err(Error::FamilyNotFound(42))
        ));
    }

    #[test]
    fn test_deposit_by_funding_address() {
        let h = Harness::new();
        let (gvg_id, _) = h.create_gvg(1, 0, &[2, 3, 4], 100);

        let receipt = h
            .keeper
            .deposit(
                MsgDeposit {
                    storage_provider: h.funding(1),
                    global_virtual_group_id: gvg_id,
                    deposit: Coin::new(DENOM, 50),
                },
            )
            .unwrap();
        assert!(matches!(receipt.events[0], Event::UpdateGlobalVirtualGroup { total_deposit: 150, .. }));
        assert_eq!(h.gvg(gvg_id).total_deposit, 150);
        assert!(h.keeper.audit_escrow().unwrap().is_balanced());

        assert!(matches!(
            h.keeper.deposit(
                MsgDeposit {
                    storage_provider: h.operator(1),
                    global_virtual_group_id: gvg_id,
                    deposit: Coin::new("ETH", 50),
                },
            ),
            Err(Error::InvalidDenom { .. })
        ));
    }

    #[test]
    fn test_withdraw_all_available() {
        let h = Harness::new();
        let (gvg_id, _) = h.create_gvg(1, 0, &[2, 3, 4], 1_000);
        h.set_stored_size(gvg_id, 300);

        let receipt = h
            .keeper
            .withdraw(
                MsgWithdraw {
                    storage_provider: h.operator(1),
                    global_virtual_group_id: gvg_id,
                    withdraw: Coin::new(DENOM, 0),
                },
            )
            .unwrap();

        // Required stake is 300 bytes at one token per byte
        assert!(matches!(receipt.events[0], Event::UpdateGlobalVirtualGroup { total_deposit: 300, .. }));
        assert_eq!(h.gvg(gvg_id).total_deposit, 300);
        assert_eq!(h.bank.balance(&h.funding(1), DENOM), h.initial_balance() - 300);
        assert!(h.keeper.audit_escrow().unwrap().is_balanced());
    }

    #[test]
    fn test_deposit_then_withdraw_everything_without_stake_requirement() {
        let h = Harness::new();
        let (gvg_id, _) = h.create_gvg(1, 0, &[2, 3, 4], 0);
        h.keeper
            .deposit(
                MsgDeposit {
                    storage_provider: h.operator(1),
                    global_virtual_group_id: gvg_id,
                    deposit: Coin::new(DENOM, 500),
                },
            )
            .unwrap();
        h.keeper
            .withdraw(
                MsgWithdraw {
                    storage_provider: h.funding(1),
                    global_virtual_group_id: gvg_id,
                    withdraw: Coin::new(DENOM, 0),
                },
            )
            .unwrap();
        assert_eq!(h.gvg(gvg_id).total_deposit, 0);
        assert_eq!(h.bank.balance(&h.funding(1), DENOM), h.initial_balance());
    }

    #[test]
    fn test_withdraw_too_large_and_wrong_caller() {
        let h = Harness::new();
        let (gvg_id, _) = h.create_gvg(1, 0, &[2, 3, 4], 1_000);
        h.set_stored_size(gvg_id, 900);

        let err = h
            .keeper
            .withdraw(
                MsgWithdraw {
                    storage_provider: h.operator(1),
                    global_virtual_group_id: gvg_id,
                    withdraw: Coin::new(DENOM, 101),
                },
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::WithdrawAmountTooLarge { requested: 101, available: 100 }
        ));

        let err = h
            .keeper
            .withdraw(
                MsgWithdraw {
                    storage_provider: h.operator(2),
                    global_virtual_group_id: gvg_id,
                    withdraw: Coin::new(DENOM, 1),
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
        assert_eq!(h.gvg(gvg_id).total_deposit, 1_000);
    }

    #[test]
    #[should_panic(expected = "available tokens is negative")]
    fn test_withdraw_with_negative_available_is_fatal() {
        let h = Harness::new();
        let (gvg_id, _) = h.create_gvg(1, 0, &[2, 3, 4], 10);
        h.set_stored_size(gvg_id, 11);
        let _ = h.keeper.withdraw(
            MsgWithdraw {
                storage_provider: h.operator(1),
                global_virtual_group_id: gvg_id,
                withdraw: Coin::new(DENOM, 0),
            },
        );
    }

    #[test]
    fn test_withdraw_uses_governed_staking_rate() {
        let h = Harness::new();
        let (gvg_id, _) = h.create_gvg(1, 0, &[2, 3, 4], 1_000);
        h.set_stored_size(gvg_id, 100);

        let mut params = h.keeper.store().params().unwrap();
        params.gvg_staking_per_bytes = 10;
        h.keeper
            .update_params(
                &h.ctx(),
                crate::keeper::MsgUpdateParams {
                    authority: h.authority,
                    params,
                },
            )
            .unwrap();

        // 100 bytes at 10 per byte lock the whole deposit
        let withdraw = |amount: u128| {
            h.keeper.withdraw(
                MsgWithdraw {
                    storage_provider: h.operator(1),
                    global_virtual_group_id: gvg_id,
                    withdraw: Coin::new(DENOM, amount),
                },
            )
        };
        let err = withdraw(1).unwrap_err();
        assert!(matches!(
            err,
            Error::WithdrawAmountTooLarge { requested: 1, available: 0 }
        ));
        withdraw(0).unwrap();
        assert_eq!(h.gvg(gvg_id).total_deposit, 1_000);
        assert_eq!(h.bank.balance(&h.funding(1), DENOM), h.initial_balance() - 1_000);
    }

    #[test]
    fn test_create_without_funds_leaves_no_trace() {
        let h = Harness::new();
        let mut msg = create_msg(&h, 1, NO_SPECIFIED_FAMILY_ID, &[2, 3, 4]);
        msg.deposit = Coin::new(DENOM, h.initial_balance() + 1);
        assert!(h.keeper.create_global_virtual_group(&h.ctx(), msg).is_err());

        assert!(h.keeper.store().gvgs().unwrap().is_empty());
        assert!(h.keeper.store().families().unwrap().is_empty());
        assert_eq!(h.stat(1).primary_count, 0);
        assert_eq!(h.stat(2).secondary_count, 0);
        assert_eq!(h.bank.balance(&h.funding(1), DENOM), h.initial_balance());
        assert!(h.keeper.audit_escrow().unwrap().is_balanced());

        assert_eq!(h.create_gvg(1, 0, &[2, 3, 4], 0), (1, 1));
    }

    #[test]
    fn test_delete_refunds_and_removes_family() {
        let h = Harness::new();
        let (first, family_id) = h.create_gvg(1, 0, &[2, 3, 4], 200);
        let (second, _) = h.create_gvg(1, family_id, &[3, 4, 5], 300);

        let receipt = h
            .keeper
            .delete_global_virtual_group(
                MsgDeleteGlobalVirtualGroup {
                    storage_provider: h.operator(1),
                    global_virtual_group_id: first,
                },
            )
            .unwrap();
        assert_eq!(receipt.events.len(), 1);
        assert_eq!(
            h.keeper.store().family_required(family_id).unwrap().global_virtual_group_ids,
            vec![second]
        );
        assert_eq!(h.stat(2).secondary_count, 0);
        assert_eq!(h.stat(1).primary_count, 1);
        assert_eq!(h.payments.groups(), vec![first]);

        let receipt = h
            .keeper
            .delete_global_virtual_group(
                MsgDeleteGlobalVirtualGroup {
                    storage_provider: h.operator(1),
                    global_virtual_group_id: second,
                },
            )
            .unwrap();
        assert_eq!(receipt.events.len(), 2);
        assert!(matches!(receipt.events[1], Event::DeleteGlobalVirtualGroupFamily { .. }));
        assert!(h.keeper.store().get_family(family_id).unwrap().is_none());
        assert_eq!(h.bank.balance(&h.funding(1), DENOM), h.initial_balance());
        assert!(h.keeper.audit_escrow().unwrap().is_balanced());
    }

    #[test]
    fn test_delete_preconditions() {
        let h = Harness::new();
        let (gvg_id, _) = h.create_gvg(1, 0, &[2, 3, 4], 200);

        let err = h
            .keeper
            .delete_global_virtual_group(
                MsgDeleteGlobalVirtualGroup {
                    storage_provider: h.operator(2),
                    global_virtual_group_id: gvg_id,
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));

        h.set_stored_size(gvg_id, 1);
        let err = h
            .keeper
            .delete_global_virtual_group(
                MsgDeleteGlobalVirtualGroup {
                    storage_provider: h.operator(1),
                    global_virtual_group_id: gvg_id,
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::GvgNotEmpty { stored_size: 1, .. }));

        h.set_stored_size(gvg_id, 0);
        h.payments.fail_next();
        let err = h
            .keeper
            .delete_global_virtual_group(
                MsgDeleteGlobalVirtualGroup {
                    storage_provider: h.operator(1),
                    global_virtual_group_id: gvg_id,
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::SettleFailed));
        assert!(h.keeper.store().get_gvg(gvg_id).unwrap().is_some());
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let h = Harness::new();
        let (gvg_id, _) = h.create_gvg(1, 0, &[2, 3, 4], 0);
        h.keeper
            .delete_global_virtual_group(
                MsgDeleteGlobalVirtualGroup {
                    storage_provider: h.operator(1),
                    global_virtual_group_id: gvg_id,
                },
            )
            .unwrap();
        let (next, family) = h.create_gvg(1, 0, &[2, 3, 4], 0);
        assert_eq!(next, gvg_id + 1);
        assert_eq!(family, 2);
    }
}
