//! Swap coordinator
//!
//! Two handshakes move a role from one SP to another:
//!
//! - swap-out: the incumbent records a hand-off to a successor that has
//!   signed its consent, then completes it;
//! - swap-in: a successor reserves the role of an exiting target for a
//!   limited time, then completes it before the reservation expires.
//!
//! A family scope moves the primary role of every group in the family; a
//! group scope moves one secondary slot. Completion settles the affected
//! family or group first, so income accrued so far goes to the outgoing SP.

use super::events::{Event, Receipt};
use super::msg::{
    MsgCancelSwapIn, MsgCancelSwapOut, MsgCompleteSwapIn, MsgCompleteSwapOut, MsgReserveSwapIn,
    MsgSwapOut, NO_SPECIFIED_GVG_ID,
};
use super::{Context, Keeper};
use crate::error::{Error, Result};
use crate::group::{Batch, SwapInInfo, SwapOutInfo, SwapScope, NO_SPECIFIED_FAMILY_ID};
use crate::ledger::StatisticsLedger;
use crate::provider::{verify_approval, ResolvedIdentity, StorageProvider};
use tracing::{debug, info, warn};

/// Family and group ids of a scope as carried by events
fn scope_ids(scope: SwapScope) -> (u32, u32) {
    match scope {
        SwapScope::Family(id) => (id, NO_SPECIFIED_GVG_ID),
        SwapScope::Group(id) => (NO_SPECIFIED_FAMILY_ID, id),
    }
}

/// Family id and group ids of a multi-scope request as carried by events
fn scopes_ids(scopes: &[SwapScope]) -> (u32, Vec<u32>) {
    let mut family_id = NO_SPECIFIED_FAMILY_ID;
    let mut gvg_ids = Vec::new();
    for scope in scopes {
        match scope {
            SwapScope::Family(id) => family_id = *id,
            SwapScope::Group(id) => gvg_ids.push(*id),
        }
    }
    (family_id, gvg_ids)
}

impl Keeper {
    /// Check that `sp_id` holds the role a scope hands off, and that the
    /// successor does not already serve there
    fn check_swap_out_scope(&self, scope: SwapScope, sp_id: u32, successor_id: u32) -> Result<()> {
        match scope {
            SwapScope::Family(id) => {
                let family = self.store.family_required(id)?;
                if family.primary_sp_id != sp_id {
                    return Err(Error::Unauthorized(format!(
                        "SP {} is not the primary of family {}",
                        sp_id, id
                    )));
                }
            }
            SwapScope::Group(id) => {
                let gvg = self.store.gvg_required(id)?;
                if !gvg.is_secondary(sp_id) {
                    return Err(Error::Unauthorized(format!(
                        "SP {} is not a secondary of gvg {}",
                        sp_id, id
                    )));
                }
                if gvg.involves(successor_id) {
                    return Err(Error::InvalidSwap(format!(
                        "successor SP {} already serves in gvg {}",
                        successor_id, id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Hand the scope's role from `incumbent` to `successor_id`, settling
    /// first. Rebound groups and the statistics move are staged.
    fn rebind_scope(
        &self,
        scope: SwapScope,
        incumbent: &StorageProvider,
        successor_id: u32,
        stats: &mut StatisticsLedger<'_>,
        batch: &mut Batch,
    ) -> Result<()> {
        match scope {
            SwapScope::Family(id) => {
                let mut family = self.store.family_required(id)?;
                if family.primary_sp_id != incumbent.id {
                    return Err(Error::InvalidSwap(format!(
                        "family {} is no longer served by SP {}",
                        id, incumbent.id
                    )));
                }
                self.settle_family_with(incumbent, &family)?;

                for gvg_id in &family.global_virtual_group_ids {
                    let before = self.store.gvg_required(*gvg_id)?;
                    let mut after = before.clone();
                    after.primary_sp_id = successor_id;
                    stats.rebind(&before, &after)?;
                    batch.put_gvg(&after)?;
                }
                family.primary_sp_id = successor_id;
                batch.put_family(&family)?;
                debug!(
                    "Family {} ({} groups) rebound from SP {} to SP {}",
                    id,
                    family.len(),
                    incumbent.id,
                    successor_id
                );
            }
            SwapScope::Group(id) => {
                let before = self.store.gvg_required(id)?;
                self.settle_gvg_with(&before)?;

                let mut after = before.clone();
                if !after.replace_secondary(incumbent.id, successor_id) {
                    return Err(Error::InvalidSwap(format!(
                        "SP {} no longer holds a secondary slot of gvg {}",
                        incumbent.id, id
                    )));
                }
                stats.rebind(&before, &after)?;
                batch.put_gvg(&after)?;
                if after.breaks_redundancy() {
                    warn!(
                        "gvg {} breaks the redundancy requirement after swapping in SP {}",
                        id, successor_id
                    );
                }
            }
        }
        Ok(())
    }

    /// Drop pending swaps that a completed hand-off of `scope` resolves
    fn clear_resolved(&self, scope: SwapScope, incumbent_id: u32, batch: &mut Batch) -> Result<()> {
        if let Some(out) = self.store.get_swap_out(scope)? {
            if out.sp_id == incumbent_id {
                batch.delete_swap_out(scope);
            }
        }
        if let Some(reservation) = self.store.get_swap_in(scope)? {
            if reservation.target_sp_id == incumbent_id {
                batch.delete_swap_in(scope);
            }
        }
        Ok(())
    }

    /// Record a hand-off approved by the successor
    pub fn swap_out(&self, msg: MsgSwapOut) -> Result<Receipt> {
        let sp = ResolvedIdentity::operator(self.providers.as_ref(), &msg.storage_provider)?.provider;
        let scopes = msg.scopes()?;

        let successor = self
            .providers
            .provider(msg.successor_sp_id)
            .ok_or_else(|| Error::ProviderNotFound(format!("successor SP {}", msg.successor_sp_id)))?;
        if successor.id == sp.id {
            return Err(Error::SelfSwap(sp.id));
        }
        if !successor.is_in_service() {
            return Err(Error::ProviderNotInService {
                sp_id: successor.id,
                status: successor.status.to_string(),
            });
        }
        verify_approval(
            &msg.approval_payload(),
            &successor.approval_public_key,
            &msg.successor_sp_approval,
            successor.id,
        )?;

        let mut batch = Batch::new();
        let info = SwapOutInfo {
            sp_id: sp.id,
            successor_sp_id: successor.id,
        };
        for scope in &scopes {
            self.check_swap_out_scope(*scope, sp.id, successor.id)?;
            if let Some(existing) = self.store.get_swap_out(*scope)? {
                return Err(Error::SwapOutExists {
                    scope: scope.to_string(),
                    sp_id: existing.sp_id,
                });
            }
            batch.put_swap_out(*scope, &info)?;
        }
        self.store.commit(batch)?;

        info!(
            "SP {} requested swap-out of {:?} to SP {}",
            sp.id, scopes, successor.id
        );
        Ok(Receipt::single(Event::SwapOut {
            storage_provider_id: sp.id,
            family_id: msg.family_id,
            gvg_ids: msg.gvg_ids,
            successor_sp_id: successor.id,
        }))
    }

    /// Withdraw a pending hand-off
    pub fn cancel_swap_out(&self, msg: MsgCancelSwapOut) -> Result<Receipt> {
        let sp = ResolvedIdentity::operator(self.providers.as_ref(), &msg.storage_provider)?.provider;
        let scopes = msg.scopes()?;

        let mut batch = Batch::new();
        let mut successor_sp_id = 0;
        for scope in &scopes {
            let info = self
                .store
                .get_swap_out(*scope)?
                .filter(|info| info.sp_id == sp.id)
                .ok_or_else(|| Error::SwapOutNotFound {
                    scope: scope.to_string(),
                    sp_id: sp.id,
                })?;
            successor_sp_id = info.successor_sp_id;
            batch.delete_swap_out(*scope);
        }
        self.store.commit(batch)?;

        info!("SP {} cancelled swap-out of {:?}", sp.id, scopes);
        Ok(Receipt::single(Event::CancelSwapOut {
            storage_provider_id: sp.id,
            family_id: msg.family_id,
            gvg_ids: msg.gvg_ids,
            successor_sp_id,
        }))
    }

    /// Carry out a recorded hand-off
    pub fn complete_swap_out(&self, msg: MsgCompleteSwapOut) -> Result<Receipt> {
        let incumbent =
            ResolvedIdentity::operator(self.providers.as_ref(), &msg.storage_provider)?.provider;
        let scopes = msg.scopes()?;

        let mut successor_id = None;
        for scope in &scopes {
            let info = self
                .store
                .get_swap_out(*scope)?
                .filter(|info| info.sp_id == incumbent.id)
                .ok_or_else(|| Error::SwapOutNotFound {
                    scope: scope.to_string(),
                    sp_id: incumbent.id,
                })?;
            match successor_id {
                None => successor_id = Some(info.successor_sp_id),
                Some(id) if id != info.successor_sp_id => {
                    return Err(Error::InvalidSwap(format!(
                        "{} is handed to SP {}, not SP {}",
                        scope, info.successor_sp_id, id
                    )));
                }
                Some(_) => {}
            }
        }
        let successor_id = successor_id
            .ok_or_else(|| Error::Internal("swap-out without scopes".to_string()))?;

        let successor = self
            .providers
            .provider(successor_id)
            .ok_or_else(|| Error::ProviderNotFound(format!("successor SP {}", successor_id)))?;
        if !successor.status.is_serving() {
            return Err(Error::ProviderNotInService {
                sp_id: successor.id,
                status: successor.status.to_string(),
            });
        }

        let mut batch = Batch::new();
        let mut stats = StatisticsLedger::new(&self.store);
        for scope in &scopes {
            self.rebind_scope(*scope, &incumbent, successor.id, &mut stats, &mut batch)?;
            self.clear_resolved(*scope, incumbent.id, &mut batch)?;
        }
        stats.stage_into(&mut batch)?;
        self.store.commit(batch)?;

        info!(
            "Completed swap-out of {:?} from SP {} to SP {}",
            scopes, incumbent.id, successor.id
        );
        let (family_id, gvg_ids) = scopes_ids(&scopes);
        Ok(Receipt::single(Event::CompleteSwapOut {
            storage_provider_id: successor.id,
            src_storage_provider_id: incumbent.id,
            family_id,
            gvg_ids,
        }))
    }

    /// Reserve an exiting SP's role for the calling successor
    pub fn reserve_swap_in(&self, ctx: &Context<'_>, msg: MsgReserveSwapIn) -> Result<Receipt> {
        let successor =
            ResolvedIdentity::operator(self.providers.as_ref(), &msg.storage_provider)?.provider;
        if successor.id == msg.target_sp_id {
            return Err(Error::SelfSwap(successor.id));
        }
        let target = self
            .providers
            .provider(msg.target_sp_id)
            .ok_or_else(|| Error::ProviderNotFound(format!("target SP {}", msg.target_sp_id)))?;
        if !target.status.is_exiting() {
            return Err(Error::InvalidSwap(format!(
                "target SP {} is not exiting, status: {}",
                target.id, target.status
            )));
        }

        let scope = msg.scope()?;
        match scope {
            SwapScope::Family(id) => {
                let family = self.store.family_required(id)?;
                if family.primary_sp_id != target.id {
                    return Err(Error::InvalidSwap(format!(
                        "target SP {} is not the primary of family {}",
                        target.id, id
                    )));
                }
            }
            SwapScope::Group(id) => {
                let gvg = self.store.gvg_required(id)?;
                if !gvg.is_secondary(target.id) {
                    return Err(Error::InvalidSwap(format!(
                        "target SP {} is not a secondary of gvg {}",
                        target.id, id
                    )));
                }
                if gvg.is_secondary(successor.id) {
                    return Err(Error::InvalidSwap(format!(
                        "SP {} is already a secondary of gvg {}",
                        successor.id, id
                    )));
                }
            }
        }

        if let Some(existing) = self.store.get_swap_in(scope)? {
            if existing.successor_sp_id != successor.id && !existing.is_expired(ctx.block_time) {
                return Err(Error::SwapInReserved {
                    scope: scope.to_string(),
                    sp_id: existing.successor_sp_id,
                    expiration: existing.expiration_time,
                });
            }
        }

        let params = self.store.params()?;
        let validity = i64::try_from(params.swap_in_validity_period).unwrap_or(i64::MAX);
        let reservation = SwapInInfo {
            successor_sp_id: successor.id,
            target_sp_id: target.id,
            expiration_time: ctx.block_time.saturating_add(validity),
        };

        let mut batch = Batch::new();
        batch.put_swap_in(scope, &reservation)?;
        self.store.commit(batch)?;

        info!(
            "SP {} reserved swap-in of {} against SP {} until {}",
            successor.id, scope, target.id, reservation.expiration_time
        );
        let (family_id, gvg_id) = scope_ids(scope);
        Ok(Receipt::single(Event::ReserveSwapIn {
            storage_provider_id: successor.id,
            family_id,
            gvg_id,
            target_sp_id: target.id,
            expiration_time: reservation.expiration_time,
        }))
    }

    /// Release a reservation held by the caller
    pub fn cancel_swap_in(&self, msg: MsgCancelSwapIn) -> Result<Receipt> {
        let successor =
            ResolvedIdentity::operator(self.providers.as_ref(), &msg.storage_provider)?.provider;
        let scope = msg.scope()?;
        let reservation = self
            .store
            .get_swap_in(scope)?
            .filter(|info| info.successor_sp_id == successor.id)
            .ok_or_else(|| Error::SwapInNotFound {
                scope: scope.to_string(),
                sp_id: successor.id,
            })?;

        let mut batch = Batch::new();
        batch.delete_swap_in(scope);
        self.store.commit(batch)?;

        info!("SP {} cancelled swap-in of {}", successor.id, scope);
        let (family_id, gvg_id) = scope_ids(scope);
        Ok(Receipt::single(Event::CancelSwapIn {
            storage_provider_id: successor.id,
            family_id,
            gvg_id,
            target_sp_id: reservation.target_sp_id,
        }))
    }

    /// Take over the reserved role before the reservation expires
    pub fn complete_swap_in(&self, ctx: &Context<'_>, msg: MsgCompleteSwapIn) -> Result<Receipt> {
        let successor =
            ResolvedIdentity::operator(self.providers.as_ref(), &msg.storage_provider)?.provider;
        let scope = msg.scope()?;
        let reservation = self
            .store
            .get_swap_in(scope)?
            .filter(|info| info.successor_sp_id == successor.id)
            .ok_or_else(|| Error::SwapInNotFound {
                scope: scope.to_string(),
                sp_id: successor.id,
            })?;
        if reservation.is_expired(ctx.block_time) {
            warn!(
                "Swap-in of {} by SP {} expired at {}",
                scope, successor.id, reservation.expiration_time
            );
            return Err(Error::SwapInExpired {
                expiration: reservation.expiration_time,
                now: ctx.block_time,
            });
        }

        let target = self
            .providers
            .provider(reservation.target_sp_id)
            .ok_or_else(|| {
                Error::ProviderNotFound(format!("target SP {}", reservation.target_sp_id))
            })?;

        let mut batch = Batch::new();
        let mut stats = StatisticsLedger::new(&self.store);
        self.rebind_scope(scope, &target, successor.id, &mut stats, &mut batch)?;
        self.clear_resolved(scope, target.id, &mut batch)?;
        stats.stage_into(&mut batch)?;
        self.store.commit(batch)?;

        info!(
            "SP {} completed swap-in of {} replacing SP {}",
            successor.id, scope, target.id
        );
        let (family_id, gvg_id) = scope_ids(scope);
        Ok(Receipt::single(Event::CompleteSwapIn {
            storage_provider_id: successor.id,
            target_sp_id: target.id,
            family_id,
            gvg_id,
        }))
    }
}
