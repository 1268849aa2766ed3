//! Settlement engine
//!
//! Revenue distribution itself belongs to the payment subsystem. This module
//! decides who is authorized to trigger it and reports any failure as
//! [`Error::SettleFailed`].

use super::events::{Event, Receipt};
use super::gates::Upgrade;
use super::msg::MsgSettle;
use super::{Context, Keeper};
use crate::error::{Error, Result};
use crate::group::{GlobalVirtualGroup, GlobalVirtualGroupFamily, NO_SPECIFIED_FAMILY_ID};
use crate::provider::{ResolvedIdentity, StorageProvider};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Revenue distribution routine of the payment subsystem
pub trait PaymentDistributor: Send + Sync {
    /// Settle and distribute the family's accrued income to `sp`
    fn settle_family(
        &self,
        sp: &StorageProvider,
        family: &GlobalVirtualGroupFamily,
    ) -> std::result::Result<(), String>;

    /// Settle and distribute one group's accrued income to its secondaries
    fn settle_gvg(&self, gvg: &GlobalVirtualGroup) -> std::result::Result<(), String>;
}

impl Keeper {
    pub(crate) fn settle_family_with(
        &self,
        sp: &StorageProvider,
        family: &GlobalVirtualGroupFamily,
    ) -> Result<()> {
        self.payments.settle_family(sp, family).map_err(|e| {
            debug!("Settling family {} failed: {}", family.id, e);
            Error::SettleFailed
        })
    }

    pub(crate) fn settle_gvg_with(&self, gvg: &GlobalVirtualGroup) -> Result<()> {
        self.payments.settle_gvg(gvg).map_err(|e| {
            debug!("Settling gvg {} failed: {}", gvg.id, e);
            Error::SettleFailed
        })
    }

    /// Settle a family, or a set of groups
    pub fn settle(&self, ctx: &Context<'_>, msg: MsgSettle) -> Result<Receipt> {
        let legacy = !ctx.is_active(Upgrade::ValidatedSecondaries);
        let caller = if legacy {
            Some(ResolvedIdentity::operator_or_funding(
                self.providers.as_ref(),
                &msg.storage_provider,
            )?)
        } else {
            None
        };

        if msg.family_id != NO_SPECIFIED_FAMILY_ID {
            let family = self.store.family_required(msg.family_id)?;
            let sp = match caller {
                Some(identity) => identity.provider,
                None => self.providers.provider(family.primary_sp_id).ok_or_else(|| {
                    Error::ProviderNotFound(format!("family primary SP {}", family.primary_sp_id))
                })?,
            };
            self.settle_family_with(&sp, &family)?;
            info!("Settled family {} for SP {}", family.id, sp.id);
            return Ok(Receipt::single(Event::Settle {
                family_id: family.id,
                gvg_ids: Vec::new(),
            }));
        }

        let ids: BTreeSet<u32> = msg.gvg_ids.iter().copied().collect();
        for id in &ids {
            let gvg = self.store.gvg_required(*id)?;
            if let Some(identity) = &caller {
                if !gvg.is_secondary(identity.sp_id()) {
                    return Err(Error::Unauthorized(format!(
                        "SP {} is not a secondary of gvg {}",
                        identity.sp_id(),
                        gvg.id
                    )));
                }
            }
            self.settle_gvg_with(&gvg)?;
        }

        info!("Settled {} groups", ids.len());
        Ok(Receipt::single(Event::Settle {
            family_id: NO_SPECIFIED_FAMILY_ID,
            gvg_ids: ids.into_iter().collect(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keeper::gates::UpgradeSet;
    use crate::keeper::testkit::Harness;

    #[test]
    fn test_settle_family_uses_recorded_primary() {
        let h = Harness::new();
        let (_, family_id) = h.create_gvg(1, 0, &[2, 3, 4], 0);

        // Any caller works once settlement is authorized by the family primary
        let receipt = h
            .keeper
            .settle(
                &h.ctx(),
                MsgSettle {
                    storage_provider: h.operator(9),
                    family_id,
                    gvg_ids: vec![],
                },
            )
            .unwrap();
        assert_eq!(receipt.events.len(), 1);
        assert_eq!(h.payments.families(), vec![(1, family_id)]);
    }

    #[test]
    fn test_settle_groups_deduplicates() {
        let h = Harness::new();
        let (gvg_id, _) = h.create_gvg(1, 0, &[2, 3, 4], 0);

        h.keeper
            .settle(
                &h.ctx(),
                MsgSettle {
                    storage_provider: h.operator(2),
                    family_id: 0,
                    gvg_ids: vec![gvg_id, gvg_id],
                },
            )
            .unwrap();
        assert_eq!(h.payments.groups(), vec![gvg_id]);
    }

    #[test]
    fn test_legacy_settle_requires_secondary() {
        let h = Harness::new();
        let (gvg_id, _) = h.create_gvg(1, 0, &[2, 3, 4], 0);
        let legacy = UpgradeSet::none();
        let ctx = Context::new(h.now(), &legacy);

        let err = h
            .keeper
            .settle(
                &ctx,
                MsgSettle {
                    storage_provider: h.operator(1),
                    family_id: 0,
                    gvg_ids: vec![gvg_id],
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));

        h.keeper
            .settle(
                &ctx,
                MsgSettle {
                    storage_provider: h.funding(3),
                    family_id: 0,
                    gvg_ids: vec![gvg_id],
                },
            )
            .unwrap();
    }

    #[test]
    fn test_settle_failure_is_opaque() {
        let h = Harness::new();
        let (gvg_id, _) = h.create_gvg(1, 0, &[2, 3, 4], 0);
        h.payments.fail_next();

        let err = h
            .keeper
            .settle(
                &h.ctx(),
                MsgSettle {
                    storage_provider: h.operator(2),
                    family_id: 0,
                    gvg_ids: vec![gvg_id],
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::SettleFailed));
    }

    #[test]
    fn test_settle_missing_group() {
        let h = Harness::new();
        let err = h
            .keeper
            .settle(
                &h.ctx(),
                MsgSettle {
                    storage_provider: h.operator(2),
                    family_id: 0,
                    gvg_ids: vec![77],
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::GvgNotFound(77)));
    }
}
