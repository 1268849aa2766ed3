//! Family manager
//!
//! Creates and locates families and enforces the per-family group cap.

use crate::error::{Error, Result};
use crate::group::store::{Batch, GroupStore};
use crate::group::types::{GlobalVirtualGroupFamily, NO_SPECIFIED_FAMILY_ID};
use tracing::debug;

/// A family resolved for a new group
#[derive(Debug, Clone)]
pub struct ResolvedFamily {
    pub family: GlobalVirtualGroupFamily,
    /// True when the family was allocated by this request
    pub created: bool,
}

/// Family operations over the group store
pub struct FamilyManager<'a> {
    store: &'a GroupStore,
}

impl<'a> FamilyManager<'a> {
    pub fn new(store: &'a GroupStore) -> Self {
        Self { store }
    }

    /// Load the family, or allocate an empty one when `family_id` is the
    /// unspecified sentinel. The id allocation commits with `batch`.
    pub fn get_or_create_empty(
        &self,
        family_id: u32,
        primary_sp_id: u32,
        batch: &mut Batch,
    ) -> Result<ResolvedFamily> {
        if family_id == NO_SPECIFIED_FAMILY_ID {
            let id = self.store.next_family_id(batch)?;
            debug!("Allocated family {} for SP {}", id, primary_sp_id);
            return Ok(ResolvedFamily {
                family: GlobalVirtualGroupFamily::new(id, primary_sp_id),
                created: true,
            });
        }

        let family = self.store.family_required(family_id)?;
        if family.primary_sp_id != primary_sp_id {
            return Err(Error::Unauthorized(format!(
                "family {} belongs to SP {}, not SP {}",
                family.id, family.primary_sp_id, primary_sp_id
            )));
        }
        Ok(ResolvedFamily {
            family,
            created: false,
        })
    }

    /// Append a group, failing when the family would exceed `max_groups`
    pub fn attach(
        &self,
        family: &mut GlobalVirtualGroupFamily,
        gvg_id: u32,
        max_groups: u32,
    ) -> Result<()> {
        if family.len() as u64 + 1 > max_groups as u64 {
            return Err(Error::LimitExceeded {
                family_id: family.id,
                limit: max_groups,
            });
        }
        family.append_gvg(gvg_id);
        Ok(())
    }
}
