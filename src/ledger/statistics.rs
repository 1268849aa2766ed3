//! Statistics ledger
//!
//! Stages per-SP group counters for the duration of one request. Records are
//! loaded (or created) on first touch and written into the request batch once
//! the handler has finished mutating them.

use crate::error::{Error, Result};
use crate::group::store::{Batch, GroupStore};
use crate::group::types::{GlobalVirtualGroup, GvgStatisticsWithinSp};
use std::collections::BTreeMap;

/// Staged statistics for one request
pub struct StatisticsLedger<'a> {
    store: &'a GroupStore,
    staged: BTreeMap<u32, GvgStatisticsWithinSp>,
}

impl<'a> StatisticsLedger<'a> {
    pub fn new(store: &'a GroupStore) -> Self {
        Self {
            store,
            staged: BTreeMap::new(),
        }
    }

    /// Statistics for an SP, created empty on first reference
    pub fn entry(&mut self, sp_id: u32) -> Result<&mut GvgStatisticsWithinSp> {
        if !self.staged.contains_key(&sp_id) {
            let stat = self
                .store
                .get_statistics(sp_id)?
                .unwrap_or_else(|| GvgStatisticsWithinSp::new(sp_id));
            self.staged.insert(sp_id, stat);
        }
        self.staged
            .get_mut(&sp_id)
            .ok_or_else(|| Error::Internal(format!("statistics for SP {} not staged", sp_id)))
    }

    /// Count a newly created group for its primary and secondaries
    pub fn add_group(&mut self, gvg: &GlobalVirtualGroup) -> Result<()> {
        self.entry(gvg.primary_sp_id)?.primary_count += 1;
        for sp_id in &gvg.secondary_sp_ids {
            self.entry(*sp_id)?.secondary_count += 1;
        }
        if gvg.breaks_redundancy() {
            self.entry(gvg.primary_sp_id)?.break_redundancy_reqmt_gvg_count += 1;
        }
        Ok(())
    }

    /// Uncount a deleted group
    pub fn remove_group(&mut self, gvg: &GlobalVirtualGroup) -> Result<()> {
        let primary = self.entry(gvg.primary_sp_id)?;
        primary.primary_count = primary.primary_count.saturating_sub(1);
        if gvg.breaks_redundancy() {
            primary.break_redundancy_reqmt_gvg_count =
                primary.break_redundancy_reqmt_gvg_count.saturating_sub(1);
        }
        for sp_id in &gvg.secondary_sp_ids {
            let stat = self.entry(*sp_id)?;
            stat.secondary_count = stat.secondary_count.saturating_sub(1);
        }
        Ok(())
    }

    /// Move counters from the topology before a rebind to the topology after it
    pub fn rebind(&mut self, before: &GlobalVirtualGroup, after: &GlobalVirtualGroup) -> Result<()> {
        self.remove_group(before)?;
        self.add_group(after)
    }

    /// Stage every touched record into the batch
    pub fn stage_into(self, batch: &mut Batch) -> Result<()> {
        for stat in self.staged.values() {
            batch.put_statistics(stat)?;
        }
        Ok(())
    }
}
