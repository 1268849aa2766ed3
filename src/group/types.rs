//! Records for virtual groups, families, per-SP statistics and pending swaps

use crate::types::{Address, VirtualAccountKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Family id sentinel meaning "allocate a new family"
pub const NO_SPECIFIED_FAMILY_ID: u32 = 0;

/// A redundancy unit: one primary SP and an ordered set of secondaries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalVirtualGroup {
    pub id: u32,
    pub family_id: u32,
    pub primary_sp_id: u32,
    pub secondary_sp_ids: Vec<u32>,
    /// Cumulative stored size in bytes
    pub stored_size: u64,
    pub virtual_payment_address: Address,
    pub total_deposit: u128,
}

impl GlobalVirtualGroup {
    pub fn new(
        id: u32,
        family_id: u32,
        primary_sp_id: u32,
        secondary_sp_ids: Vec<u32>,
        total_deposit: u128,
    ) -> Self {
        Self {
            id,
            family_id,
            primary_sp_id,
            secondary_sp_ids,
            stored_size: 0,
            virtual_payment_address: Address::derive_virtual_payment(
                VirtualAccountKind::GlobalVirtualGroup,
                id,
            ),
            total_deposit,
        }
    }

    /// Whether the SP serves in any role in this group
    pub fn involves(&self, sp_id: u32) -> bool {
        self.primary_sp_id == sp_id || self.secondary_sp_ids.contains(&sp_id)
    }

    /// Whether the SP occupies a secondary slot
    pub fn is_secondary(&self, sp_id: u32) -> bool {
        self.secondary_sp_ids.contains(&sp_id)
    }

    /// A group breaks the redundancy requirement when its primary also holds a
    /// secondary slot, or a secondary holds two slots.
    pub fn breaks_redundancy(&self) -> bool {
        if self.secondary_sp_ids.contains(&self.primary_sp_id) {
            return true;
        }
        let mut seen = HashSet::with_capacity(self.secondary_sp_ids.len());
        !self.secondary_sp_ids.iter().all(|id| seen.insert(*id))
    }

    /// Replace the first secondary slot held by `from` with `to`.
    /// Returns false when `from` holds no slot.
    pub fn replace_secondary(&mut self, from: u32, to: u32) -> bool {
        match self.secondary_sp_ids.iter_mut().find(|id| **id == from) {
            Some(slot) => {
                *slot = to;
                true
            }
            None => false,
        }
    }
}

/// A named container of groups sharing one primary SP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalVirtualGroupFamily {
    pub id: u32,
    pub primary_sp_id: u32,
    pub global_virtual_group_ids: Vec<u32>,
    pub virtual_payment_address: Address,
}

impl GlobalVirtualGroupFamily {
    pub fn new(id: u32, primary_sp_id: u32) -> Self {
        Self {
            id,
            primary_sp_id,
            global_virtual_group_ids: Vec::new(),
            virtual_payment_address: Address::derive_virtual_payment(
                VirtualAccountKind::GlobalVirtualGroupFamily,
                id,
            ),
        }
    }

    pub fn append_gvg(&mut self, gvg_id: u32) {
        self.global_virtual_group_ids.push(gvg_id);
    }

    /// Remove a group id, returning whether it was present
    pub fn remove_gvg(&mut self, gvg_id: u32) -> bool {
        let before = self.global_virtual_group_ids.len();
        self.global_virtual_group_ids.retain(|id| *id != gvg_id);
        self.global_virtual_group_ids.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.global_virtual_group_ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.global_virtual_group_ids.len()
    }
}

/// Per-SP group counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GvgStatisticsWithinSp {
    pub storage_provider_id: u32,
    pub primary_count: u32,
    pub secondary_count: u32,
    /// Groups owned by this SP that currently break the redundancy requirement
    pub break_redundancy_reqmt_gvg_count: u32,
}

impl GvgStatisticsWithinSp {
    pub fn new(storage_provider_id: u32) -> Self {
        Self {
            storage_provider_id,
            ..Default::default()
        }
    }
}

/// Key of a pending swap: a whole family (primary role) or a single group
/// (secondary role)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SwapScope {
    Family(u32),
    Group(u32),
}

impl SwapScope {
    const FAMILY_TAG: u8 = 0;
    const GROUP_TAG: u8 = 1;

    /// Storage key: one tag byte followed by the big-endian id
    pub fn key(&self) -> [u8; 5] {
        let (tag, id) = match self {
            SwapScope::Family(id) => (Self::FAMILY_TAG, *id),
            SwapScope::Group(id) => (Self::GROUP_TAG, *id),
        };
        let mut key = [0u8; 5];
        key[0] = tag;
        key[1..].copy_from_slice(&id.to_be_bytes());
        key
    }
}

impl fmt::Display for SwapScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapScope::Family(id) => write!(f, "family {}", id),
            SwapScope::Group(id) => write!(f, "gvg {}", id),
        }
    }
}

/// Pending hand-off requested by an incumbent SP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapOutInfo {
    pub sp_id: u32,
    pub successor_sp_id: u32,
}

/// Pending reservation by a successor SP against a target SP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapInInfo {
    pub successor_sp_id: u32,
    pub target_sp_id: u32,
    /// Unix seconds after which the reservation can no longer complete
    pub expiration_time: i64,
}

impl SwapInInfo {
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expiration_time
    }
}
