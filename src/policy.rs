//! Storage policy port
//!
//! Redundancy shape and minimum stake are decided by the storage subsystem.

use crate::config::Params;
use crate::group::GlobalVirtualGroup;

/// Default secondary count for erasure-coded objects (4 data + 2 parity)
pub const DEFAULT_EXPECTED_SECONDARY_COUNT: usize = 6;

/// Storage subsystem rules consulted by group handlers
pub trait StoragePolicy: Send + Sync {
    /// Number of secondary SPs a new group must have at `block_time`
    fn expected_secondary_count(&self, block_time: i64) -> usize;

    /// Minimum stake the group must keep escrowed for its stored data,
    /// under the module params currently in force
    fn required_stake(&self, gvg: &GlobalVirtualGroup, params: &Params) -> u128;
}

/// Stake proportional to stored size at the governed per-byte rate
#[derive(Debug, Clone)]
pub struct LinearStakePolicy {
    pub expected_secondaries: usize,
}

impl LinearStakePolicy {
    pub fn new(expected_secondaries: usize) -> Self {
        Self {
            expected_secondaries,
        }
    }
}

impl Default for LinearStakePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_EXPECTED_SECONDARY_COUNT)
    }
}

impl StoragePolicy for LinearStakePolicy {
    fn expected_secondary_count(&self, _block_time: i64) -> usize {
        self.expected_secondaries
    }

    fn required_stake(&self, gvg: &GlobalVirtualGroup, params: &Params) -> u128 {
        (gvg.stored_size as u128).saturating_mul(params.gvg_staking_per_bytes)
    }
}
