//! Protocol upgrade gates
//!
//! Handlers ask the host which historical behaviors are active instead of
//! branching on version numbers.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Behavior changes introduced by protocol upgrades
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Upgrade {
    /// Secondary count and uniqueness are validated at group creation.
    /// Family settlement is authorized by the family's own primary and group
    /// settlement no longer requires the caller to be a secondary.
    ValidatedSecondaries,
    /// A family may not hold two groups with identical secondary sequences
    UniqueTopology,
    /// Voluntary exit checks redundancy and the concurrency cap, and exit
    /// completion events carry the caller and the forced flag
    ExitAdmission,
    /// Param updates emit an event
    ParamsEvent,
}

impl Upgrade {
    pub const ALL: [Upgrade; 4] = [
        Upgrade::ValidatedSecondaries,
        Upgrade::UniqueTopology,
        Upgrade::ExitAdmission,
        Upgrade::ParamsEvent,
    ];
}

/// Answers whether an upgrade is active at the current height
pub trait FeatureGates {
    fn is_active(&self, upgrade: Upgrade) -> bool;
}

/// A fixed set of active upgrades
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeSet {
    active: HashSet<Upgrade>,
}

impl UpgradeSet {
    /// No upgrades active (legacy behavior everywhere)
    pub fn none() -> Self {
        Self::default()
    }

    /// Every known upgrade active
    pub fn all() -> Self {
        Upgrade::ALL.into_iter().collect()
    }

    pub fn activate(&mut self, upgrade: Upgrade) {
        self.active.insert(upgrade);
    }

    pub fn deactivate(&mut self, upgrade: Upgrade) {
        self.active.remove(&upgrade);
    }

    pub fn with(mut self, upgrade: Upgrade) -> Self {
        self.activate(upgrade);
        self
    }

    pub fn without(mut self, upgrade: Upgrade) -> Self {
        self.deactivate(upgrade);
        self
    }
}

impl FromIterator<Upgrade> for UpgradeSet {
    fn from_iter<I: IntoIterator<Item = Upgrade>>(iter: I) -> Self {
        Self {
            active: iter.into_iter().collect(),
        }
    }
}

impl FeatureGates for UpgradeSet {
    fn is_active(&self, upgrade: Upgrade) -> bool {
        self.active.contains(&upgrade)
    }
}
