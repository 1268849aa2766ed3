//! virtualgroup - storage provider redundancy groups
//!
//! Global virtual groups bind one primary storage provider and a fixed set of
//! secondaries to the same data. This library keeps their records, escrows
//! their stake deposits, runs the SP exit state machine and the swap-out /
//! swap-in handshakes that move a provider's role to a successor.

pub mod config;
pub mod error;
pub mod group;
pub mod keeper;
pub mod ledger;
pub mod memory;
pub mod policy;
pub mod provider;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, Params};
    pub use crate::error::{Error, Result};
    pub use crate::group::{GlobalVirtualGroup, GlobalVirtualGroupFamily, GroupStore};
    pub use crate::keeper::{Collaborators, Context, Event, Keeper, Receipt, UpgradeSet};
    pub use crate::types::{Address, Coin};
}
