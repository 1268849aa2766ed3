//! Global virtual groups and families
//!
//! Records, the sled-backed store, and family management.

pub mod family;
pub mod store;
pub mod types;

pub use family::{FamilyManager, ResolvedFamily};
pub use store::{Batch, GroupStore};
pub use types::{
    GlobalVirtualGroup, GlobalVirtualGroupFamily, GvgStatisticsWithinSp, SwapInInfo, SwapOutInfo,
    SwapScope, NO_SPECIFIED_FAMILY_ID,
};
