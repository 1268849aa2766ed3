//! Request messages
//!
//! Every request names its caller by address; handlers resolve the address
//! to a storage provider before doing anything else.

use crate::config::Params;
use crate::error::{Error, Result};
use crate::group::{SwapScope, NO_SPECIFIED_FAMILY_ID};
use crate::provider::ApprovalPayload;
use crate::types::{Address, Coin};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Group id meaning "no group" in single-scope requests
pub const NO_SPECIFIED_GVG_ID: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCreateGlobalVirtualGroup {
    pub storage_provider: Address,
    /// Existing family, or [`NO_SPECIFIED_FAMILY_ID`] to allocate one
    pub family_id: u32,
    pub secondary_sp_ids: Vec<u32>,
    pub deposit: Coin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgDeleteGlobalVirtualGroup {
    pub storage_provider: Address,
    pub global_virtual_group_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgDeposit {
    /// Operator or funding address of the depositing SP
    pub storage_provider: Address,
    pub global_virtual_group_id: u32,
    pub deposit: Coin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgWithdraw {
    /// Operator or funding address of the group's primary SP
    pub storage_provider: Address,
    pub global_virtual_group_id: u32,
    /// A zero amount withdraws everything available
    pub withdraw: Coin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSwapOut {
    pub storage_provider: Address,
    pub family_id: u32,
    pub gvg_ids: Vec<u32>,
    pub successor_sp_id: u32,
    /// Successor's Ed25519 signature over [`MsgSwapOut::approval_payload`]
    pub successor_sp_approval: Vec<u8>,
}

impl MsgSwapOut {
    pub fn approval_payload(&self) -> ApprovalPayload<'_> {
        ApprovalPayload {
            storage_provider: &self.storage_provider,
            family_id: self.family_id,
            gvg_ids: &self.gvg_ids,
            successor_sp_id: self.successor_sp_id,
        }
    }

    pub fn scopes(&self) -> Result<Vec<SwapScope>> {
        scopes_of(self.family_id, &self.gvg_ids)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCancelSwapOut {
    pub storage_provider: Address,
    pub family_id: u32,
    pub gvg_ids: Vec<u32>,
}

impl MsgCancelSwapOut {
    pub fn scopes(&self) -> Result<Vec<SwapScope>> {
        scopes_of(self.family_id, &self.gvg_ids)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCompleteSwapOut {
    /// Operator address of the incumbent SP
    pub storage_provider: Address,
    pub family_id: u32,
    pub gvg_ids: Vec<u32>,
}

impl MsgCompleteSwapOut {
    pub fn scopes(&self) -> Result<Vec<SwapScope>> {
        scopes_of(self.family_id, &self.gvg_ids)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgReserveSwapIn {
    /// Operator address of the successor SP
    pub storage_provider: Address,
    pub target_sp_id: u32,
    pub family_id: u32,
    pub gvg_id: u32,
}

impl MsgReserveSwapIn {
    pub fn scope(&self) -> Result<SwapScope> {
        scope_of(self.family_id, self.gvg_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCancelSwapIn {
    pub storage_provider: Address,
    pub family_id: u32,
    pub gvg_id: u32,
}

impl MsgCancelSwapIn {
    pub fn scope(&self) -> Result<SwapScope> {
        scope_of(self.family_id, self.gvg_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCompleteSwapIn {
    pub storage_provider: Address,
    pub family_id: u32,
    pub gvg_id: u32,
}

impl MsgCompleteSwapIn {
    pub fn scope(&self) -> Result<SwapScope> {
        scope_of(self.family_id, self.gvg_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSettle {
    /// Caller address; only consulted by legacy settlement
    pub storage_provider: Address,
    pub family_id: u32,
    pub gvg_ids: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgStorageProviderExit {
    pub storage_provider: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgStorageProviderForcedExit {
    pub authority: Address,
    /// Operator address of the SP being removed
    pub storage_provider: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCompleteStorageProviderExit {
    /// Address submitting the completion
    pub operator: Address,
    /// Operator address of the exiting SP
    pub storage_provider: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUpdateParams {
    pub authority: Address,
    pub params: Params,
}

/// Scopes of a family-or-groups swap request
fn scopes_of(family_id: u32, gvg_ids: &[u32]) -> Result<Vec<SwapScope>> {
    if family_id != NO_SPECIFIED_FAMILY_ID {
        if !gvg_ids.is_empty() {
            return Err(Error::InvalidSwap(
                "a family swap cannot also name groups".to_string(),
            ));
        }
        return Ok(vec![SwapScope::Family(family_id)]);
    }

    if gvg_ids.is_empty() {
        return Err(Error::InvalidSwap(
            "either a family or at least one group is required".to_string(),
        ));
    }
    let mut seen = HashSet::with_capacity(gvg_ids.len());
    for id in gvg_ids {
        if !seen.insert(*id) {
            return Err(Error::InvalidSwap(format!("group {} listed twice", id)));
        }
    }
    Ok(gvg_ids.iter().map(|id| SwapScope::Group(*id)).collect())
}

/// Scope of a single family-or-group swap-in request
fn scope_of(family_id: u32, gvg_id: u32) -> Result<SwapScope> {
    match (family_id, gvg_id) {
        (NO_SPECIFIED_FAMILY_ID, NO_SPECIFIED_GVG_ID) => Err(Error::InvalidSwap(
            "either a family or a group is required".to_string(),
        )),
        (family_id, NO_SPECIFIED_GVG_ID) => Ok(SwapScope::Family(family_id)),
        (NO_SPECIFIED_FAMILY_ID, gvg_id) => Ok(SwapScope::Group(gvg_id)),
        _ => Err(Error::InvalidSwap(
            "a family swap cannot also name a group".to_string(),
        )),
    }
}
