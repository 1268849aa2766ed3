//! Successor approval for swap-out requests
//!
//! The successor SP consents to a hand-off by signing the canonical payload
//! of the swap-out request with its Ed25519 approval key.

use crate::error::{Error, Result};
use crate::types::Address;
use ring::signature::{UnparsedPublicKey, ED25519};
use serde::Serialize;

/// The fields of a swap-out request covered by the approval signature
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalPayload<'a> {
    pub storage_provider: &'a Address,
    pub family_id: u32,
    pub gvg_ids: &'a [u32],
    pub successor_sp_id: u32,
}

impl ApprovalPayload<'_> {
    /// Digest that the successor signs
    pub fn digest(&self) -> Result<[u8; 32]> {
        let encoded = bincode::serialize(self)?;
        Ok(*blake3::hash(&encoded).as_bytes())
    }
}

/// Verify the successor's signature over the payload digest
pub fn verify_approval(
    payload: &ApprovalPayload<'_>,
    public_key: &[u8; 32],
    signature: &[u8],
    successor_sp_id: u32,
) -> Result<()> {
    let digest = payload.digest()?;
    UnparsedPublicKey::new(&ED25519, public_key)
        .verify(&digest, signature)
        .map_err(|_| Error::InvalidApproval(successor_sp_id))
}
