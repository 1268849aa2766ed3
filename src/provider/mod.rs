//! Storage provider records and the registry port
//!
//! The SP subsystem owns provider records. This crate reads them, resolves
//! callers to providers, and writes status transitions during exit.

pub mod approval;
pub mod identity;

use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use approval::{ApprovalPayload, verify_approval};
pub use identity::{CallerRole, ResolvedIdentity};

/// Lifecycle status of a storage provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderStatus {
    InService,
    InMaintenance,
    GracefulExiting,
    ForcedExiting,
    Exited,
}

impl ProviderStatus {
    /// Whether the SP may be assigned new groups
    pub fn is_serving(&self) -> bool {
        matches!(self, ProviderStatus::InService | ProviderStatus::InMaintenance)
    }

    /// Whether the SP is in either exiting state
    pub fn is_exiting(&self) -> bool {
        matches!(
            self,
            ProviderStatus::GracefulExiting | ProviderStatus::ForcedExiting
        )
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderStatus::InService => "STATUS_IN_SERVICE",
            ProviderStatus::InMaintenance => "STATUS_IN_MAINTENANCE",
            ProviderStatus::GracefulExiting => "STATUS_GRACEFUL_EXITING",
            ProviderStatus::ForcedExiting => "STATUS_FORCED_EXITING",
            ProviderStatus::Exited => "STATUS_EXITED",
        };
        f.write_str(name)
    }
}

/// A registered storage provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageProvider {
    pub id: u32,
    /// Address that signs SP transactions
    pub operator_address: Address,
    /// Address that pays and receives deposits
    pub funding_address: Address,
    /// Ed25519 public key used to approve incoming swaps
    #[serde(with = "hex_key")]
    pub approval_public_key: [u8; 32],
    pub status: ProviderStatus,
    /// Stake held by the SP pool on behalf of this provider
    pub total_deposit: u128,
}

impl StorageProvider {
    pub fn is_in_service(&self) -> bool {
        self.status == ProviderStatus::InService
    }
}

/// Registry of storage providers, owned by the SP subsystem
pub trait ProviderRegistry: Send + Sync {
    fn provider(&self, id: u32) -> Option<StorageProvider>;

    fn provider_by_operator(&self, operator: &Address) -> Option<StorageProvider>;

    fn provider_by_funding(&self, funding: &Address) -> Option<StorageProvider>;

    /// Every registered provider
    fn providers(&self) -> Vec<StorageProvider>;

    /// Persist a provider record (status transitions)
    fn set_provider(&self, provider: StorageProvider);

    /// Terminal removal of an exited provider
    fn exit(&self, provider: &StorageProvider) -> std::result::Result<(), String>;

    /// Denomination of SP stake deposits
    fn deposit_denom(&self) -> String;

    /// Whether the provider has handed off everything and may complete its exit
    fn exitable(&self, id: u32) -> bool;
}

/// Hex serialization for 32-byte keys
mod hex_key {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        if bytes.len() != 32 {
            return Err(serde::de::Error::custom("invalid key length"));
        }
        let mut array = [0u8; 32];
        array.copy_from_slice(&bytes);
        Ok(array)
    }
}
