//! Core value types shared across the crate

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length of an account address in bytes
pub const ADDRESS_LEN: usize = 20;

/// Domain separator mixed into derived virtual payment addresses
const VIRTUAL_PAYMENT_DOMAIN: &[u8] = b"virtualgroup";

/// Account address (20 bytes, rendered as 0x-prefixed hex)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// Create an address from raw bytes
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Address(bytes)
    }

    /// Raw address bytes
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Derive the virtual payment account for a group or family
    pub fn derive_virtual_payment(kind: VirtualAccountKind, id: u32) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(VIRTUAL_PAYMENT_DOMAIN);
        hasher.update(kind.name().as_bytes());
        hasher.update(&id.to_be_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&digest.as_bytes()[..ADDRESS_LEN]);
        Address(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let decoded = hex::decode(digits)
            .map_err(|e| Error::Deserialization(format!("invalid address {}: {}", s, e)))?;
        if decoded.len() != ADDRESS_LEN {
            return Err(Error::Deserialization(format!(
                "invalid address {}: expected {} bytes, got {}",
                s,
                ADDRESS_LEN,
                decoded.len()
            )));
        }
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&decoded);
        Ok(Address(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Kinds of derived virtual payment accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtualAccountKind {
    /// Payment account of a single global virtual group
    GlobalVirtualGroup,
    /// Payment account of a family
    GlobalVirtualGroupFamily,
}

impl VirtualAccountKind {
    fn name(&self) -> &'static str {
        match self {
            VirtualAccountKind::GlobalVirtualGroup => "gvg",
            VirtualAccountKind::GlobalVirtualGroupFamily => "gvgf",
        }
    }
}

/// Token amount in a given denomination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: u128,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u128) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}
