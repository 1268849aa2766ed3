//! Caller resolution
//!
//! Requests carry a bare address. Handlers resolve it once into a
//! [`ResolvedIdentity`] naming the provider and the role the address holds.

use super::{ProviderRegistry, StorageProvider};
use crate::error::{Error, Result};
use crate::types::Address;
use std::fmt;

/// Which of the provider's addresses the caller used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerRole {
    Operator,
    Funding,
}

impl fmt::Display for CallerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallerRole::Operator => write!(f, "operator"),
            CallerRole::Funding => write!(f, "funding"),
        }
    }
}

/// A caller resolved to a registered provider
#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    pub provider: StorageProvider,
    pub role: CallerRole,
}

impl ResolvedIdentity {
    pub fn sp_id(&self) -> u32 {
        self.provider.id
    }

    /// Resolve an address that must be an operator address
    pub fn operator(registry: &dyn ProviderRegistry, addr: &Address) -> Result<Self> {
        registry
            .provider_by_operator(addr)
            .map(|provider| ResolvedIdentity {
                provider,
                role: CallerRole::Operator,
            })
            .ok_or_else(|| {
                Error::ProviderNotFound(format!(
                    "{} must be the operator address of an SP",
                    addr
                ))
            })
    }

    /// Resolve an address that may be either the operator or the funding address
    pub fn operator_or_funding(registry: &dyn ProviderRegistry, addr: &Address) -> Result<Self> {
        if let Some(provider) = registry.provider_by_operator(addr) {
            return Ok(ResolvedIdentity {
                provider,
                role: CallerRole::Operator,
            });
        }
        registry
            .provider_by_funding(addr)
            .map(|provider| ResolvedIdentity {
                provider,
                role: CallerRole::Funding,
            })
            .ok_or_else(|| {
                Error::ProviderNotFound(format!(
                    "{} must be the operator or funding address of an SP",
                    addr
                ))
            })
    }
}
