//! In-memory collaborators
//!
//! A bank and a provider registry kept entirely in memory, used by tests and
//! local simulation.

use crate::error::{Error, Result};
use crate::ledger::{Bank, Pool};
use crate::provider::{ProviderRegistry, ProviderStatus, StorageProvider};
use crate::types::{Address, Coin};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Bank holding balances in memory
#[derive(Default)]
pub struct MemoryBank {
    accounts: RwLock<HashMap<(Address, String), u128>>,
    pools: RwLock<HashMap<(Pool, String), u128>>,
}

impl MemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an account out of thin air (genesis, tests)
    pub fn mint(&self, account: &Address, coin: &Coin) {
        let mut accounts = self.accounts.write();
        let balance = accounts.entry((*account, coin.denom.clone())).or_insert(0);
        *balance = balance.saturating_add(coin.amount);
    }

    /// Credit a pool directly (genesis stake, tests)
    pub fn mint_pool(&self, pool: Pool, coin: &Coin) {
        let mut pools = self.pools.write();
        let balance = pools.entry((pool, coin.denom.clone())).or_insert(0);
        *balance = balance.saturating_add(coin.amount);
    }

    pub fn balance(&self, account: &Address, denom: &str) -> u128 {
        self.accounts
            .read()
            .get(&(*account, denom.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

impl Bank for MemoryBank {
    fn send_to_pool(&self, from: &Address, pool: Pool, coin: &Coin) -> Result<()> {
        let mut accounts = self.accounts.write();
        let key = (*from, coin.denom.clone());
        let available = accounts.get(&key).copied().unwrap_or(0);
        if available < coin.amount {
            return Err(Error::InsufficientFunds {
                account: from.to_string(),
                needed: coin.amount,
                available,
            });
        }
        accounts.insert(key, available - coin.amount);

        let mut pools = self.pools.write();
        let balance = pools.entry((pool, coin.denom.clone())).or_insert(0);
        *balance = balance.saturating_add(coin.amount);
        Ok(())
    }

    fn send_from_pool(&self, pool: Pool, to: &Address, coin: &Coin) -> Result<()> {
        let mut pools = self.pools.write();
        let key = (pool, coin.denom.clone());
        let available = pools.get(&key).copied().unwrap_or(0);
        if available < coin.amount {
            return Err(Error::InsufficientFunds {
                account: format!("{} pool", pool),
                needed: coin.amount,
                available,
            });
        }
        pools.insert(key, available - coin.amount);
        drop(pools);

        self.mint(to, coin);
        Ok(())
    }

    fn pool_balance(&self, pool: Pool, denom: &str) -> u128 {
        self.pools
            .read()
            .get(&(pool, denom.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

/// Provider registry kept in memory
pub struct MemoryRegistry {
    providers: RwLock<BTreeMap<u32, StorageProvider>>,
    exitable: RwLock<HashSet<u32>>,
    exit_failure: Mutex<Option<String>>,
    deposit_denom: String,
}

impl MemoryRegistry {
    pub fn new(deposit_denom: impl Into<String>) -> Self {
        Self {
            providers: RwLock::new(BTreeMap::new()),
            exitable: RwLock::new(HashSet::new()),
            exit_failure: Mutex::new(None),
            deposit_denom: deposit_denom.into(),
        }
    }

    /// Add or replace a provider
    pub fn register(&self, provider: StorageProvider) {
        self.providers.write().insert(provider.id, provider);
    }

    /// Control the exitability predicate for a provider
    pub fn set_exitable(&self, id: u32, exitable: bool) {
        let mut set = self.exitable.write();
        if exitable {
            set.insert(id);
        } else {
            set.remove(&id);
        }
    }

    /// Make the next terminal exit fail with `reason`
    pub fn fail_next_exit(&self, reason: impl Into<String>) {
        *self.exit_failure.lock() = Some(reason.into());
    }
}

impl ProviderRegistry for MemoryRegistry {
    fn provider(&self, id: u32) -> Option<StorageProvider> {
        self.providers.read().get(&id).cloned()
    }

    fn provider_by_operator(&self, operator: &Address) -> Option<StorageProvider> {
        self.providers
            .read()
            .values()
            .find(|sp| sp.operator_address == *operator)
            .cloned()
    }

    fn provider_by_funding(&self, funding: &Address) -> Option<StorageProvider> {
        self.providers
            .read()
            .values()
            .find(|sp| sp.funding_address == *funding)
            .cloned()
    }

    fn providers(&self) -> Vec<StorageProvider> {
        self.providers.read().values().cloned().collect()
    }

    fn set_provider(&self, provider: StorageProvider) {
        self.register(provider);
    }

    fn exit(&self, provider: &StorageProvider) -> std::result::Result<(), String> {
        if let Some(reason) = self.exit_failure.lock().take() {
            return Err(reason);
        }
        let mut providers = self.providers.write();
        match providers.get_mut(&provider.id) {
            Some(sp) => {
                sp.status = ProviderStatus::Exited;
                sp.total_deposit = 0;
                Ok(())
            }
            None => Err(format!("storage provider {} not registered", provider.id)),
        }
    }

    fn deposit_denom(&self) -> String {
        self.deposit_denom.clone()
    }

    fn exitable(&self, id: u32) -> bool {
        self.exitable.read().contains(&id)
    }
}
