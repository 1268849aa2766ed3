//! Test fixtures: a keeper over a temporary store, in-memory bank and
//! registry, and a recording payment distributor

use super::events::Event;
use super::gates::UpgradeSet;
use super::msg::{MsgCreateGlobalVirtualGroup, MsgSwapOut};
use super::settle::PaymentDistributor;
use super::{Collaborators, Context, Keeper};
use crate::config::Params;
use crate::group::{Batch, GlobalVirtualGroup, GlobalVirtualGroupFamily, GroupStore, GvgStatisticsWithinSp};
use crate::ledger::Pool;
use crate::memory::{MemoryBank, MemoryRegistry};
use crate::policy::LinearStakePolicy;
use crate::provider::{ProviderRegistry, ProviderStatus, StorageProvider};
use crate::types::{Address, Coin};
use parking_lot::Mutex;
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const DENOM: &str = "BNB";

/// Stake each provider holds in the SP pool
pub const SP_STAKE: u128 = 10_000;

/// Records settlement calls; can be told to fail the next one
#[derive(Default)]
pub struct RecordingDistributor {
    families: Mutex<Vec<(u32, u32)>>,
    groups: Mutex<Vec<u32>>,
    fail: AtomicBool,
}

impl RecordingDistributor {
    pub fn fail_next(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Settled `(sp_id, family_id)` pairs
    pub fn families(&self) -> Vec<(u32, u32)> {
        self.families.lock().clone()
    }

    pub fn groups(&self) -> Vec<u32> {
        self.groups.lock().clone()
    }

    fn check(&self) -> Result<(), String> {
        if self.fail.swap(false, Ordering::SeqCst) {
            return Err("stream record out of balance".to_string());
        }
        Ok(())
    }
}

impl PaymentDistributor for RecordingDistributor {
    fn settle_family(
        &self,
        sp: &StorageProvider,
        family: &GlobalVirtualGroupFamily,
    ) -> Result<(), String> {
        self.check()?;
        self.families.lock().push((sp.id, family.id));
        Ok(())
    }

    fn settle_gvg(&self, gvg: &GlobalVirtualGroup) -> Result<(), String> {
        self.check()?;
        self.groups.lock().push(gvg.id);
        Ok(())
    }
}

pub struct Harness {
    pub keeper: Keeper,
    pub bank: Arc<MemoryBank>,
    pub registry: Arc<MemoryRegistry>,
    pub payments: Arc<RecordingDistributor>,
    pub gates: UpgradeSet,
    pub authority: Address,
    pub governance: Address,
    now: i64,
    keys: HashMap<u32, Ed25519KeyPair>,
}

impl Harness {
    /// Registered providers, ids `1..=PROVIDERS`
    pub const PROVIDERS: u32 = 12;
    pub const SECONDARIES: usize = 3;
    pub const SWAP_IN_VALIDITY: u64 = 3_600;

    pub fn new() -> Self {
        Self::with_params(Self::params())
    }

    pub fn with_max_groups(max: u32) -> Self {
        let mut params = Self::params();
        params.max_global_virtual_group_num_per_family = max;
        Self::with_params(params)
    }

    pub fn with_exit_cap(cap: u32) -> Self {
        let mut params = Self::params();
        params.sp_concurrent_exit_num = cap;
        Self::with_params(params)
    }

    fn params() -> Params {
        Params {
            deposit_denom: DENOM.to_string(),
            gvg_staking_per_bytes: 1,
            swap_in_validity_period: Self::SWAP_IN_VALIDITY,
            sp_concurrent_exit_num: 5,
            ..Params::default()
        }
    }

    fn with_params(params: Params) -> Self {
        let store = GroupStore::in_memory().unwrap();
        store.init_params(&params).unwrap();

        let bank = Arc::new(MemoryBank::new());
        let registry = Arc::new(MemoryRegistry::new(DENOM));
        let payments = Arc::new(RecordingDistributor::default());
        let rng = SystemRandom::new();

        let mut keys = HashMap::new();
        for id in 1..=Self::PROVIDERS {
            let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
            let pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();
            let mut approval_public_key = [0u8; 32];
            approval_public_key.copy_from_slice(pair.public_key().as_ref());

            registry.register(StorageProvider {
                id,
                operator_address: Self::operator_address(id),
                funding_address: Self::funding_address(id),
                approval_public_key,
                status: ProviderStatus::InService,
                total_deposit: SP_STAKE,
            });
            bank.mint(&Self::funding_address(id), &Coin::new(DENOM, Self::INITIAL_BALANCE));
            bank.mint_pool(Pool::StorageProvider, &Coin::new(DENOM, SP_STAKE));
            keys.insert(id, pair);
        }

        let authority = Address::new([0xaa; 20]);
        let governance = Address::new([0xbb; 20]);
        let keeper = Keeper::new(
            store,
            authority,
            governance,
            Collaborators {
                providers: registry.clone(),
                bank: bank.clone(),
                policy: Arc::new(LinearStakePolicy::new(Self::SECONDARIES)),
                payments: payments.clone(),
            },
        );

        Self {
            keeper,
            bank,
            registry,
            payments,
            gates: UpgradeSet::all(),
            authority,
            governance,
            now: 1_700_000_000,
            keys,
        }
    }

    const INITIAL_BALANCE: u128 = 1_000_000;

    fn operator_address(id: u32) -> Address {
        let mut bytes = [0u8; 20];
        bytes[0] = 0x0a;
        bytes[16..].copy_from_slice(&id.to_be_bytes());
        Address::new(bytes)
    }

    fn funding_address(id: u32) -> Address {
        let mut bytes = [0u8; 20];
        bytes[0] = 0x0f;
        bytes[16..].copy_from_slice(&id.to_be_bytes());
        Address::new(bytes)
    }

    pub fn ctx(&self) -> Context<'_> {
        Context::new(self.now, &self.gates)
    }

    pub fn now(&self) -> i64 {
        self.now
    }

    pub fn advance(&mut self, seconds: i64) {
        self.now += seconds;
    }

    pub fn operator(&self, id: u32) -> Address {
        Self::operator_address(id)
    }

    pub fn funding(&self, id: u32) -> Address {
        Self::funding_address(id)
    }

    pub fn initial_balance(&self) -> u128 {
        Self::INITIAL_BALANCE
    }

    /// Create a group and return `(gvg_id, family_id)`
    pub fn create_gvg(&self, primary: u32, family_id: u32, secondaries: &[u32], deposit: u128) -> (u32, u32) {
        let receipt = self
            .keeper
            .create_global_virtual_group(
                &self.ctx(),
                MsgCreateGlobalVirtualGroup {
                    storage_provider: self.operator(primary),
                    family_id,
                    secondary_sp_ids: secondaries.to_vec(),
                    deposit: Coin::new(DENOM, deposit),
                },
            )
            .unwrap();
        match receipt.events[0] {
            Event::CreateGlobalVirtualGroup { id, family_id, .. } => (id, family_id),
            ref other => panic!("unexpected event {:?}", other),
        }
    }

    /// Successor's signature over a swap-out request
    pub fn approve(&self, successor: u32, msg: &MsgSwapOut) -> Vec<u8> {
        let digest = msg.approval_payload().digest().unwrap();
        self.keys[&successor].sign(&digest).as_ref().to_vec()
    }

    pub fn set_status(&self, id: u32, status: ProviderStatus) {
        let mut sp = self.registry.provider(id).unwrap();
        sp.status = status;
        self.registry.set_provider(sp);
    }

    pub fn status(&self, id: u32) -> ProviderStatus {
        self.registry.provider(id).unwrap().status
    }

    pub fn stat(&self, sp_id: u32) -> GvgStatisticsWithinSp {
        self.keeper
            .store()
            .get_statistics(sp_id)
            .unwrap()
            .unwrap_or_else(|| GvgStatisticsWithinSp::new(sp_id))
    }

    pub fn gvg(&self, id: u32) -> GlobalVirtualGroup {
        self.keeper.store().gvg_required(id).unwrap()
    }

    /// Stored size is maintained by the storage subsystem; write it directly
    pub fn set_stored_size(&self, id: u32, stored_size: u64) {
        let mut gvg = self.gvg(id);
        gvg.stored_size = stored_size;
        let mut batch = Batch::new();
        batch.put_gvg(&gvg).unwrap();
        self.keeper.store().commit(batch).unwrap();
    }
}
