//! Domain events
//!
//! Handlers return the events of a committed request in a [`Receipt`]; the
//! host publishes them.

use crate::config::Params;
use crate::group::{GlobalVirtualGroup, GlobalVirtualGroupFamily};
use crate::types::Address;
use serde::{Deserialize, Serialize};

/// An event emitted by a state transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    CreateGlobalVirtualGroup {
        id: u32,
        family_id: u32,
        primary_sp_id: u32,
        secondary_sp_ids: Vec<u32>,
        stored_size: u64,
        virtual_payment_address: Address,
        total_deposit: u128,
    },
    CreateGlobalVirtualGroupFamily {
        id: u32,
        primary_sp_id: u32,
        virtual_payment_address: Address,
    },
    DeleteGlobalVirtualGroup {
        id: u32,
        primary_sp_id: u32,
    },
    DeleteGlobalVirtualGroupFamily {
        id: u32,
        primary_sp_id: u32,
    },
    UpdateGlobalVirtualGroup {
        id: u32,
        primary_sp_id: u32,
        store_size: u64,
        total_deposit: u128,
        secondary_sp_ids: Vec<u32>,
    },
    SwapOut {
        storage_provider_id: u32,
        family_id: u32,
        gvg_ids: Vec<u32>,
        successor_sp_id: u32,
    },
    CancelSwapOut {
        storage_provider_id: u32,
        family_id: u32,
        gvg_ids: Vec<u32>,
        successor_sp_id: u32,
    },
    CompleteSwapOut {
        /// The successor now holding the role
        storage_provider_id: u32,
        src_storage_provider_id: u32,
        family_id: u32,
        gvg_ids: Vec<u32>,
    },
    ReserveSwapIn {
        storage_provider_id: u32,
        family_id: u32,
        gvg_id: u32,
        target_sp_id: u32,
        expiration_time: i64,
    },
    CancelSwapIn {
        storage_provider_id: u32,
        family_id: u32,
        gvg_id: u32,
        target_sp_id: u32,
    },
    CompleteSwapIn {
        storage_provider_id: u32,
        target_sp_id: u32,
        family_id: u32,
        gvg_id: u32,
    },
    StorageProviderExit {
        storage_provider_id: u32,
        operator_address: Address,
    },
    StorageProviderForcedExit {
        storage_provider_id: u32,
    },
    CompleteStorageProviderExit {
        storage_provider_id: u32,
        operator_address: Address,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        storage_provider_address: Option<Address>,
        total_deposit: u128,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        forced_exit: Option<bool>,
    },
    Settle {
        family_id: u32,
        gvg_ids: Vec<u32>,
    },
    ParamsUpdated {
        params: Params,
    },
}

impl Event {
    pub fn gvg_created(gvg: &GlobalVirtualGroup) -> Self {
        Event::CreateGlobalVirtualGroup {
            id: gvg.id,
            family_id: gvg.family_id,
            primary_sp_id: gvg.primary_sp_id,
            secondary_sp_ids: gvg.secondary_sp_ids.clone(),
            stored_size: gvg.stored_size,
            virtual_payment_address: gvg.virtual_payment_address,
            total_deposit: gvg.total_deposit,
        }
    }

    pub fn family_created(family: &GlobalVirtualGroupFamily) -> Self {
        Event::CreateGlobalVirtualGroupFamily {
            id: family.id,
            primary_sp_id: family.primary_sp_id,
            virtual_payment_address: family.virtual_payment_address,
        }
    }

    /// Post-mutation state of a group after deposit or withdraw
    pub fn gvg_updated(gvg: &GlobalVirtualGroup) -> Self {
        Event::UpdateGlobalVirtualGroup {
            id: gvg.id,
            primary_sp_id: gvg.primary_sp_id,
            store_size: gvg.stored_size,
            total_deposit: gvg.total_deposit,
            secondary_sp_ids: gvg.secondary_sp_ids.clone(),
        }
    }
}

/// Events of one committed request, in emission order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub events: Vec<Event>,
}

impl Receipt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(event: Event) -> Self {
        Self {
            events: vec![event],
        }
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The primary event of the request
    pub fn primary(&self) -> Option<&Event> {
        self.events.first()
    }
}
