//! Sled-based group store
//!
//! Durable records for virtual groups, families, per-SP statistics, pending
//! swaps and module params. Requests stage their writes in a [`Batch`] which
//! is committed atomically across all trees.

use crate::config::Params;
use crate::error::{Error, Result};
use crate::group::types::{
    GlobalVirtualGroup, GlobalVirtualGroupFamily, GvgStatisticsWithinSp, SwapInInfo, SwapOutInfo,
    SwapScope,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{TransactionError, TransactionResult};
use sled::{Db, Transactional, Tree};
use std::path::Path;
use tracing::{debug, info};

/// Meta tree keys
const PARAMS_KEY: &[u8] = b"params";
const GVG_SEQUENCE_KEY: &[u8] = b"seq:gvg";
const FAMILY_SEQUENCE_KEY: &[u8] = b"seq:family";

/// Trees a staged write can target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TreeId {
    Gvgs,
    Families,
    Statistics,
    SwapOuts,
    SwapIns,
    Meta,
}

/// A staged write: `None` deletes the key
#[derive(Debug, Clone)]
struct StagedWrite {
    tree: TreeId,
    key: Vec<u8>,
    value: Option<Vec<u8>>,
}

/// Writes of one request, applied together by [`GroupStore::commit`]
#[derive(Debug, Default)]
pub struct Batch {
    writes: Vec<StagedWrite>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    fn stage<T: Serialize>(&mut self, tree: TreeId, key: &[u8], value: &T) -> Result<()> {
        self.writes.push(StagedWrite {
            tree,
            key: key.to_vec(),
            value: Some(bincode::serialize(value)?),
        });
        Ok(())
    }

    fn stage_delete(&mut self, tree: TreeId, key: &[u8]) {
        self.writes.push(StagedWrite {
            tree,
            key: key.to_vec(),
            value: None,
        });
    }

    /// Latest staged value for a meta key, if any
    fn staged_meta(&self, key: &[u8]) -> Option<&[u8]> {
        self.writes
            .iter()
            .rev()
            .find(|w| w.tree == TreeId::Meta && w.key == key)
            .and_then(|w| w.value.as_deref())
    }

    pub fn put_gvg(&mut self, gvg: &GlobalVirtualGroup) -> Result<()> {
        self.stage(TreeId::Gvgs, &id_key(gvg.id), gvg)
    }

    pub fn delete_gvg(&mut self, id: u32) {
        self.stage_delete(TreeId::Gvgs, &id_key(id));
    }

    pub fn put_family(&mut self, family: &GlobalVirtualGroupFamily) -> Result<()> {
        self.stage(TreeId::Families, &id_key(family.id), family)
    }

    pub fn delete_family(&mut self, id: u32) {
        self.stage_delete(TreeId::Families, &id_key(id));
    }

    pub fn put_statistics(&mut self, stat: &GvgStatisticsWithinSp) -> Result<()> {
        self.stage(TreeId::Statistics, &id_key(stat.storage_provider_id), stat)
    }

    pub fn put_swap_out(&mut self, scope: SwapScope, info: &SwapOutInfo) -> Result<()> {
        self.stage(TreeId::SwapOuts, &scope.key(), info)
    }

    pub fn delete_swap_out(&mut self, scope: SwapScope) {
        self.stage_delete(TreeId::SwapOuts, &scope.key());
    }

    pub fn put_swap_in(&mut self, scope: SwapScope, info: &SwapInInfo) -> Result<()> {
        self.stage(TreeId::SwapIns, &scope.key(), info)
    }

    pub fn delete_swap_in(&mut self, scope: SwapScope) {
        self.stage_delete(TreeId::SwapIns, &scope.key());
    }

    pub fn put_params(&mut self, params: &Params) -> Result<()> {
        self.stage(TreeId::Meta, PARAMS_KEY, params)
    }
}

/// Big-endian record key, so tree iteration follows id order
fn id_key(id: u32) -> [u8; 4] {
    id.to_be_bytes()
}

fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    bincode::deserialize(data).map_err(|e| Error::Deserialization(e.to_string()))
}

/// Group store backed by sled
pub struct GroupStore {
    db: Db,
    gvgs: Tree,
    families: Tree,
    statistics: Tree,
    swap_outs: Tree,
    swap_ins: Tree,
    meta: Tree,
}

impl GroupStore {
    /// Open or create a store on disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path.as_ref())?;
        let store = Self::from_db(db)?;
        info!(
            "Group store opened at {:?}, {} groups, {} families",
            path.as_ref(),
            store.gvgs.len(),
            store.families.len()
        );
        Ok(store)
    }

    /// Create a temporary store (for testing)
    pub fn in_memory() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self> {
        Ok(Self {
            gvgs: db.open_tree("gvgs")?,
            families: db.open_tree("families")?,
            statistics: db.open_tree("statistics")?,
            swap_outs: db.open_tree("swap_outs")?,
            swap_ins: db.open_tree("swap_ins")?,
            meta: db.open_tree("meta")?,
            db,
        })
    }

    /// Store genesis params unless params already exist.
    /// Returns true when params were written.
    pub fn init_params(&self, params: &Params) -> Result<bool> {
        if self.meta.contains_key(PARAMS_KEY)? {
            return Ok(false);
        }
        params.validate()?;
        self.meta.insert(PARAMS_KEY, bincode::serialize(params)?)?;
        info!("Initialized module params (denom {})", params.deposit_denom);
        Ok(true)
    }

    /// Current module params
    pub fn params(&self) -> Result<Params> {
        match self.meta.get(PARAMS_KEY)? {
            Some(data) => decode(&data),
            None => Err(Error::Config("module params are not initialized".to_string())),
        }
    }

    fn get<T: DeserializeOwned>(tree: &Tree, key: &[u8]) -> Result<Option<T>> {
        match tree.get(key)? {
            Some(data) => Ok(Some(decode(&data)?)),
            None => Ok(None),
        }
    }

    fn all<T: DeserializeOwned>(tree: &Tree) -> Result<Vec<T>> {
        let mut records = Vec::with_capacity(tree.len());
        for result in tree.iter() {
            let (_, data) = result?;
            records.push(decode(&data)?);
        }
        Ok(records)
    }

    pub fn get_gvg(&self, id: u32) -> Result<Option<GlobalVirtualGroup>> {
        Self::get(&self.gvgs, &id_key(id))
    }

    /// Get a group, returning an error if not found
    pub fn gvg_required(&self, id: u32) -> Result<GlobalVirtualGroup> {
        self.get_gvg(id)?.ok_or(Error::GvgNotFound(id))
    }

    pub fn get_family(&self, id: u32) -> Result<Option<GlobalVirtualGroupFamily>> {
        Self::get(&self.families, &id_key(id))
    }

    /// Get a family, returning an error if not found
    pub fn family_required(&self, id: u32) -> Result<GlobalVirtualGroupFamily> {
        self.get_family(id)?.ok_or(Error::FamilyNotFound(id))
    }

    pub fn get_statistics(&self, sp_id: u32) -> Result<Option<GvgStatisticsWithinSp>> {
        Self::get(&self.statistics, &id_key(sp_id))
    }

    pub fn get_swap_out(&self, scope: SwapScope) -> Result<Option<SwapOutInfo>> {
        Self::get(&self.swap_outs, &scope.key())
    }

    pub fn get_swap_in(&self, scope: SwapScope) -> Result<Option<SwapInInfo>> {
        Self::get(&self.swap_ins, &scope.key())
    }

    /// All groups in id order
    pub fn gvgs(&self) -> Result<Vec<GlobalVirtualGroup>> {
        Self::all(&self.gvgs)
    }

    /// All families in id order
    pub fn families(&self) -> Result<Vec<GlobalVirtualGroupFamily>> {
        Self::all(&self.families)
    }

    /// All statistics records in SP id order
    pub fn all_statistics(&self) -> Result<Vec<GvgStatisticsWithinSp>> {
        Self::all(&self.statistics)
    }

    fn next_sequence(&self, key: &[u8], batch: &mut Batch) -> Result<u32> {
        let current: u32 = match batch.staged_meta(key) {
            Some(data) => decode(data)?,
            None => Self::get(&self.meta, key)?.unwrap_or(1),
        };
        let next = current
            .checked_add(1)
            .ok_or_else(|| Error::Internal("id sequence exhausted".to_string()))?;
        batch.stage(TreeId::Meta, key, &next)?;
        Ok(current)
    }

    /// Allocate the next group id; the sequence advance commits with the batch
    pub fn next_gvg_id(&self, batch: &mut Batch) -> Result<u32> {
        self.next_sequence(GVG_SEQUENCE_KEY, batch)
    }

    /// Allocate the next family id; the sequence advance commits with the batch
    pub fn next_family_id(&self, batch: &mut Batch) -> Result<u32> {
        self.next_sequence(FAMILY_SEQUENCE_KEY, batch)
    }

    /// Apply every staged write atomically
    pub fn commit(&self, batch: Batch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let result: TransactionResult<()> = (
            &self.gvgs,
            &self.families,
            &self.statistics,
            &self.swap_outs,
            &self.swap_ins,
            &self.meta,
        )
            .transaction(|(gvgs, families, statistics, swap_outs, swap_ins, meta)| {
                for write in &batch.writes {
                    let tree = match write.tree {
                        TreeId::Gvgs => gvgs,
                        TreeId::Families => families,
                        TreeId::Statistics => statistics,
                        TreeId::SwapOuts => swap_outs,
                        TreeId::SwapIns => swap_ins,
                        TreeId::Meta => meta,
                    };
                    match &write.value {
                        Some(value) => {
                            tree.insert(write.key.as_slice(), value.as_slice())?;
                        }
                        None => {
                            tree.remove(write.key.as_slice())?;
                        }
                    }
                }
                Ok(())
            });

        match result {
            Ok(()) => {
                debug!("Committed batch of {} writes", batch.len());
                Ok(())
            }
            Err(TransactionError::Storage(e)) => Err(Error::Database(e)),
            Err(TransactionError::Abort(())) => {
                Err(Error::Internal("store transaction aborted".to_string()))
            }
        }
    }

    /// Flush to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}
