// ============================================================================
// Transaction Simulation
// ============================================================================
//
// A transaction executes against committed world state without changing it:
// - reads see the last committed value (no read-your-writes) and record the
//   version they observed
// - writes are buffered in a write set
// - the read/write set is validated and applied as one block at commit
//
// ============================================================================

use super::state::TxHeader;
use crate::core::StoreResult;
use crate::storage::{BlockRecord, HistoryIterator, KeyedStore, KvWrite, Version, WorldState};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

pub struct TxSimulator<'a> {
    world: &'a WorldState,
    reads: Mutex<BTreeMap<String, Option<Version>>>,
    writes: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl<'a> TxSimulator<'a> {
    pub fn new(world: &'a WorldState) -> Self {
        Self {
            world,
            reads: Mutex::new(BTreeMap::new()),
            writes: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn into_rw_set(self) -> ReadWriteSet {
        ReadWriteSet {
            reads: self.reads.into_inner().unwrap_or_else(PoisonError::into_inner),
            writes: self.writes.into_inner().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

impl KeyedStore for TxSimulator<'_> {
    fn get_state(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let observed = self.world.get_versioned(key);
        let mut reads = self.reads.lock()?;
        // First read wins; later reads of the same key see the same snapshot.
        reads
            .entry(key.to_string())
            .or_insert(observed.map(|(_, version)| version));
        Ok(observed.map(|(value, _)| value.to_vec()))
    }

    fn put_state(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        self.writes.lock()?.insert(key.to_string(), value);
        Ok(())
    }

    fn history_for_key(&self, key: &str) -> StoreResult<Box<dyn HistoryIterator + '_>> {
        Ok(Box::new(self.world.history_iter(key)))
    }
}

/// Versions a transaction observed and the values it wants to write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadWriteSet {
    reads: BTreeMap<String, Option<Version>>,
    writes: BTreeMap<String, Vec<u8>>,
}

impl ReadWriteSet {
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn read_keys(&self) -> impl Iterator<Item = &str> {
        self.reads.keys().map(String::as_str)
    }

    pub fn write_keys(&self) -> impl Iterator<Item = &str> {
        self.writes.keys().map(String::as_str)
    }

    /// First key that makes this transaction invalid against `world`:
    /// a read whose version moved on, or a write older than the key's
    /// latest committed modification.
    pub fn conflicting_key(&self, world: &WorldState, header: &TxHeader) -> Option<String> {
        let stale_read = self
            .reads
            .iter()
            .find(|(key, observed)| world.version_of(key) != **observed)
            .map(|(key, _)| key.clone());
        if stale_read.is_some() {
            return stale_read;
        }
        self.writes
            .keys()
            .find(|key| {
                world
                    .last_modified(key)
                    .is_some_and(|last| last >= header.timestamp)
            })
            .cloned()
    }

    pub fn into_block(self, block: u64, header: &TxHeader) -> BlockRecord {
        BlockRecord {
            block,
            tx_id: header.tx_id.to_string(),
            timestamp: header.timestamp,
            writes: self
                .writes
                .into_iter()
                .map(|(key, value)| KvWrite { key, value })
                .collect(),
        }
    }
}
