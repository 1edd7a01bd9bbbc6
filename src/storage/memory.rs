use super::engine::{HistoryIterator, KeyModification};
use super::journal::BlockRecord;
use crate::core::{StoreError, StoreResult, TxTimestamp};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Commit height at which a key was last written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub block: u64,
}

#[derive(Debug, Clone)]
struct VersionedValue {
    value: Vec<u8>,
    version: Version,
}

/// Committed world state plus the full per-key modification history.
///
/// Only `apply` mutates it; transactions read from it through a simulator
/// and hand back a block to apply.
#[derive(Debug, Default)]
pub struct WorldState {
    states: HashMap<String, VersionedValue>,
    /// Oldest first; served newest first.
    history: HashMap<String, Vec<KeyModification>>,
    height: u64,
    open_cursors: Arc<AtomicUsize>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.states.get(key).map(|v| v.value.as_slice())
    }

    pub fn get_versioned(&self, key: &str) -> Option<(&[u8], Version)> {
        self.states
            .get(key)
            .map(|v| (v.value.as_slice(), v.version))
    }

    pub fn version_of(&self, key: &str) -> Option<Version> {
        self.states.get(key).map(|v| v.version)
    }

    /// Commit time of the most recent write to `key`.
    pub fn last_modified(&self, key: &str) -> Option<TxTimestamp> {
        self.history
            .get(key)
            .and_then(|mods| mods.last())
            .map(|m| m.timestamp)
    }

    /// History of `key`, newest first. Unknown keys have an empty history.
    pub fn history(&self, key: &str) -> Vec<KeyModification> {
        self.history
            .get(key)
            .map(|mods| mods.iter().rev().cloned().collect())
            .unwrap_or_default()
    }

    pub fn history_iter(&self, key: &str) -> MemoryHistoryIterator {
        MemoryHistoryIterator::new(self.history(key), Arc::clone(&self.open_cursors))
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn key_count(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// History cursors handed out and not yet closed.
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    /// Apply the next committed block. Blocks must arrive in height order.
    pub fn apply(&mut self, block: &BlockRecord) -> StoreResult<()> {
        let expected = self.height + 1;
        if block.block != expected {
            return Err(StoreError::OutOfOrder {
                expected,
                got: block.block,
            });
        }

        let version = Version { block: block.block };
        for write in &block.writes {
            self.states.insert(
                write.key.clone(),
                VersionedValue {
                    value: write.value.clone(),
                    version,
                },
            );
            self.history
                .entry(write.key.clone())
                .or_default()
                .push(KeyModification {
                    tx_id: block.tx_id.clone(),
                    timestamp: block.timestamp,
                });
        }

        self.height = block.block;
        Ok(())
    }
}

/// Cursor over a point-in-time copy of one key's history.
pub struct MemoryHistoryIterator {
    entries: std::vec::IntoIter<KeyModification>,
    open_cursors: Arc<AtomicUsize>,
    closed: bool,
}

impl MemoryHistoryIterator {
    fn new(entries: Vec<KeyModification>, open_cursors: Arc<AtomicUsize>) -> Self {
        open_cursors.fetch_add(1, Ordering::SeqCst);
        Self {
            entries: entries.into_iter(),
            open_cursors,
            closed: false,
        }
    }
}

impl HistoryIterator for MemoryHistoryIterator {
    fn next_modification(&mut self) -> Option<StoreResult<KeyModification>> {
        if self.closed {
            return Some(Err(StoreError::IteratorClosed));
        }
        self.entries.next().map(Ok)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.open_cursors.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
