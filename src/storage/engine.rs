use crate::core::{StoreResult, TxTimestamp};
use serde::{Deserialize, Serialize};

/// One committed write to a key, as reported by the per-key history feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyModification {
    pub tx_id: String,
    pub timestamp: TxTimestamp,
}

/// Store-side cursor over the history of a single key.
pub trait HistoryIterator {
    /// Next modification in the store's history order, `None` once exhausted.
    fn next_modification(&mut self) -> Option<StoreResult<KeyModification>>;

    /// Release the cursor. Calling it more than once is a no-op.
    fn close(&mut self);
}

/// Keyed store trait - the world state seen by a running transaction
pub trait KeyedStore {
    /// Latest committed value for `key`, `None` when the key was never written
    fn get_state(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Stage `value` under `key` for the current transaction
    fn put_state(&self, key: &str, value: Vec<u8>) -> StoreResult<()>;

    /// Open a history cursor for `key`
    fn history_for_key(&self, key: &str) -> StoreResult<Box<dyn HistoryIterator + '_>>;
}

/// Scoped history cursor: the underlying store iterator is closed when the
/// guard goes out of scope, whichever way the caller leaves.
pub struct HistoryCursor<'a> {
    inner: Box<dyn HistoryIterator + 'a>,
}

impl<'a> HistoryCursor<'a> {
    pub fn open(store: &'a dyn KeyedStore, key: &str) -> StoreResult<Self> {
        Ok(Self {
            inner: store.history_for_key(key)?,
        })
    }
}

impl Iterator for HistoryCursor<'_> {
    type Item = StoreResult<KeyModification>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next_modification()
    }
}

impl Drop for HistoryCursor<'_> {
    fn drop(&mut self) {
        self.inner.close();
    }
}
