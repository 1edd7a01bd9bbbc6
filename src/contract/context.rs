use crate::storage::KeyedStore;
use crate::transaction::CommitClock;

/// Platform capabilities handed to a contract call: the keyed store as seen
/// by the running transaction and the clock that stamps its commit.
#[derive(Clone, Copy)]
pub struct TxContext<'a> {
    store: &'a dyn KeyedStore,
    clock: &'a dyn CommitClock,
}

impl<'a> TxContext<'a> {
    pub fn new(store: &'a dyn KeyedStore, clock: &'a dyn CommitClock) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &'a dyn KeyedStore {
        self.store
    }

    pub fn clock(&self) -> &'a dyn CommitClock {
        self.clock
    }
}
