pub mod engine;
pub mod journal;
pub mod memory;

pub use engine::{HistoryCursor, HistoryIterator, KeyModification, KeyedStore};
pub use journal::{BlockRecord, DurabilityMode, Journal, KvWrite};
pub use memory::{MemoryHistoryIterator, Version, WorldState};
