pub mod error;
pub mod types;

pub use error::{LedgerError, Operation, Result, StoreError, StoreResult};
pub use types::{Asset, HistoryEntry, TimestampError, TxTimestamp, unset_timestamp};
