use super::types::TimestampError;
use thiserror::Error;

/// Ledger operation an error was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    InitLedger,
    CreateAsset,
    UpdateAsset,
    ReadAsset,
    AssetExists,
    GetAssetHistory,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::InitLedger => "InitLedger",
            Operation::CreateAsset => "CreateAsset",
            Operation::UpdateAsset => "UpdateAsset",
            Operation::ReadAsset => "ReadAsset",
            Operation::AssetExists => "AssetExists",
            Operation::GetAssetHistory => "GetAssetHistory",
        }
    }

    /// Whether the operation produces a write set that has to be committed.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Operation::InitLedger | Operation::CreateAsset | Operation::UpdateAsset
        )
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Failures reported by a keyed store implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("History iterator already closed")]
    IteratorClosed,

    #[error("Block {got} applied out of order (expected {expected})")]
    OutOfOrder { expected: u64, got: u64 },

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Journal {0} could not be rolled back after a failed append")]
    JournalPoisoned(String),
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("{op}: asset with MSISDN {key} already exists")]
    AlreadyExists { op: Operation, key: String },

    #[error("{op}: asset with MSISDN {key} does not exist")]
    NotFound { op: Operation, key: String },

    #[error("{op}: invalid balance '{input}' for asset {key}: {reason}")]
    InvalidBalanceFormat {
        op: Operation,
        key: String,
        input: String,
        reason: String,
    },

    #[error("{op}: failed to serialize asset {key}: {source}")]
    Serialization {
        op: Operation,
        key: String,
        source: serde_json::Error,
    },

    #[error("{op}: failed to deserialize asset {key}: {source}")]
    Deserialization {
        op: Operation,
        key: String,
        source: serde_json::Error,
    },

    #[error("{op}: failed to read {key} from world state: {source}")]
    StoreRead {
        op: Operation,
        key: String,
        source: StoreError,
    },

    #[error("{op}: failed to put {key} to world state: {source}")]
    StoreWrite {
        op: Operation,
        key: String,
        source: StoreError,
    },

    #[error("{op}: error checking existence of asset {key}: {source}")]
    ExistenceCheckFailed {
        op: Operation,
        key: String,
        source: Box<LedgerError>,
    },

    #[error("{op}: error converting timestamp for asset {key}: {source}")]
    Timestamp {
        op: Operation,
        key: String,
        source: TimestampError,
    },

    #[error("{op}: error iterating history of asset {key}: {source}")]
    HistoryIteration {
        op: Operation,
        key: String,
        source: StoreError,
    },

    #[error("Transaction {tx_id} invalidated: key {key} changed after it was read")]
    CommitRejected { tx_id: String, key: String },

    #[error("Commit of transaction {tx_id} failed: {source}")]
    CommitFailed { tx_id: String, source: StoreError },

    #[error("Journal error: {0}")]
    Journal(#[source] StoreError),
}

impl LedgerError {
    /// The operation the error surfaced from, when it came from the asset contract.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            LedgerError::AlreadyExists { op, .. }
            | LedgerError::NotFound { op, .. }
            | LedgerError::InvalidBalanceFormat { op, .. }
            | LedgerError::Serialization { op, .. }
            | LedgerError::Deserialization { op, .. }
            | LedgerError::StoreRead { op, .. }
            | LedgerError::StoreWrite { op, .. }
            | LedgerError::ExistenceCheckFailed { op, .. }
            | LedgerError::Timestamp { op, .. }
            | LedgerError::HistoryIteration { op, .. } => Some(*op),
            LedgerError::CommitRejected { .. }
            | LedgerError::CommitFailed { .. }
            | LedgerError::Journal(_) => None,
        }
    }

    /// The record key the error refers to, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            LedgerError::AlreadyExists { key, .. }
            | LedgerError::NotFound { key, .. }
            | LedgerError::InvalidBalanceFormat { key, .. }
            | LedgerError::Serialization { key, .. }
            | LedgerError::Deserialization { key, .. }
            | LedgerError::StoreRead { key, .. }
            | LedgerError::StoreWrite { key, .. }
            | LedgerError::ExistenceCheckFailed { key, .. }
            | LedgerError::Timestamp { key, .. }
            | LedgerError::HistoryIteration { key, .. }
            | LedgerError::CommitRejected { key, .. } => Some(key),
            LedgerError::CommitFailed { .. } | LedgerError::Journal(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
