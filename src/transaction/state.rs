// ============================================================================
// Transaction Identity
// ============================================================================
//
// Every submitted or evaluated call runs as one transaction, identified by a
// random 128-bit id and stamped once with its commit time.
//
// ============================================================================

use crate::core::TxTimestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a transaction (32 lowercase hex characters)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(String);

impl TransactionId {
    /// Generate a new unique transaction ID
    pub fn new() -> Self {
        TransactionId(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransactionId {
    fn from(raw: &str) -> Self {
        TransactionId(raw.to_string())
    }
}

/// Identity and commit time of a running transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxHeader {
    pub tx_id: TransactionId,
    pub timestamp: TxTimestamp,
}

impl TxHeader {
    pub fn new(tx_id: TransactionId, timestamp: TxTimestamp) -> Self {
        Self { tx_id, timestamp }
    }
}
