// ============================================================================
// AssetLedger Library
// ============================================================================
//
// Subscriber asset records (balance, status, last transaction) kept in a
// versioned key-value world state, with per-key audit history and an HTTP
// facade.
//
// ============================================================================

pub mod config;
pub mod contract;
pub mod core;
pub mod facade;
pub mod storage;
pub mod transaction;
pub mod web;

// Re-export main types for convenience
pub use crate::config::{LedgerConfig, ServerConfig};
pub use crate::contract::{AssetContract, CreateAsset, UpdateAsset};
pub use crate::core::{Asset, HistoryEntry, LedgerError, Operation, Result, TxTimestamp};
pub use crate::facade::{CommitReceipt, ContractCall, Ledger};
pub use crate::storage::DurabilityMode;
