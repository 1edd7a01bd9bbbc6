pub mod ledger;

pub use ledger::{CommitReceipt, ContractCall, Ledger};
