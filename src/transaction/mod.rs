// ============================================================================
// Transaction Module
// ============================================================================
//
// Execute-then-validate transactions over the in-memory world state:
// - Simulation: reads against committed state, buffered writes
// - Validation: MVCC version check of the read set at commit
// - Ordering: strictly increasing commit timestamps from one clock
//
// ============================================================================

pub mod clock;
pub mod simulator;
pub mod state;

pub use clock::{CommitClock, MonotonicClock};
pub use simulator::{ReadWriteSet, TxSimulator};
pub use state::{TransactionId, TxHeader};
