use super::state::{TransactionId, TxHeader};
use crate::core::{TimestampError, TxTimestamp};
use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of the commit time for the transaction currently executing.
pub trait CommitClock {
    fn current_transaction_time(&self) -> Result<TxTimestamp, TimestampError>;
}

impl CommitClock for TxHeader {
    fn current_transaction_time(&self) -> Result<TxTimestamp, TimestampError> {
        Ok(self.timestamp)
    }
}

/// Issues transaction headers with strictly increasing, microsecond
/// resolution timestamps, even when the wall clock stalls or steps back.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last_micros: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> TxHeader {
        let now = Utc::now().timestamp_micros();
        let previous = match self.last_micros.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last.saturating_add(1)))
        }) {
            Ok(previous) | Err(previous) => previous,
        };
        let issued = now.max(previous.saturating_add(1));
        TxHeader::new(TransactionId::new(), TxTimestamp::from_micros(issued))
    }

    /// Never issue a timestamp at or before `timestamp` from now on.
    pub fn observe(&self, timestamp: TxTimestamp) {
        self.last_micros
            .fetch_max(timestamp.as_micros(), Ordering::SeqCst);
    }
}
