use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 0001-01-01T00:00:00Z, the earliest instant a commit timestamp may carry.
const MIN_VALID_SECONDS: i64 = -62_135_596_800;
/// 9999-12-31T23:59:59Z, the latest instant a commit timestamp may carry.
const MAX_VALID_SECONDS: i64 = 253_402_300_799;

const NANOS_PER_SECOND: i32 = 1_000_000_000;

/// 0001-01-01T00:00:00Z: the timestamp of an asset no commit has stamped yet.
pub fn unset_timestamp() -> DateTime<Utc> {
    DateTime::from_timestamp(MIN_VALID_SECONDS, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    #[error("timestamp seconds {0} out of range")]
    SecondsOutOfRange(i64),

    #[error("timestamp nanos {0} out of range")]
    NanosOutOfRange(i32),

    #[error("commit clock unavailable: {0}")]
    Unavailable(String),
}

/// Platform-native commit time: seconds and nanoseconds since the Unix epoch.
///
/// Values arrive from the commit clock or from the per-key history feed and
/// have to be converted (and range checked) before they reach a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxTimestamp {
    pub seconds: i64,
    pub nanos: i32,
}

impl TxTimestamp {
    pub fn new(seconds: i64, nanos: i32) -> Self {
        Self { seconds, nanos }
    }

    pub fn from_micros(micros: i64) -> Self {
        Self {
            seconds: micros.div_euclid(1_000_000),
            nanos: (micros.rem_euclid(1_000_000) * 1_000) as i32,
        }
    }

    /// Microseconds since the epoch, saturating at the `i64` bounds.
    pub fn as_micros(&self) -> i64 {
        self.seconds
            .saturating_mul(1_000_000)
            .saturating_add(i64::from(self.nanos / 1_000))
    }

    pub fn to_datetime(&self) -> Result<DateTime<Utc>, TimestampError> {
        if !(0..NANOS_PER_SECOND).contains(&self.nanos) {
            return Err(TimestampError::NanosOutOfRange(self.nanos));
        }
        if !(MIN_VALID_SECONDS..=MAX_VALID_SECONDS).contains(&self.seconds) {
            return Err(TimestampError::SecondsOutOfRange(self.seconds));
        }
        DateTime::from_timestamp(self.seconds, self.nanos as u32)
            .ok_or(TimestampError::SecondsOutOfRange(self.seconds))
    }
}

impl std::fmt::Display for TxTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_datetime() {
            Ok(instant) => write!(f, "{}", instant.to_rfc3339()),
            Err(_) => write!(f, "{}s+{}ns", self.seconds, self.nanos),
        }
    }
}

/// A subscriber asset as stored in world state, keyed by its MSISDN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Asset {
    #[serde(rename = "DealerID")]
    pub dealer_id: String,
    #[serde(rename = "MSISDN")]
    pub msisdn: String,
    #[serde(rename = "MPIN")]
    pub mpin: String,
    pub balance: i64,
    pub status: String,
    pub trans_amount: i64,
    pub trans_type: String,
    pub remarks: String,
    /// Commit time of the last accepted write. Seeded assets carry
    /// [`unset_timestamp`].
    #[serde(default = "unset_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl Asset {
    /// An asset in its initial state: no transaction amount, type or remarks.
    pub fn opening(
        dealer_id: impl Into<String>,
        msisdn: impl Into<String>,
        mpin: impl Into<String>,
        balance: i64,
        status: impl Into<String>,
    ) -> Self {
        Self {
            dealer_id: dealer_id.into(),
            msisdn: msisdn.into(),
            mpin: mpin.into(),
            balance,
            status: status.into(),
            trans_amount: 0,
            trans_type: String::new(),
            remarks: String::new(),
            timestamp: unset_timestamp(),
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// One accepted write against an asset key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "TxID")]
    pub tx_id: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
}
