use super::context::TxContext;
use crate::core::{Asset, HistoryEntry, LedgerError, Operation, Result};
use crate::storage::HistoryCursor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Input of `CreateAsset`, shaped like the asset wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateAsset {
    #[serde(rename = "DealerID")]
    pub dealer_id: String,
    #[serde(rename = "MSISDN")]
    pub msisdn: String,
    #[serde(rename = "MPIN")]
    pub mpin: String,
    pub balance: i64,
    pub status: String,
    #[serde(default)]
    pub trans_type: String,
    #[serde(default)]
    pub remarks: String,
}

/// Input of `UpdateAsset`. The balance arrives as text and is parsed by the
/// contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateAsset {
    pub msisdn: String,
    pub balance: String,
    pub status: String,
    pub trans_type: String,
    pub remarks: String,
}

/// Starter assets written by `InitLedger`.
pub fn seed_assets() -> Vec<Asset> {
    vec![
        Asset::opening("D001", "1234567890", "1234", 1000, "Active"),
        Asset::opening("D002", "9876543210", "5678", 1500, "Active"),
    ]
}

/// The asset contract. Stateless: every call re-reads world state through
/// the context it is given.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssetContract;

impl AssetContract {
    pub fn new() -> Self {
        Self
    }

    /// Write the seed assets, overwriting whatever is stored under their keys.
    pub fn init_ledger(&self, ctx: &TxContext<'_>) -> Result<usize> {
        let op = Operation::InitLedger;
        let assets = seed_assets();
        for asset in &assets {
            put_asset(ctx, op, asset)?;
        }
        debug!(count = assets.len(), "seeded starter assets");
        Ok(assets.len())
    }

    pub fn create_asset(&self, ctx: &TxContext<'_>, request: CreateAsset) -> Result<()> {
        let op = Operation::CreateAsset;
        let key = request.msisdn;

        let exists = exists_for(ctx, op, &key).map_err(|source| {
            LedgerError::ExistenceCheckFailed {
                op,
                key: key.clone(),
                source: Box::new(source),
            }
        })?;
        if exists {
            return Err(LedgerError::AlreadyExists { op, key });
        }

        if !request.trans_type.is_empty() || !request.remarks.is_empty() {
            debug!(msisdn = %key, "ignoring transaction type and remarks on create");
        }

        let mut asset = Asset::opening(
            request.dealer_id,
            key,
            request.mpin,
            request.balance,
            request.status,
        );
        asset.timestamp = commit_time(ctx, op, &asset.msisdn)?;

        put_asset(ctx, op, &asset)?;
        debug!(msisdn = %asset.msisdn, balance = asset.balance, "asset created");
        Ok(())
    }

    pub fn update_asset(&self, ctx: &TxContext<'_>, request: UpdateAsset) -> Result<Asset> {
        let op = Operation::UpdateAsset;
        debug!(
            msisdn = %request.msisdn,
            balance = %request.balance,
            status = %request.status,
            trans_type = %request.trans_type,
            "updating asset"
        );

        let mut asset = read_for(ctx, op, &request.msisdn)?;

        let new_balance: i64 = request.balance.parse().map_err(|e: std::num::ParseIntError| {
            LedgerError::InvalidBalanceFormat {
                op,
                key: request.msisdn.clone(),
                input: request.balance.clone(),
                reason: e.to_string(),
            }
        })?;

        let previous_balance = asset.balance;
        let delta = new_balance.checked_sub(previous_balance).ok_or_else(|| {
            LedgerError::InvalidBalanceFormat {
                op,
                key: request.msisdn.clone(),
                input: request.balance.clone(),
                reason: format!("difference from current balance {previous_balance} overflows"),
            }
        })?;

        asset.trans_amount = delta;
        asset.balance = new_balance;
        asset.status = request.status;
        asset.trans_type = request.trans_type;
        asset.remarks = request.remarks;
        asset.timestamp = commit_time(ctx, op, &asset.msisdn)?;

        put_asset(ctx, op, &asset)?;
        debug!(msisdn = %asset.msisdn, delta, "asset updated");
        Ok(asset)
    }

    pub fn read_asset(&self, ctx: &TxContext<'_>, msisdn: &str) -> Result<Asset> {
        read_for(ctx, Operation::ReadAsset, msisdn)
    }

    pub fn asset_exists(&self, ctx: &TxContext<'_>, msisdn: &str) -> Result<bool> {
        exists_for(ctx, Operation::AssetExists, msisdn)
    }

    /// Committed writes to `msisdn` in the store's history order (newest
    /// first for the in-memory world state). A key that was never written
    /// has an empty history.
    pub fn get_asset_history(&self, ctx: &TxContext<'_>, msisdn: &str) -> Result<Vec<HistoryEntry>> {
        let op = Operation::GetAssetHistory;
        let history_error = |source| LedgerError::HistoryIteration {
            op,
            key: msisdn.to_string(),
            source,
        };

        let cursor = HistoryCursor::open(ctx.store(), msisdn).map_err(history_error)?;
        let mut history = Vec::new();
        for modification in cursor {
            let modification = modification.map_err(history_error)?;
            let timestamp = modification
                .timestamp
                .to_datetime()
                .map_err(|source| LedgerError::Timestamp {
                    op,
                    key: msisdn.to_string(),
                    source,
                })?;
            history.push(HistoryEntry {
                tx_id: modification.tx_id,
                timestamp,
            });
        }
        Ok(history)
    }
}

fn read_for(ctx: &TxContext<'_>, op: Operation, key: &str) -> Result<Asset> {
    let bytes = ctx
        .store()
        .get_state(key)
        .map_err(|source| LedgerError::StoreRead {
            op,
            key: key.to_string(),
            source,
        })?;
    match bytes {
        Some(bytes) if !bytes.is_empty() => {
            Asset::from_bytes(&bytes).map_err(|source| LedgerError::Deserialization {
                op,
                key: key.to_string(),
                source,
            })
        }
        _ => Err(LedgerError::NotFound {
            op,
            key: key.to_string(),
        }),
    }
}

fn exists_for(ctx: &TxContext<'_>, op: Operation, key: &str) -> Result<bool> {
    let bytes = ctx
        .store()
        .get_state(key)
        .map_err(|source| LedgerError::StoreRead {
            op,
            key: key.to_string(),
            source,
        })?;
    Ok(bytes.is_some_and(|b| !b.is_empty()))
}

fn commit_time(ctx: &TxContext<'_>, op: Operation, key: &str) -> Result<DateTime<Utc>> {
    ctx.clock()
        .current_transaction_time()
        .and_then(|timestamp| timestamp.to_datetime())
        .map_err(|source| LedgerError::Timestamp {
            op,
            key: key.to_string(),
            source,
        })
}

fn put_asset(ctx: &TxContext<'_>, op: Operation, asset: &Asset) -> Result<()> {
    let bytes = asset.to_bytes().map_err(|source| LedgerError::Serialization {
        op,
        key: asset.msisdn.clone(),
        source,
    })?;
    ctx.store()
        .put_state(&asset.msisdn, bytes)
        .map_err(|source| LedgerError::StoreWrite {
            op,
            key: asset.msisdn.clone(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{StoreError, StoreResult, TimestampError, TxTimestamp};
    use crate::storage::{HistoryIterator, KeyModification, KeyedStore};
    use crate::transaction::{CommitClock, TransactionId, TxHeader};
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    /// Store double: direct map writes, scripted failures, counted cursors.
    #[derive(Default)]
    struct ScriptedStore {
        values: RefCell<HashMap<String, Vec<u8>>>,
        history: Vec<StoreResult<KeyModification>>,
        fail_get: bool,
        fail_put_after: Option<usize>,
        fail_history_open: bool,
        puts: Cell<usize>,
        open_cursors: Cell<isize>,
    }

    struct ScriptedCursor<'a> {
        items: std::vec::IntoIter<StoreResult<KeyModification>>,
        open: &'a Cell<isize>,
    }

    impl HistoryIterator for ScriptedCursor<'_> {
        fn next_modification(&mut self) -> Option<StoreResult<KeyModification>> {
            self.items.next()
        }

        fn close(&mut self) {
            self.open.set(self.open.get() - 1);
        }
    }

    impl KeyedStore for ScriptedStore {
        fn get_state(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
            if self.fail_get {
                return Err(StoreError::Unavailable("ledger peer down".to_string()));
            }
            Ok(self.values.borrow().get(key).cloned())
        }

        fn put_state(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
            if self.fail_put_after.is_some_and(|limit| self.puts.get() >= limit) {
                return Err(StoreError::IoError("disk full".to_string()));
            }
            self.puts.set(self.puts.get() + 1);
            self.values.borrow_mut().insert(key.to_string(), value);
            Ok(())
        }

        fn history_for_key(&self, _key: &str) -> StoreResult<Box<dyn HistoryIterator + '_>> {
            if self.fail_history_open {
                return Err(StoreError::Unavailable("history index offline".to_string()));
            }
            self.open_cursors.set(self.open_cursors.get() + 1);
            let items: Vec<StoreResult<KeyModification>> = self
                .history
                .iter()
                .map(|item| match item {
                    Ok(m) => Ok(m.clone()),
                    Err(e) => Err(StoreError::Unavailable(e.to_string())),
                })
                .collect();
            Ok(Box::new(ScriptedCursor {
                items: items.into_iter(),
                open: &self.open_cursors,
            }))
        }
    }

    struct BrokenClock;

    impl CommitClock for BrokenClock {
        fn current_transaction_time(&self) -> std::result::Result<TxTimestamp, TimestampError> {
            Err(TimestampError::Unavailable("no proposal header".to_string()))
        }
    }

    fn clock() -> TxHeader {
        TxHeader::new(TransactionId::from("tx-under-test"), TxTimestamp::new(1_700_000_000, 0))
    }

    fn create_request(msisdn: &str, balance: i64) -> CreateAsset {
        CreateAsset {
            dealer_id: "D100".to_string(),
            msisdn: msisdn.to_string(),
            mpin: "4321".to_string(),
            balance,
            status: "Active".to_string(),
            trans_type: "Credit".to_string(),
            remarks: "welcome bonus".to_string(),
        }
    }

    fn update_request(msisdn: &str, balance: &str) -> UpdateAsset {
        UpdateAsset {
            msisdn: msisdn.to_string(),
            balance: balance.to_string(),
            status: "Active".to_string(),
            trans_type: "Credit".to_string(),
            remarks: "top-up".to_string(),
        }
    }

    fn modification(tx_id: &str, timestamp: TxTimestamp) -> KeyModification {
        KeyModification {
            tx_id: tx_id.to_string(),
            timestamp,
        }
    }

    #[test]
    fn test_create_discards_transaction_fields() {
        let store = ScriptedStore::default();
        let header = clock();
        let ctx = TxContext::new(&store, &header);
        let contract = AssetContract::new();

        contract.create_asset(&ctx, create_request("700", 250)).unwrap();

        let asset = contract.read_asset(&ctx, "700").unwrap();
        assert_eq!(asset.balance, 250);
        assert_eq!(asset.trans_amount, 0);
        assert_eq!(asset.trans_type, "");
        assert_eq!(asset.remarks, "");
        assert_eq!(asset.timestamp, header.timestamp.to_datetime().unwrap());
    }

    #[test]
    fn test_create_existing_key_fails() {
        let store = ScriptedStore::default();
        let header = clock();
        let ctx = TxContext::new(&store, &header);
        let contract = AssetContract::new();

        contract.create_asset(&ctx, create_request("700", 250)).unwrap();
        let err = contract.create_asset(&ctx, create_request("700", 999)).unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyExists { op: Operation::CreateAsset, ref key } if key == "700"));
        assert_eq!(contract.read_asset(&ctx, "700").unwrap().balance, 250);
    }

    #[test]
    fn test_create_reports_existence_check_failure() {
        let store = ScriptedStore { fail_get: true, ..Default::default() };
        let header = clock();
        let ctx = TxContext::new(&store, &header);

        let err = AssetContract::new()
            .create_asset(&ctx, create_request("700", 1))
            .unwrap_err();
        match err {
            LedgerError::ExistenceCheckFailed { op, key, source } => {
                assert_eq!(op, Operation::CreateAsset);
                assert_eq!(key, "700");
                assert!(matches!(*source, LedgerError::StoreRead { .. }));
            }
            other => panic!("expected existence check failure, got {other:?}"),
        }
        assert_eq!(store.puts.get(), 0);
    }

    #[test]
    fn test_create_reports_clock_failure_without_writing() {
        let store = ScriptedStore::default();
        let ctx = TxContext::new(&store, &BrokenClock);

        let err = AssetContract::new()
            .create_asset(&ctx, create_request("700", 1))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Timestamp { op: Operation::CreateAsset, .. }));
        assert_eq!(store.puts.get(), 0);
    }

    #[test]
    fn test_create_rejects_unconvertible_timestamp() {
        let store = ScriptedStore::default();
        let header = TxHeader::new(TransactionId::from("t"), TxTimestamp::new(0, -5));
        let ctx = TxContext::new(&store, &header);

        let err = AssetContract::new()
            .create_asset(&ctx, create_request("700", 1))
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Timestamp { source: TimestampError::NanosOutOfRange(-5), .. }
        ));
    }

    #[test]
    fn test_create_reports_store_write_failure() {
        let store = ScriptedStore { fail_put_after: Some(0), ..Default::default() };
        let header = clock();
        let ctx = TxContext::new(&store, &header);

        let err = AssetContract::new()
            .create_asset(&ctx, create_request("700", 1))
            .unwrap_err();
        assert!(matches!(err, LedgerError::StoreWrite { op: Operation::CreateAsset, .. }));
    }

    #[test]
    fn test_update_delta_uses_previous_balance() {
        let store = ScriptedStore::default();
        let header = clock();
        let ctx = TxContext::new(&store, &header);
        let contract = AssetContract::new();
        contract.create_asset(&ctx, create_request("700", 1000)).unwrap();

        let updated = contract.update_asset(&ctx, update_request("700", "500")).unwrap();
        assert_eq!(updated.balance, 500);
        assert_eq!(updated.trans_amount, -500);
        assert_eq!(updated.trans_type, "Credit");
        assert_eq!(updated.remarks, "top-up");

        let updated = contract.update_asset(&ctx, update_request("700", "+800")).unwrap();
        assert_eq!(updated.trans_amount, 300);
        assert_eq!(contract.read_asset(&ctx, "700").unwrap(), updated);
    }

    #[test]
    fn test_update_rejects_non_numeric_balance() {
        let store = ScriptedStore::default();
        let header = clock();
        let ctx = TxContext::new(&store, &header);
        let contract = AssetContract::new();
        contract.create_asset(&ctx, create_request("700", 1000)).unwrap();
        let before = contract.read_asset(&ctx, "700").unwrap();

        for input in ["abc", "", "12.5", " 500"] {
            let err = contract.update_asset(&ctx, update_request("700", input)).unwrap_err();
            assert!(
                matches!(err, LedgerError::InvalidBalanceFormat { input: ref got, .. } if got == input),
                "unexpected error for {input:?}: {err}"
            );
        }
        assert_eq!(contract.read_asset(&ctx, "700").unwrap(), before);
        assert_eq!(store.puts.get(), 1);
    }

    #[test]
    fn test_update_rejects_overflowing_delta() {
        let store = ScriptedStore::default();
        let header = clock();
        let ctx = TxContext::new(&store, &header);
        let contract = AssetContract::new();
        contract.create_asset(&ctx, create_request("700", -10)).unwrap();

        let err = contract
            .update_asset(&ctx, update_request("700", &i64::MAX.to_string()))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidBalanceFormat { .. }));
    }

    #[test]
    fn test_update_missing_asset() {
        let store = ScriptedStore::default();
        let header = clock();
        let ctx = TxContext::new(&store, &header);

        let err = AssetContract::new()
            .update_asset(&ctx, update_request("404", "abc"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { op: Operation::UpdateAsset, .. }));
    }

    #[test]
    fn test_read_classifies_failures() {
        let store = ScriptedStore::default();
        store.values.borrow_mut().insert("empty".to_string(), Vec::new());
        store.values.borrow_mut().insert("garbage".to_string(), b"not json".to_vec());
        let header = clock();
        let ctx = TxContext::new(&store, &header);
        let contract = AssetContract::new();

        assert!(matches!(
            contract.read_asset(&ctx, "missing"),
            Err(LedgerError::NotFound { op: Operation::ReadAsset, .. })
        ));
        assert!(matches!(
            contract.read_asset(&ctx, "empty"),
            Err(LedgerError::NotFound { .. })
        ));
        assert!(matches!(
            contract.read_asset(&ctx, "garbage"),
            Err(LedgerError::Deserialization { .. })
        ));
        assert!(!contract.asset_exists(&ctx, "missing").unwrap());
        assert!(!contract.asset_exists(&ctx, "empty").unwrap());
        assert!(contract.asset_exists(&ctx, "garbage").unwrap());

        let failing = ScriptedStore { fail_get: true, ..Default::default() };
        let ctx = TxContext::new(&failing, &header);
        assert!(matches!(
            contract.read_asset(&ctx, "x"),
            Err(LedgerError::StoreRead { op: Operation::ReadAsset, .. })
        ));
        assert!(matches!(
            contract.asset_exists(&ctx, "x"),
            Err(LedgerError::StoreRead { op: Operation::AssetExists, .. })
        ));
    }

    #[test]
    fn test_init_ledger_writes_seed_set_and_overwrites() {
        let store = ScriptedStore::default();
        let header = clock();
        let ctx = TxContext::new(&store, &header);
        let contract = AssetContract::new();

        contract.update_asset(&ctx, update_request("1234567890", "5")).unwrap_err();
        assert_eq!(contract.init_ledger(&ctx).unwrap(), 2);
        contract.update_asset(&ctx, update_request("1234567890", "5")).unwrap();
        assert_eq!(contract.init_ledger(&ctx).unwrap(), 2);

        for seed in seed_assets() {
            assert_eq!(contract.read_asset(&ctx, &seed.msisdn).unwrap(), seed);
        }
    }

    #[test]
    fn test_init_ledger_stops_at_first_write_failure() {
        let store = ScriptedStore { fail_put_after: Some(1), ..Default::default() };
        let header = clock();
        let ctx = TxContext::new(&store, &header);

        let err = AssetContract::new().init_ledger(&ctx).unwrap_err();
        assert!(matches!(err, LedgerError::StoreWrite { op: Operation::InitLedger, ref key, .. } if key == "9876543210"));
        assert_eq!(store.values.borrow().len(), 1);
    }

    #[test]
    fn test_history_maps_entries_and_closes_cursor() {
        let store = ScriptedStore {
            history: vec![
                Ok(modification("tx2", TxTimestamp::new(200, 0))),
                Ok(modification("tx1", TxTimestamp::new(100, 0))),
            ],
            ..Default::default()
        };
        let header = clock();
        let ctx = TxContext::new(&store, &header);

        let history = AssetContract::new().get_asset_history(&ctx, "700").unwrap();
        let ids: Vec<&str> = history.iter().map(|e| e.tx_id.as_str()).collect();
        assert_eq!(ids, vec!["tx2", "tx1"]);
        assert_eq!(history[1].timestamp.timestamp(), 100);
        assert_eq!(store.open_cursors.get(), 0);
    }

    #[test]
    fn test_history_iteration_failure_closes_cursor() {
        let store = ScriptedStore {
            history: vec![
                Ok(modification("tx1", TxTimestamp::new(100, 0))),
                Err(StoreError::Unavailable("cursor expired".to_string())),
                Ok(modification("tx0", TxTimestamp::new(50, 0))),
            ],
            ..Default::default()
        };
        let header = clock();
        let ctx = TxContext::new(&store, &header);

        let err = AssetContract::new().get_asset_history(&ctx, "700").unwrap_err();
        assert!(matches!(err, LedgerError::HistoryIteration { op: Operation::GetAssetHistory, .. }));
        assert_eq!(store.open_cursors.get(), 0);
    }

    #[test]
    fn test_history_bad_timestamp_closes_cursor() {
        let store = ScriptedStore {
            history: vec![Ok(modification("tx1", TxTimestamp::new(i64::MAX, 0)))],
            ..Default::default()
        };
        let header = clock();
        let ctx = TxContext::new(&store, &header);

        let err = AssetContract::new().get_asset_history(&ctx, "700").unwrap_err();
        assert!(matches!(err, LedgerError::Timestamp { op: Operation::GetAssetHistory, .. }));
        assert_eq!(store.open_cursors.get(), 0);
    }

    #[test]
    fn test_history_open_failure() {
        let store = ScriptedStore { fail_history_open: true, ..Default::default() };
        let header = clock();
        let ctx = TxContext::new(&store, &header);

        let err = AssetContract::new().get_asset_history(&ctx, "700").unwrap_err();
        assert!(matches!(err, LedgerError::HistoryIteration { .. }));
        assert_eq!(store.open_cursors.get(), 0);
    }
}
