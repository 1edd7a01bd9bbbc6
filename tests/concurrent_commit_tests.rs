/// Concurrent commit tests
///
/// Concurrent submits against one ledger either commit or are rejected as
/// stale; history stays consistent with what committed.
/// Run with: cargo test --test concurrent_commit_tests

use assetledger::{CreateAsset, Ledger, LedgerError, UpdateAsset};
use std::sync::Arc;

fn update_request(msisdn: &str, balance: i64) -> UpdateAsset {
    UpdateAsset {
        msisdn: msisdn.to_string(),
        balance: balance.to_string(),
        status: "Active".to_string(),
        trans_type: "Credit".to_string(),
        remarks: format!("set to {balance}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_on_one_key() {
    let ledger = Arc::new(Ledger::in_memory());
    ledger.init_ledger().await.unwrap();

    let mut handles = vec![];
    for task_id in 0..8i64 {
        let ledger = Arc::clone(&ledger);
        handles.push(tokio::spawn(async move {
            let mut committed: usize = 0;
            for i in 0..10 {
                match ledger
                    .update_asset(update_request("1234567890", task_id * 100 + i))
                    .await
                {
                    Ok(_) => committed += 1,
                    Err(LedgerError::CommitRejected { key, .. }) => {
                        assert_eq!(key, "1234567890");
                    }
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
            committed
        }));
    }

    let mut committed = 0;
    for handle in handles {
        committed += handle.await.unwrap();
    }
    assert!(committed > 0);

    let history = ledger.asset_history("1234567890").await.unwrap();
    assert_eq!(history.len(), committed + 1);
    assert!(history.windows(2).all(|pair| pair[0].timestamp > pair[1].timestamp));

    let asset = ledger.read_asset("1234567890").await.unwrap();
    assert_eq!(asset.timestamp, history[0].timestamp);
    assert_eq!(ledger.height().await, committed as u64 + 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_of_one_key_admit_exactly_one() {
    let ledger = Arc::new(Ledger::in_memory());

    let mut handles = vec![];
    for task_id in 0..8 {
        let ledger = Arc::clone(&ledger);
        handles.push(tokio::spawn(async move {
            ledger
                .create_asset(CreateAsset {
                    dealer_id: format!("D{task_id}"),
                    msisdn: "5559990000".to_string(),
                    mpin: "0000".to_string(),
                    balance: task_id,
                    status: "Active".to_string(),
                    trans_type: String::new(),
                    remarks: String::new(),
                })
                .await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(LedgerError::AlreadyExists { .. }) | Err(LedgerError::CommitRejected { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(ledger.asset_history("5559990000").await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reads_run_alongside_writes() {
    let ledger = Arc::new(Ledger::in_memory());
    ledger.init_ledger().await.unwrap();

    let writer = {
        let ledger = Arc::clone(&ledger);
        tokio::spawn(async move {
            for i in 0..50 {
                ledger
                    .update_asset(update_request("9876543210", i))
                    .await
                    .unwrap();
            }
        })
    };

    let mut readers = vec![];
    for _ in 0..4 {
        let ledger = Arc::clone(&ledger);
        readers.push(tokio::spawn(async move {
            for _ in 0..50 {
                let asset = ledger.read_asset("9876543210").await.unwrap();
                assert_eq!(asset.msisdn, "9876543210");
                ledger.asset_history("9876543210").await.unwrap();
            }
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
    assert_eq!(ledger.asset_history("9876543210").await.unwrap().len(), 51);
    assert_eq!(ledger.open_history_cursors().await, 0);
}
