use crate::config::LedgerConfig;
use crate::contract::{AssetContract, CreateAsset, TxContext, UpdateAsset};
use crate::core::{Asset, HistoryEntry, LedgerError, Operation, Result, TxTimestamp};
use crate::storage::{Journal, WorldState};
use crate::transaction::{MonotonicClock, ReadWriteSet, TransactionId, TxHeader, TxSimulator};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// A mutating contract call, submitted for commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    InitLedger,
    CreateAsset(CreateAsset),
    UpdateAsset(UpdateAsset),
}

impl ContractCall {
    pub fn operation(&self) -> Operation {
        match self {
            ContractCall::InitLedger => Operation::InitLedger,
            ContractCall::CreateAsset(_) => Operation::CreateAsset,
            ContractCall::UpdateAsset(_) => Operation::UpdateAsset,
        }
    }
}

/// Outcome of a committed submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitReceipt {
    pub tx_id: TransactionId,
    pub timestamp: TxTimestamp,
    /// Height of the block holding the writes, `None` when nothing was written
    pub block: Option<u64>,
}

/// The asset ledger: world state, commit clock and optional journal behind
/// one submit/evaluate entry point.
///
/// Submitted calls are simulated against committed state under a shared
/// lock, then validated and applied under an exclusive one. A call whose
/// read set went stale in between is rejected with
/// [`LedgerError::CommitRejected`] and leaves no trace.
pub struct Ledger {
    world: RwLock<WorldState>,
    journal: Option<Mutex<Journal>>,
    clock: MonotonicClock,
    contract: AssetContract,
}

impl Ledger {
    pub fn in_memory() -> Self {
        Self {
            world: RwLock::new(WorldState::new()),
            journal: None,
            clock: MonotonicClock::new(),
            contract: AssetContract::new(),
        }
    }

    /// Open a ledger, replaying the journal when one is configured.
    pub fn open(config: &LedgerConfig) -> Result<Self> {
        let mut world = WorldState::new();
        let clock = MonotonicClock::new();

        let journal = match &config.data_dir {
            Some(data_dir) if config.is_journaled() => {
                let mut journal =
                    Journal::open(data_dir, config.durability).map_err(LedgerError::Journal)?;
                let blocks = journal.recover().map_err(LedgerError::Journal)?;
                for block in &blocks {
                    world.apply(block).map_err(LedgerError::Journal)?;
                    clock.observe(block.timestamp);
                }
                info!(
                    path = %journal.path().display(),
                    durability = %journal.durability_mode(),
                    blocks = blocks.len(),
                    keys = world.key_count(),
                    "ledger recovered from journal"
                );
                Some(Mutex::new(journal))
            }
            _ => None,
        };

        Ok(Self {
            world: RwLock::new(world),
            journal,
            clock,
            contract: AssetContract::new(),
        })
    }

    pub fn is_journaled(&self) -> bool {
        self.journal.is_some()
    }

    /// Simulate `call` and commit its writes.
    pub async fn submit(&self, call: ContractCall) -> Result<CommitReceipt> {
        let op = call.operation();
        debug_assert!(op.is_mutation());

        let (header, rw_set) = {
            let world = self.world.read().await;
            let header = self.clock.issue();
            let simulator = TxSimulator::new(&world);
            if let Err(err) = self.execute(&TxContext::new(&simulator, &header), call) {
                debug!(%op, tx_id = %header.tx_id, error = %err, "transaction failed during simulation");
                return Err(err);
            }
            (header, simulator.into_rw_set())
        };

        self.commit(op, header, rw_set).await
    }

    pub async fn init_ledger(&self) -> Result<CommitReceipt> {
        self.submit(ContractCall::InitLedger).await
    }

    pub async fn create_asset(&self, request: CreateAsset) -> Result<CommitReceipt> {
        self.submit(ContractCall::CreateAsset(request)).await
    }

    pub async fn update_asset(&self, request: UpdateAsset) -> Result<CommitReceipt> {
        self.submit(ContractCall::UpdateAsset(request)).await
    }

    pub async fn read_asset(&self, msisdn: &str) -> Result<Asset> {
        self.evaluate(|contract, ctx| contract.read_asset(ctx, msisdn))
            .await
    }

    pub async fn asset_exists(&self, msisdn: &str) -> Result<bool> {
        self.evaluate(|contract, ctx| contract.asset_exists(ctx, msisdn))
            .await
    }

    pub async fn asset_history(&self, msisdn: &str) -> Result<Vec<HistoryEntry>> {
        self.evaluate(|contract, ctx| contract.get_asset_history(ctx, msisdn))
            .await
    }

    /// Number of committed blocks.
    pub async fn height(&self) -> u64 {
        self.world.read().await.height()
    }

    /// Whether no asset has been written yet.
    pub async fn is_empty(&self) -> bool {
        self.world.read().await.is_empty()
    }

    /// History cursors currently held open against world state.
    pub async fn open_history_cursors(&self) -> usize {
        self.world.read().await.open_cursors()
    }

    fn execute(&self, ctx: &TxContext<'_>, call: ContractCall) -> Result<()> {
        match call {
            ContractCall::InitLedger => self.contract.init_ledger(ctx).map(|_| ()),
            ContractCall::CreateAsset(request) => self.contract.create_asset(ctx, request),
            ContractCall::UpdateAsset(request) => {
                self.contract.update_asset(ctx, request).map(|_| ())
            }
        }
    }

    /// Run a read-only contract call against committed state. Nothing it
    /// writes is kept.
    async fn evaluate<T>(
        &self,
        query: impl FnOnce(&AssetContract, &TxContext<'_>) -> Result<T>,
    ) -> Result<T> {
        let world = self.world.read().await;
        let header = self.clock.issue();
        let simulator = TxSimulator::new(&world);
        let ctx = TxContext::new(&simulator, &header);
        query(&self.contract, &ctx)
    }

    async fn commit(
        &self,
        op: Operation,
        header: TxHeader,
        rw_set: ReadWriteSet,
    ) -> Result<CommitReceipt> {
        if rw_set.is_read_only() {
            return Ok(CommitReceipt {
                tx_id: header.tx_id,
                timestamp: header.timestamp,
                block: None,
            });
        }

        let mut world = self.world.write().await;
        if let Some(key) = rw_set.conflicting_key(&world, &header) {
            warn!(%op, tx_id = %header.tx_id, %key, "transaction invalidated by a concurrent commit");
            return Err(LedgerError::CommitRejected {
                tx_id: header.tx_id.to_string(),
                key,
            });
        }

        let height = world.height() + 1;
        let block = rw_set.into_block(height, &header);
        let commit_failed = |source| LedgerError::CommitFailed {
            tx_id: header.tx_id.to_string(),
            source,
        };

        if let Some(journal) = &self.journal {
            journal.lock().await.append(&block).map_err(commit_failed)?;
        }
        world.apply(&block).map_err(commit_failed)?;

        info!(
            %op,
            block = height,
            tx_id = %header.tx_id,
            writes = block.writes.len(),
            "block committed"
        );
        Ok(CommitReceipt {
            tx_id: header.tx_id,
            timestamp: header.timestamp,
            block: Some(height),
        })
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::in_memory()
    }
}
