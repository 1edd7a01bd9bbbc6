//! Write-ahead journal of committed blocks

use crate::core::{StoreError, StoreResult, TxTimestamp};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{error, warn};

// ============================================================================
// Block Records
// ============================================================================

/// A single key write inside a committed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvWrite {
    pub key: String,
    pub value: Vec<u8>,
}

/// One committed transaction. Blocks hold exactly one transaction and are
/// numbered from 1 without gaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub block: u64,
    pub tx_id: String,
    pub timestamp: TxTimestamp,
    pub writes: Vec<KvWrite>,
}

// ============================================================================
// Durability Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    Sync,
    #[default]
    Async,
    None,
}

impl FromStr for DurabilityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sync" => Ok(DurabilityMode::Sync),
            "async" => Ok(DurabilityMode::Async),
            "none" => Ok(DurabilityMode::None),
            other => Err(format!(
                "unknown durability mode '{other}' (expected sync, async or none)"
            )),
        }
    }
}

impl std::fmt::Display for DurabilityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DurabilityMode::Sync => write!(f, "sync"),
            DurabilityMode::Async => write!(f, "async"),
            DurabilityMode::None => write!(f, "none"),
        }
    }
}

// ============================================================================
// Journal
// ============================================================================

/// Append-only file of length-prefixed MessagePack block frames.
///
/// A frame is written with a single `write_all` straight to the file. When an
/// append fails the file is cut back to the last complete frame; if that cut
/// fails too the journal is poisoned and refuses further appends.
pub struct Journal {
    path: PathBuf,
    file: Option<File>,
    durability_mode: DurabilityMode,
    /// Byte length of the complete frames on disk
    committed_len: u64,
    poisoned: bool,
    appended: u64,
}

impl Journal {
    pub const FILE_NAME: &'static str = "ledger.wal";

    pub fn open<P: AsRef<Path>>(data_dir: P, durability_mode: DurabilityMode) -> StoreResult<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)
            .map_err(|e| StoreError::IoError(format!("Failed to create journal directory: {}", e)))?;
        let path = data_dir.join(Self::FILE_NAME);

        let (file, committed_len) = if durability_mode != DurabilityMode::None {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| StoreError::IoError(format!("Failed to open journal: {}", e)))?;
            let len = file
                .metadata()
                .map_err(|e| StoreError::IoError(format!("Failed to stat journal: {}", e)))?
                .len();
            (Some(file), len)
        } else {
            (None, 0)
        };

        Ok(Self {
            path,
            file,
            durability_mode,
            committed_len,
            poisoned: false,
            appended: 0,
        })
    }

    pub fn append(&mut self, block: &BlockRecord) -> StoreResult<()> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(());
        }
        if self.poisoned {
            return Err(StoreError::JournalPoisoned(self.path.display().to_string()));
        }

        let frame = encode_frame(block)?;
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| StoreError::IoError("Journal file not initialized".to_string()))?;

        if let Err(err) = write_frame(file, &frame, self.durability_mode) {
            self.rollback();
            return Err(err);
        }

        self.committed_len += frame.len() as u64;
        self.appended += 1;
        Ok(())
    }

    /// Cut the file back to the last complete frame after a failed append.
    fn rollback(&mut self) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let restored = file.set_len(self.committed_len).and_then(|()| {
            if self.durability_mode == DurabilityMode::Sync {
                file.sync_all()
            } else {
                Ok(())
            }
        });
        match restored {
            Ok(()) => warn!(
                path = %self.path.display(),
                len = self.committed_len,
                "rolled back failed journal append"
            ),
            Err(e) => {
                self.poisoned = true;
                error!(
                    path = %self.path.display(),
                    error = %e,
                    "journal rollback failed, refusing further appends"
                );
            }
        }
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Read every complete frame. A torn frame at the tail is dropped.
    pub fn read_all(&self) -> StoreResult<Vec<BlockRecord>> {
        self.scan().map(|(blocks, _)| blocks)
    }

    /// Read every complete frame and cut a torn tail off the file, so that
    /// later appends start on a frame boundary.
    pub fn recover(&mut self) -> StoreResult<Vec<BlockRecord>> {
        let (blocks, valid_len) = self.scan()?;
        if let Some(file) = self.file.as_mut() {
            let current_len = file
                .metadata()
                .map_err(|e| StoreError::IoError(format!("Failed to stat journal: {}", e)))?
                .len();
            if current_len > valid_len {
                file.set_len(valid_len)
                    .map_err(|e| StoreError::IoError(format!("Failed to truncate journal: {}", e)))?;
                warn!(
                    path = %self.path.display(),
                    dropped_bytes = current_len - valid_len,
                    "truncated torn journal tail"
                );
            }
            self.committed_len = valid_len;
        }
        Ok(blocks)
    }

    /// Decode frames up to the first incomplete one. Returns the blocks and
    /// the byte length of the complete prefix.
    fn scan(&self) -> StoreResult<(Vec<BlockRecord>, u64)> {
        if !self.path.exists() {
            return Ok((Vec::new(), 0));
        }
        let file = File::open(&self.path)
            .map_err(|e| StoreError::IoError(format!("Failed to open journal for reading: {}", e)))?;
        let file_len = file
            .metadata()
            .map_err(|e| StoreError::IoError(format!("Failed to stat journal: {}", e)))?
            .len();
        let mut reader = BufReader::new(file);
        let mut blocks = Vec::new();
        let mut valid_len = 0u64;
        loop {
            let mut len_bytes = [0u8; 4];
            match reader.read_exact(&mut len_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    if valid_len < file_len {
                        warn!(
                            path = %self.path.display(),
                            recovered = blocks.len(),
                            "ignoring torn frame header at journal tail"
                        );
                    }
                    break;
                }
                Err(e) => {
                    return Err(StoreError::IoError(format!(
                        "Failed to read journal frame length: {}",
                        e
                    )));
                }
            }
            let len = u64::from(u32::from_le_bytes(len_bytes));
            // The body must fit in what is left of the file.
            if len > file_len.saturating_sub(valid_len + 4) {
                warn!(
                    path = %self.path.display(),
                    recovered = blocks.len(),
                    frame_len = len,
                    "ignoring torn frame at journal tail"
                );
                break;
            }
            let mut data = vec![0u8; len as usize];
            reader
                .read_exact(&mut data)
                .map_err(|e| StoreError::IoError(format!("Failed to read journal frame: {}", e)))?;
            let block: BlockRecord = rmp_serde::from_slice(&data)
                .map_err(|e| StoreError::Codec(format!("Failed to deserialize journal frame: {}", e)))?;
            blocks.push(block);
            valid_len += 4 + len;
        }
        Ok((blocks, valid_len))
    }

    /// Swap the writer for a read-only handle so every write fails.
    #[cfg(test)]
    pub(crate) fn break_writes(&mut self) -> StoreResult<()> {
        let read_only = File::open(&self.path)
            .map_err(|e| StoreError::IoError(format!("Failed to reopen journal: {}", e)))?;
        self.file = Some(read_only);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn appended(&self) -> u64 {
        self.appended
    }

    pub fn durability_mode(&self) -> DurabilityMode {
        self.durability_mode
    }
}

fn encode_frame(block: &BlockRecord) -> StoreResult<Vec<u8>> {
    let body = rmp_serde::to_vec(block)
        .map_err(|e| StoreError::Codec(format!("Failed to serialize block {}: {}", block.block, e)))?;
    let len = u32::try_from(body.len())
        .map_err(|_| StoreError::Codec(format!("Block {} exceeds the frame size limit", block.block)))?;
    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

fn write_frame(file: &mut File, frame: &[u8], durability_mode: DurabilityMode) -> StoreResult<()> {
    file.write_all(frame)
        .map_err(|e| StoreError::IoError(format!("Failed to write journal: {}", e)))?;
    if durability_mode == DurabilityMode::Sync {
        file.sync_data()
            .map_err(|e| StoreError::IoError(format!("Failed to sync journal: {}", e)))?;
    }
    Ok(())
}
