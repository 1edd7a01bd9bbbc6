use crate::storage::DurabilityMode;
use std::path::{Path, PathBuf};

/// Ledger configuration
#[derive(Debug, Clone, Default)]
pub struct LedgerConfig {
    /// Directory holding the block journal; purely in-memory when unset
    pub data_dir: Option<PathBuf>,

    /// How hard journal appends are pushed to disk
    pub durability: DurabilityMode,

    /// Run InitLedger on start when the ledger holds no assets
    pub seed_on_start: bool,
}

impl LedgerConfig {
    /// In-memory ledger, nothing journaled
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Journaled ledger rooted at `data_dir`
    pub fn persistent<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: Some(data_dir.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    pub fn durability(mut self, mode: DurabilityMode) -> Self {
        self.durability = mode;
        self
    }

    pub fn seed_on_start(mut self, seed: bool) -> Self {
        self.seed_on_start = seed;
        self
    }

    /// Whether committed blocks are written to a journal
    pub fn is_journaled(&self) -> bool {
        self.data_dir.is_some() && self.durability != DurabilityMode::None
    }
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub ledger: LedgerConfig,
}

impl ServerConfig {
    pub fn new(ledger: LedgerConfig) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            ledger,
        }
    }

    /// Set the host
    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    /// Set the port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}
