use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::memory::InMemoryVoteLedger;
use crate::sqlite::SqliteVoteLedger;
use crate::traits::VoteLedger;
use crate::wal::{SyncMode, WalVoteLedger};

/// Storage engine behind the vote ledger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    /// Process-local, lost on exit.
    Memory,
    /// Append-only log file.
    #[default]
    Wal,
    /// SQLite database file.
    Sqlite,
}

impl fmt::Display for LedgerBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LedgerBackend::Memory => "memory",
            LedgerBackend::Wal => "wal",
            LedgerBackend::Sqlite => "sqlite",
        };
        f.write_str(name)
    }
}

/// Configuration for opening a vote ledger.
///
/// Every field has a default, so an empty TOML document is a valid config.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Which storage engine to use.
    pub backend: LedgerBackend,
    /// Log or database file. Ignored by the memory backend.
    pub path: PathBuf,
    /// Sync strategy for the WAL backend.
    pub sync: SyncMode,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::default(),
            path: PathBuf::from("flagtally.wal"),
            sync: SyncMode::default(),
        }
    }
}

impl LedgerConfig {
    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| LedgerError::Config(e.to_string()))
    }

    /// Read and parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }
}

/// Open the ledger described by `config`.
pub fn open_ledger(config: &LedgerConfig) -> Result<Arc<dyn VoteLedger>> {
    let ledger: Arc<dyn VoteLedger> = match config.backend {
        LedgerBackend::Memory => Arc::new(InMemoryVoteLedger::new()),
        LedgerBackend::Wal => Arc::new(WalVoteLedger::open(&config.path, config.sync)?),
        LedgerBackend::Sqlite => Arc::new(SqliteVoteLedger::open(&config.path)?),
    };
    Ok(ledger)
}
