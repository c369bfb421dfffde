//! Error types for ledger operations.

use std::io;

use flagtally_types::VoteKey;
use thiserror::Error;

/// Errors produced by vote ledger backends.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A record already occupies this `(item, user, category)` key.
    #[error("vote already recorded: {0}")]
    Duplicate(VoteKey),

    /// The backend cannot serve requests (poisoned lock, closed handle).
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// I/O error from the log file.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The vote log is damaged somewhere other than its tail.
    #[error("vote log corrupt at byte {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    /// Encoding or decoding of a stored record failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Any SQLite failure other than a uniqueness violation.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The ledger configuration could not be read or is invalid.
    #[error("invalid ledger config: {0}")]
    Config(String),
}

impl LedgerError {
    /// Returns `true` for the duplicate-key outcome.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, LedgerError::Duplicate(_))
    }
}

/// Convenience type alias for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
