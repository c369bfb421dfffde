//! Error types for flag operations.

use flagtally_ledger::LedgerError;
use flagtally_types::{ItemId, TypeError, UserId};
use thiserror::Error;

/// Errors that can occur while flagging or counting flags.
#[derive(Debug, Error)]
pub enum FlagError {
    /// The user has already flagged this item.
    ///
    /// Only [`FlagStore::insert`](crate::FlagStore::insert) returns this.
    /// [`FlagService::flag`](crate::FlagService::flag) turns it into an
    /// ordinary already-flagged result.
    #[error("user {user} has already flagged item {item}")]
    AlreadyFlagged { item: ItemId, user: UserId },

    /// A missing or non-positive identifier reached the flag boundary.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The ledger could not be read or written.
    #[error("flag storage unavailable: {0}")]
    StorageUnavailable(#[source] LedgerError),
}

impl From<TypeError> for FlagError {
    fn from(err: TypeError) -> Self {
        FlagError::InvalidInput(err.to_string())
    }
}

/// Convenience type alias for flag operations.
pub type Result<T> = std::result::Result<T, FlagError>;
