//! The [`FlagStore`] trait and its ledger-backed implementation.

use std::sync::Arc;

use flagtally_ledger::{LedgerError, VoteFilter, VoteLedger};
use flagtally_types::{ItemId, RecordId, UserId, VoteCategory, VoteKey};

use crate::error::{FlagError, Result};
use crate::record::FlagRecord;

/// Durable record of flags and their derived counts.
///
/// Implementations must be thread-safe and must guarantee that concurrent
/// `insert` calls for one `(item, user)` pair persist exactly one flag.
pub trait FlagStore: Send + Sync {
    /// Whether `user` has flagged `item`.
    ///
    /// An absent user has never flagged anything; this returns `Ok(false)`
    /// without touching storage.
    fn has_flagged(&self, item: ItemId, user: Option<UserId>) -> Result<bool>;

    /// Persist a new flag.
    ///
    /// Fails with [`FlagError::AlreadyFlagged`] if the pair is already
    /// flagged, including when a concurrent insert won the race.
    fn insert(&self, item: ItemId, user: UserId) -> Result<RecordId>;

    /// Number of flags on `item`.
    fn count_by_item(&self, item: ItemId) -> Result<u64>;

    /// Flags on `item`, oldest first.
    fn records(&self, item: ItemId) -> Result<Vec<FlagRecord>>;
}

/// [`FlagStore`] over a shared [`VoteLedger`], scoped to the flag category.
///
/// Uniqueness comes from the ledger's `(item, user, category)` constraint,
/// so this type adds no locking of its own.
#[derive(Clone)]
pub struct LedgerFlagStore {
    ledger: Arc<dyn VoteLedger>,
}

impl std::fmt::Debug for LedgerFlagStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerFlagStore").finish_non_exhaustive()
    }
}

impl LedgerFlagStore {
    pub fn new(ledger: Arc<dyn VoteLedger>) -> Self {
        Self { ledger }
    }

    /// The underlying ledger.
    pub fn ledger(&self) -> &Arc<dyn VoteLedger> {
        &self.ledger
    }

    fn item_filter(item: ItemId) -> VoteFilter {
        VoteFilter::new().item(item).category(VoteCategory::Flag)
    }
}

impl FlagStore for LedgerFlagStore {
    fn has_flagged(&self, item: ItemId, user: Option<UserId>) -> Result<bool> {
        let Some(user) = user else {
            return Ok(false);
        };
        self.ledger
            .exists(&VoteKey::flag(item, user))
            .map_err(FlagError::StorageUnavailable)
    }

    fn insert(&self, item: ItemId, user: UserId) -> Result<RecordId> {
        match self.ledger.insert(&VoteKey::flag(item, user)) {
            Ok(record) => Ok(record.id),
            Err(LedgerError::Duplicate(_)) => Err(FlagError::AlreadyFlagged { item, user }),
            Err(e) => Err(FlagError::StorageUnavailable(e)),
        }
    }

    fn count_by_item(&self, item: ItemId) -> Result<u64> {
        self.ledger
            .count(&Self::item_filter(item))
            .map_err(FlagError::StorageUnavailable)
    }

    fn records(&self, item: ItemId) -> Result<Vec<FlagRecord>> {
        let votes = self
            .ledger
            .list(&Self::item_filter(item))
            .map_err(FlagError::StorageUnavailable)?;
        Ok(votes.into_iter().filter_map(FlagRecord::from_vote).collect())
    }
}
