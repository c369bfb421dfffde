//! The [`VoteLedger`] trait defining the ledger storage interface.

use flagtally_types::{VoteKey, VoteRecord};

use crate::error::Result;
use crate::filter::VoteFilter;

/// Append-only store of vote records shared by every vote category.
///
/// All implementations must satisfy these invariants:
/// - At most one record exists per [`VoteKey`]. The duplicate check and the
///   append happen as one atomic step; a losing concurrent insert fails with
///   [`LedgerError::Duplicate`](crate::LedgerError::Duplicate).
/// - Records are never updated or deleted through this interface.
/// - A `count` or `list` observes every insert that returned before it began.
/// - Storage failures are propagated, never silently dropped.
pub trait VoteLedger: Send + Sync {
    /// Append a record for `key`, stamped with the current time.
    fn insert(&self, key: &VoteKey) -> Result<VoteRecord>;

    /// Number of records matching `filter`.
    fn count(&self, filter: &VoteFilter) -> Result<u64>;

    /// Records matching `filter`, in insertion order.
    fn list(&self, filter: &VoteFilter) -> Result<Vec<VoteRecord>>;

    /// Whether a record occupies `key`.
    fn exists(&self, key: &VoteKey) -> Result<bool> {
        Ok(self.count(&VoteFilter::from(key))? > 0)
    }
}
