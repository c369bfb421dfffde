//! In-memory vote ledger for tests and embedding.
//!
//! [`InMemoryVoteLedger`] keeps every record in a `Vec` with a unique-key
//! index, all behind a single `RwLock`. Data is lost when the ledger is
//! dropped. The same state type backs [`WalVoteLedger`](crate::WalVoteLedger)
//! after replay.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use flagtally_types::{ItemId, RecordId, VoteKey, VoteRecord};
use tracing::debug;

use crate::error::{LedgerError, Result};
use crate::filter::VoteFilter;
use crate::traits::VoteLedger;

/// Indexed record set shared by the in-memory and WAL backends.
#[derive(Debug, Default)]
pub(crate) struct LedgerState {
    records: Vec<VoteRecord>,
    keys: HashSet<VoteKey>,
    by_item: HashMap<ItemId, Vec<usize>>,
    last_id: u64,
}

impl LedgerState {
    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn contains(&self, key: &VoteKey) -> bool {
        self.keys.contains(key)
    }

    /// Build the record the next insert of `key` would append.
    ///
    /// Timestamps never go backwards relative to the previous record.
    pub(crate) fn next_record(&self, key: &VoteKey) -> Result<VoteRecord> {
        if self.contains(key) {
            return Err(LedgerError::Duplicate(*key));
        }

        let now = Utc::now();
        let created_at = self
            .records
            .last()
            .map_or(now, |last| now.max(last.created_at));

        Ok(VoteRecord {
            id: RecordId(self.last_id + 1),
            item: key.item,
            user: key.user,
            category: key.category,
            created_at,
        })
    }

    pub(crate) fn push(&mut self, record: VoteRecord) -> Result<()> {
        let key = record.key();
        if self.contains(&key) {
            return Err(LedgerError::Duplicate(key));
        }

        let index = self.records.len();
        self.last_id = self.last_id.max(record.id.0);
        self.keys.insert(key);
        self.by_item.entry(record.item).or_default().push(index);
        self.records.push(record);
        Ok(())
    }

    /// Records matching `filter`, in insertion order.
    pub(crate) fn select<'a>(
        &'a self,
        filter: &'a VoteFilter,
    ) -> impl Iterator<Item = &'a VoteRecord> + 'a {
        // An item filter narrows the scan to that item's rows.
        let scoped: Option<&'a [usize]> = filter.item.map(|item| {
            self.by_item
                .get(&item)
                .map(Vec::as_slice)
                .unwrap_or(&[])
        });
        let all = scoped.is_none().then(|| self.records.iter());

        scoped
            .into_iter()
            .flatten()
            .map(move |&index| &self.records[index])
            .chain(all.into_iter().flatten())
            .filter(move |record| filter.matches(record))
    }
}

/// An in-memory implementation of [`VoteLedger`].
#[derive(Debug, Default)]
pub struct InMemoryVoteLedger {
    inner: RwLock<LedgerState>,
}

impl InMemoryVoteLedger {
    /// Create a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all categories.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, LedgerState>> {
        self.inner
            .read()
            .map_err(|_| LedgerError::Unavailable("ledger read lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, LedgerState>> {
        self.inner
            .write()
            .map_err(|_| LedgerError::Unavailable("ledger write lock poisoned".into()))
    }
}

impl VoteLedger for InMemoryVoteLedger {
    fn insert(&self, key: &VoteKey) -> Result<VoteRecord> {
        let mut state = self.write()?;
        let record = state.next_record(key)?;
        state.push(record.clone())?;

        debug!(id = record.id.0, key = %key, "vote recorded");
        Ok(record)
    }

    fn count(&self, filter: &VoteFilter) -> Result<u64> {
        let state = self.read()?;
        Ok(state.select(filter).count() as u64)
    }

    fn list(&self, filter: &VoteFilter) -> Result<Vec<VoteRecord>> {
        let state = self.read()?;
        Ok(state.select(filter).cloned().collect())
    }
}
