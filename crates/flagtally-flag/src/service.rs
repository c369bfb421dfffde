//! The flag use case.

use std::sync::Arc;

use flagtally_ledger::VoteLedger;
use flagtally_types::{ItemId, UserId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{FlagError, Result};
use crate::record::FlagRecord;
use crate::store::{FlagStore, LedgerFlagStore};

/// Outcome of a flag attempt, handed to the presentation layer.
///
/// `already_flagged` is a normal outcome, not an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagResult {
    pub success: bool,
    pub already_flagged: bool,
    pub count: u64,
}

impl FlagResult {
    pub fn flagged(count: u64) -> Self {
        Self {
            success: true,
            already_flagged: false,
            count,
        }
    }

    pub fn already_flagged(count: u64) -> Self {
        Self {
            success: false,
            already_flagged: true,
            count,
        }
    }
}

/// Flag button state of an item as seen by one viewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagStatus {
    pub item: ItemId,
    pub count: u64,
    /// Whether the viewer has flagged the item. Always `false` for
    /// anonymous viewers.
    pub flagged: bool,
}

/// Records flags exactly once per `(item, user)` and reports updated counts.
///
/// The caller resolves authentication: `flag` takes an explicit [`UserId`]
/// and never looks up an ambient current user.
#[derive(Debug)]
pub struct FlagService<S = LedgerFlagStore> {
    store: S,
}

impl FlagService<LedgerFlagStore> {
    /// A service over the flag category of `ledger`.
    pub fn with_ledger(ledger: Arc<dyn VoteLedger>) -> Self {
        Self::new(LedgerFlagStore::new(ledger))
    }
}

impl<S: FlagStore> FlagService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Flag `item` on behalf of `user`.
    ///
    /// Returns `success: true` only when this call persisted the flag. A
    /// prior flag, or a concurrent identical call that won the insert race,
    /// yields `already_flagged: true`. Storage failures are returned as
    /// errors with no count attached.
    pub fn flag(&self, item: ItemId, user: UserId) -> Result<FlagResult> {
        self.try_flag(item, user).inspect_err(|e| {
            warn!(item = %item, user = %user, error = %e, "flag failed");
        })
    }

    /// [`flag`](Self::flag) with raw identifiers. Zero ids are rejected with
    /// [`FlagError::InvalidInput`] before storage is touched.
    pub fn flag_ids(&self, item_id: u64, user_id: u64) -> Result<FlagResult> {
        let item = ItemId::new(item_id)?;
        let user = UserId::new(user_id)?;
        self.flag(item, user)
    }

    /// Current count of `item` and whether `viewer` has flagged it.
    pub fn status(&self, item: ItemId, viewer: Option<UserId>) -> Result<FlagStatus> {
        let flagged = self.store.has_flagged(item, viewer)?;
        let count = self.store.count_by_item(item)?;
        Ok(FlagStatus {
            item,
            count,
            flagged,
        })
    }

    /// Number of flags on `item`.
    pub fn count(&self, item: ItemId) -> Result<u64> {
        self.store.count_by_item(item)
    }

    /// Flags on `item`, oldest first.
    pub fn records(&self, item: ItemId) -> Result<Vec<FlagRecord>> {
        self.store.records(item)
    }

    fn try_flag(&self, item: ItemId, user: UserId) -> Result<FlagResult> {
        if self.store.has_flagged(item, Some(user))? {
            debug!(item = %item, user = %user, "item already flagged by user");
            return Ok(FlagResult::already_flagged(self.store.count_by_item(item)?));
        }

        match self.store.insert(item, user) {
            Ok(id) => {
                let count = self.store.count_by_item(item)?;
                debug!(item = %item, user = %user, id = %id, count, "flag recorded");
                Ok(FlagResult::flagged(count))
            }
            Err(FlagError::AlreadyFlagged { .. }) => {
                debug!(item = %item, user = %user, "lost flag insert race");
                Ok(FlagResult::already_flagged(self.store.count_by_item(item)?))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    use flagtally_ledger::{
        InMemoryVoteLedger, LedgerError, SqliteVoteLedger, SyncMode, VoteFilter, WalVoteLedger,
    };
    use flagtally_types::{RecordId, VoteCategory, VoteKey};
    use proptest::prelude::*;

    use super::*;

    fn item(raw: u64) -> ItemId {
        ItemId::new(raw).unwrap()
    }

    fn user(raw: u64) -> UserId {
        UserId::new(raw).unwrap()
    }

    fn memory_service() -> (Arc<InMemoryVoteLedger>, FlagService) {
        let ledger = Arc::new(InMemoryVoteLedger::new());
        let service = FlagService::with_ledger(ledger.clone());
        (ledger, service)
    }

    fn rows_for(ledger: &dyn VoteLedger, item_id: u64, user_id: u64) -> u64 {
        ledger
            .count(&VoteFilter::from(&VoteKey::flag(item(item_id), user(user_id))))
            .unwrap()
    }

    #[test]
    fn flag_scenarios_in_sequence() {
        let (_, service) = memory_service();

        assert_eq!(service.flag(item(42), user(7)).unwrap(), FlagResult::flagged(1));
        assert_eq!(
            service.flag(item(42), user(7)).unwrap(),
            FlagResult::already_flagged(1)
        );
        assert_eq!(service.flag(item(42), user(9)).unwrap(), FlagResult::flagged(2));
        assert_eq!(service.count(item(42)).unwrap(), 2);
    }

    #[test]
    fn zero_user_is_invalid_input_and_writes_nothing() {
        let (ledger, service) = memory_service();

        let err = service.flag_ids(42, 0).unwrap_err();
        assert!(matches!(err, FlagError::InvalidInput(msg) if msg.contains("user_id")));

        let err = service.flag_ids(0, 7).unwrap_err();
        assert!(matches!(err, FlagError::InvalidInput(msg) if msg.contains("item_id")));

        assert!(ledger.is_empty().unwrap());
    }

    #[test]
    fn repeated_flags_leave_one_row() {
        let (ledger, service) = memory_service();
        let first = service.flag(item(3), user(4)).unwrap();

        for _ in 0..5 {
            let again = service.flag(item(3), user(4)).unwrap();
            assert_eq!(again, FlagResult::already_flagged(first.count));
        }
        assert_eq!(rows_for(&*ledger, 3, 4), 1);
    }

    #[test]
    fn simultaneous_first_flags_split_into_one_win_and_one_duplicate() {
        let (_, service) = memory_service();
        let service = Arc::new(service);
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let service = Arc::clone(&service);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    service.flag(item(100), user(5)).unwrap()
                })
            })
            .collect();
        let mut results: Vec<FlagResult> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        results.sort_by_key(|r| r.already_flagged);

        assert_eq!(
            results,
            vec![FlagResult::flagged(1), FlagResult::already_flagged(1)]
        );
    }

    #[test]
    fn many_threads_many_users_count_each_user_once() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(
            WalVoteLedger::open(&dir.path().join("votes.wal"), SyncMode::default()).unwrap(),
        );
        let service = Arc::new(FlagService::with_ledger(ledger.clone()));
        let barrier = Arc::new(Barrier::new(12));

        // Three threads per user, four users.
        let handles: Vec<_> = (0..12u64)
            .map(|n| {
                let service = Arc::clone(&service);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    service.flag(item(7), user(n % 4 + 1)).unwrap()
                })
            })
            .collect();
        let results: Vec<FlagResult> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.success).count(), 4);
        assert_eq!(results.iter().filter(|r| r.already_flagged).count(), 8);
        assert_eq!(service.count(item(7)).unwrap(), 4);
        for u in 1..=4 {
            assert_eq!(rows_for(&*ledger, 7, u), 1);
        }
    }

    #[test]
    fn sqlite_backed_service_flags_once() {
        let ledger = Arc::new(SqliteVoteLedger::open_in_memory().unwrap());
        let service = FlagService::with_ledger(ledger);

        assert_eq!(service.flag(item(1), user(2)).unwrap(), FlagResult::flagged(1));
        assert_eq!(
            service.flag(item(1), user(2)).unwrap(),
            FlagResult::already_flagged(1)
        );
    }

    #[test]
    fn status_reports_count_and_viewer_state() {
        let (_, service) = memory_service();
        service.flag(item(42), user(7)).unwrap();
        service.flag(item(42), user(9)).unwrap();

        let mine = service.status(item(42), Some(user(7))).unwrap();
        assert_eq!(
            mine,
            FlagStatus {
                item: item(42),
                count: 2,
                flagged: true
            }
        );

        let other = service.status(item(42), Some(user(11))).unwrap();
        assert!(!other.flagged);

        let anonymous = service.status(item(42), None).unwrap();
        assert!(!anonymous.flagged);
        assert_eq!(anonymous.count, 2);
    }

    #[test]
    fn flag_result_serializes_with_camel_case_keys() {
        let json = serde_json::to_value(FlagResult::already_flagged(3)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "success": false, "alreadyFlagged": true, "count": 3 })
        );
    }

    /// A store whose existence check always misses, as if a concurrent
    /// request inserted between check and insert.
    struct RacingStore {
        inner: LedgerFlagStore,
    }

    impl FlagStore for RacingStore {
        fn has_flagged(&self, _item: ItemId, _user: Option<UserId>) -> Result<bool> {
            Ok(false)
        }
        fn insert(&self, item: ItemId, user: UserId) -> Result<RecordId> {
            self.inner.insert(item, user)
        }
        fn count_by_item(&self, item: ItemId) -> Result<u64> {
            self.inner.count_by_item(item)
        }
        fn records(&self, item: ItemId) -> Result<Vec<FlagRecord>> {
            self.inner.records(item)
        }
    }

    #[test]
    fn lost_insert_race_is_reported_as_already_flagged() {
        let ledger = Arc::new(InMemoryVoteLedger::new());
        ledger.insert(&VoteKey::flag(item(100), user(5))).unwrap();
        let service = FlagService::new(RacingStore {
            inner: LedgerFlagStore::new(ledger.clone()),
        });

        let result = service.flag(item(100), user(5)).unwrap();
        assert_eq!(result, FlagResult::already_flagged(1));
        assert_eq!(ledger.len().unwrap(), 1);
    }

    /// A store whose writes fail; counts how often the count is queried.
    #[derive(Default)]
    struct BrokenStore {
        counts: AtomicUsize,
    }

    impl FlagStore for BrokenStore {
        fn has_flagged(&self, _item: ItemId, _user: Option<UserId>) -> Result<bool> {
            Ok(false)
        }
        fn insert(&self, _item: ItemId, _user: UserId) -> Result<RecordId> {
            Err(FlagError::StorageUnavailable(LedgerError::Unavailable(
                "disk full".into(),
            )))
        }
        fn count_by_item(&self, _item: ItemId) -> Result<u64> {
            self.counts.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }
        fn records(&self, _item: ItemId) -> Result<Vec<FlagRecord>> {
            Ok(vec![])
        }
    }

    #[test]
    fn storage_failure_propagates_without_a_count() {
        let service = FlagService::new(BrokenStore::default());

        let err = service.flag(item(1), user(1)).unwrap_err();
        assert!(matches!(
            err,
            FlagError::StorageUnavailable(LedgerError::Unavailable(ref msg)) if msg == "disk full"
        ));
        assert_eq!(service.store().counts.load(Ordering::SeqCst), 0);
    }

    /// A store whose reads can be made to fail.
    #[derive(Default)]
    struct FlakyStore {
        flagged: bool,
        fail_lookup: bool,
        fail_count: bool,
        inserts: AtomicUsize,
    }

    fn unavailable(msg: &str) -> FlagError {
        FlagError::StorageUnavailable(LedgerError::Unavailable(msg.into()))
    }

    impl FlagStore for FlakyStore {
        fn has_flagged(&self, _item: ItemId, _user: Option<UserId>) -> Result<bool> {
            if self.fail_lookup {
                return Err(unavailable("lookup failed"));
            }
            Ok(self.flagged)
        }
        fn insert(&self, _item: ItemId, _user: UserId) -> Result<RecordId> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            Ok(RecordId(1))
        }
        fn count_by_item(&self, _item: ItemId) -> Result<u64> {
            if self.fail_count {
                return Err(unavailable("count failed"));
            }
            Ok(1)
        }
        fn records(&self, _item: ItemId) -> Result<Vec<FlagRecord>> {
            Ok(vec![])
        }
    }

    fn unavailable_message(err: FlagError) -> String {
        match err {
            FlagError::StorageUnavailable(LedgerError::Unavailable(msg)) => msg,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn failed_lookup_propagates_before_any_write() {
        let service = FlagService::new(FlakyStore {
            fail_lookup: true,
            ..Default::default()
        });

        let err = service.flag(item(1), user(1)).unwrap_err();
        assert_eq!(unavailable_message(err), "lookup failed");
        assert_eq!(service.store().inserts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failed_count_on_already_flagged_path_propagates() {
        let service = FlagService::new(FlakyStore {
            flagged: true,
            fail_count: true,
            ..Default::default()
        });

        let err = service.flag(item(1), user(1)).unwrap_err();
        assert_eq!(unavailable_message(err), "count failed");
        assert_eq!(service.store().inserts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failed_count_after_insert_propagates() {
        let service = FlagService::new(FlakyStore {
            fail_count: true,
            ..Default::default()
        });

        let err = service.flag(item(1), user(1)).unwrap_err();
        assert_eq!(unavailable_message(err), "count failed");
        assert_eq!(service.store().inserts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_status_read_propagates() {
        let service = FlagService::new(FlakyStore {
            fail_count: true,
            ..Default::default()
        });

        let err = service.status(item(1), Some(user(1))).unwrap_err();
        assert_eq!(unavailable_message(err), "count failed");
    }

    #[test]
    fn other_vote_categories_do_not_block_flagging() {
        let (ledger, service) = memory_service();
        ledger
            .insert(&VoteKey::new(item(42), user(7), VoteCategory::Up))
            .unwrap();

        assert_eq!(service.flag(item(42), user(7)).unwrap(), FlagResult::flagged(1));
    }

    proptest! {
        #[test]
        fn count_equals_distinct_flaggers(
            calls in prop::collection::vec((1u64..4, 1u64..6), 1..40)
        ) {
            let (ledger, service) = memory_service();
            let mut flaggers: BTreeMap<u64, BTreeSet<u64>> = BTreeMap::new();
            let mut last_count: BTreeMap<u64, u64> = BTreeMap::new();

            for (item_id, user_id) in calls {
                let first_time = flaggers.entry(item_id).or_default().insert(user_id);
                let result = service.flag(item(item_id), user(user_id)).unwrap();

                prop_assert_eq!(result.success, first_time);
                prop_assert_eq!(result.already_flagged, !first_time);
                prop_assert_eq!(result.count, flaggers[&item_id].len() as u64);

                let previous = last_count.insert(item_id, result.count).unwrap_or(0);
                prop_assert!(result.count >= previous);
                prop_assert_eq!(rows_for(&*ledger, item_id, user_id), 1);
            }

            for (item_id, users) in &flaggers {
                prop_assert_eq!(service.count(item(*item_id)).unwrap(), users.len() as u64);
            }
        }
    }
}
