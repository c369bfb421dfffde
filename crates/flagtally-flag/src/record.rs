use chrono::{DateTime, Utc};
use flagtally_types::{ItemId, RecordId, UserId, VoteCategory, VoteRecord};
use serde::{Deserialize, Serialize};

/// A flag as stored in the ledger. Created once, never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagRecord {
    pub id: RecordId,
    pub item: ItemId,
    pub user: UserId,
    pub created_at: DateTime<Utc>,
}

impl FlagRecord {
    /// View a ledger record as a flag. `None` for other vote categories.
    pub fn from_vote(record: VoteRecord) -> Option<Self> {
        (record.category == VoteCategory::Flag).then(|| Self {
            id: record.id,
            item: record.item,
            user: record.user,
            created_at: record.created_at,
        })
    }
}
