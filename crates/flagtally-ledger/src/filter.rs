use flagtally_types::{ItemId, UserId, VoteCategory, VoteKey, VoteRecord};
use serde::{Deserialize, Serialize};

/// Conjunctive filter over ledger records.
///
/// Unset fields match everything, so `VoteFilter::default()` selects the
/// whole ledger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteFilter {
    pub item: Option<ItemId>,
    pub user: Option<UserId>,
    pub category: Option<VoteCategory>,
}

impl VoteFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn item(mut self, item: ItemId) -> Self {
        self.item = Some(item);
        self
    }

    pub fn user(mut self, user: UserId) -> Self {
        self.user = Some(user);
        self
    }

    pub fn category(mut self, category: VoteCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// Returns `true` if `record` satisfies every set field.
    pub fn matches(&self, record: &VoteRecord) -> bool {
        self.item.map_or(true, |item| record.item == item)
            && self.user.map_or(true, |user| record.user == user)
            && self.category.map_or(true, |c| record.category == c)
    }
}

impl From<&VoteKey> for VoteFilter {
    fn from(key: &VoteKey) -> Self {
        Self {
            item: Some(key.item),
            user: Some(key.user),
            category: Some(key.category),
        }
    }
}
