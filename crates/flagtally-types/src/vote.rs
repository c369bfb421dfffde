use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::ids::{ItemId, RecordId, UserId};

/// Category tag of a vote.
///
/// Several categories share one ledger; counts and uniqueness are always
/// scoped to a single category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteCategory {
    /// A "report this content" flag.
    Flag,
    /// An up-vote.
    Up,
    /// A down-vote.
    Down,
}

impl VoteCategory {
    /// The stable string tag stored in the ledger.
    pub const fn as_str(self) -> &'static str {
        match self {
            VoteCategory::Flag => "flag",
            VoteCategory::Up => "up",
            VoteCategory::Down => "down",
        }
    }
}

impl fmt::Display for VoteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteCategory {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flag" => Ok(VoteCategory::Flag),
            "up" => Ok(VoteCategory::Up),
            "down" => Ok(VoteCategory::Down),
            other => Err(TypeError::UnknownCategory(other.to_string())),
        }
    }
}

/// The uniqueness key of the ledger: at most one record per key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoteKey {
    pub item: ItemId,
    pub user: UserId,
    pub category: VoteCategory,
}

impl VoteKey {
    pub fn new(item: ItemId, user: UserId, category: VoteCategory) -> Self {
        Self {
            item,
            user,
            category,
        }
    }

    /// Key of a flag cast by `user` against `item`.
    pub fn flag(item: ItemId, user: UserId) -> Self {
        Self::new(item, user, VoteCategory::Flag)
    }
}

impl fmt::Display for VoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.category, self.item, self.user)
    }
}

/// One row of the append-only vote ledger. Never mutated once written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub id: RecordId,
    pub item: ItemId,
    pub user: UserId,
    pub category: VoteCategory,
    pub created_at: DateTime<Utc>,
}

impl VoteRecord {
    /// The uniqueness key this record occupies.
    pub fn key(&self) -> VoteKey {
        VoteKey::new(self.item, self.user, self.category)
    }
}
