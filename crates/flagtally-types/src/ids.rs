use std::fmt;
use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

macro_rules! positive_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "u64", into = "u64")]
        pub struct $name(NonZeroU64);

        impl $name {
            /// Validate a raw identifier. Zero is rejected.
            pub fn new(raw: u64) -> Result<Self, TypeError> {
                NonZeroU64::new(raw)
                    .map(Self)
                    .ok_or(TypeError::NonPositive { field: $field, value: 0 })
            }

            /// The raw integer value.
            pub fn get(self) -> u64 {
                self.0.get()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<u64> for $name {
            type Error = TypeError;

            fn try_from(raw: u64) -> Result<Self, Self::Error> {
                Self::new(raw)
            }
        }

        impl TryFrom<i64> for $name {
            type Error = TypeError;

            fn try_from(raw: i64) -> Result<Self, Self::Error> {
                if raw <= 0 {
                    return Err(TypeError::NonPositive { field: $field, value: raw });
                }
                Self::new(raw as u64)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.get()
            }
        }
    };
}

positive_id!(
    /// Identifier of a content item that can be flagged.
    ItemId,
    "item_id"
);

positive_id!(
    /// Identifier of a resolved, authenticated user.
    ///
    /// There is no "anonymous" `UserId`: callers represent an absent user as
    /// `Option<UserId>::None`.
    UserId,
    "user_id"
);

/// Ledger-assigned sequence number of a stored vote, starting at 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_is_rejected() {
        assert_eq!(
            UserId::new(0).unwrap_err(),
            TypeError::NonPositive {
                field: "user_id",
                value: 0
            }
        );
        assert!(ItemId::new(0).is_err());
    }

    #[test]
    fn negative_signed_ids_are_rejected() {
        let err = ItemId::try_from(-5i64).unwrap_err();
        assert_eq!(
            err,
            TypeError::NonPositive {
                field: "item_id",
                value: -5
            }
        );
    }

    #[test]
    fn display_and_debug() {
        let item = ItemId::new(42).unwrap();
        assert_eq!(item.to_string(), "42");
        assert_eq!(format!("{item:?}"), "ItemId(42)");
        assert_eq!(RecordId(3).to_string(), "#3");
    }

    #[test]
    fn serde_rejects_zero() {
        let ok: UserId = serde_json::from_str("7").unwrap();
        assert_eq!(ok.get(), 7);
        assert!(serde_json::from_str::<UserId>("0").is_err());
        assert_eq!(serde_json::to_string(&ok).unwrap(), "7");
    }

    proptest! {
        #[test]
        fn positive_ids_keep_their_value(raw in 1u64..) {
            prop_assert_eq!(UserId::new(raw).unwrap().get(), raw);
            prop_assert_eq!(u64::from(ItemId::new(raw).unwrap()), raw);
        }
    }
}
