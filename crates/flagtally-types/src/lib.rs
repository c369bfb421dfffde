//! Foundation types for flagtally.
//!
//! Every other flagtally crate depends on `flagtally-types`.
//!
//! # Key Types
//!
//! - [`ItemId`] / [`UserId`] — Non-zero identifiers for content items and acting users
//! - [`RecordId`] — Ledger-assigned sequence number of a stored vote
//! - [`VoteCategory`] — Tag separating flags from other votes sharing one ledger
//! - [`VoteKey`] — The `(item, user, category)` uniqueness key
//! - [`VoteRecord`] — One row of the append-only vote ledger

pub mod error;
pub mod ids;
pub mod vote;

pub use error::TypeError;
pub use ids::{ItemId, RecordId, UserId};
pub use vote::{VoteCategory, VoteKey, VoteRecord};
