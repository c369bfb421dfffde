//! Flag deduplication and counting.
//!
//! A flag is a user's "report this content" mark against an item. This crate
//! records at most one flag per `(item, user)` pair and derives the flag
//! count of an item from the shared vote ledger.
//!
//! # Modules
//!
//! - [`error`] — [`FlagError`], the error taxonomy of flag operations
//! - [`record`] — [`FlagRecord`], a flag as stored in the ledger
//! - [`store`] — The [`FlagStore`] trait and [`LedgerFlagStore`], its
//!   flag-category view over a [`VoteLedger`](flagtally_ledger::VoteLedger)
//! - [`service`] — [`FlagService`], the flag use case, returning [`FlagResult`]

pub mod error;
pub mod record;
pub mod service;
pub mod store;

pub use error::{FlagError, Result};
pub use record::FlagRecord;
pub use service::{FlagResult, FlagService, FlagStatus};
pub use store::{FlagStore, LedgerFlagStore};
