//! Append-only vote ledger for flagtally.
//!
//! The ledger is the table every vote category shares: flags, up-votes and
//! down-votes all land here, keyed by `(item, user, category)`. Higher layers
//! see it only through the [`VoteLedger`] trait.
//!
//! # Backends
//!
//! - [`InMemoryVoteLedger`] — `RwLock`-guarded vectors, for tests and embedding
//! - [`WalVoteLedger`] — in-memory index replayed from a CRC-framed log file
//! - [`SqliteVoteLedger`] — SQLite table with a `UNIQUE(item_id, user_id, category)` constraint
//!
//! Every backend enforces the uniqueness key at insert time, so two racing
//! inserts for one key leave exactly one record and the loser sees
//! [`LedgerError::Duplicate`].

pub mod config;
pub mod error;
pub mod filter;
pub mod memory;
pub mod sqlite;
pub mod traits;
pub mod wal;

pub use config::{open_ledger, LedgerBackend, LedgerConfig};
pub use error::{LedgerError, Result};
pub use filter::VoteFilter;
pub use memory::InMemoryVoteLedger;
pub use sqlite::SqliteVoteLedger;
pub use traits::VoteLedger;
pub use wal::{SyncMode, WalVoteLedger};
