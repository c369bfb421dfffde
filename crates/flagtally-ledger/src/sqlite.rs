//! Vote ledger backed by a SQLite table.
//!
//! # Schema
//!
//! The `votes` table has columns `id`, `item_id`, `user_id`, `category`,
//! `created_at_ms`, with `UNIQUE(item_id, user_id, category)`. The unique
//! constraint is what makes concurrent inserts safe, including inserts from
//! separate connections or processes sharing the database file.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use flagtally_types::{ItemId, RecordId, TypeError, UserId, VoteCategory, VoteKey, VoteRecord};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, Row};
use tracing::{debug, info};

use crate::error::{LedgerError, Result};
use crate::filter::VoteFilter;
use crate::traits::VoteLedger;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Durable vote ledger backed by SQLite.
#[derive(Debug)]
pub struct SqliteVoteLedger {
    conn: Mutex<Connection>,
}

impl SqliteVoteLedger {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let ledger = Self::from_connection(Connection::open(path)?)?;
        info!(path = %path.display(), "sqlite vote ledger opened");
        Ok(ledger)
    }

    /// A private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wrap an existing connection, creating the schema if needed.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Initializes the database schema.
    pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS votes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                item_id INTEGER NOT NULL CHECK (item_id > 0),
                user_id INTEGER NOT NULL CHECK (user_id > 0),
                category TEXT NOT NULL,
                created_at_ms INTEGER NOT NULL,
                UNIQUE (item_id, user_id, category)
            );
            CREATE INDEX IF NOT EXISTS idx_votes_item_category ON votes(item_id, category);",
        )
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| LedgerError::Unavailable("sqlite connection lock poisoned".into()))
    }
}

impl VoteLedger for SqliteVoteLedger {
    fn insert(&self, key: &VoteKey) -> Result<VoteRecord> {
        let conn = self.lock()?;
        let created_at_ms = Utc::now().timestamp_millis();

        let inserted = conn.execute(
            "INSERT INTO votes (item_id, user_id, category, created_at_ms)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                sql_id("item_id", key.item.get())?,
                sql_id("user_id", key.user.get())?,
                key.category.as_str(),
                created_at_ms
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Err(LedgerError::Duplicate(*key)),
            Err(e) => return Err(e.into()),
        }

        let id = conn.last_insert_rowid();
        let created_at = datetime_from_millis(created_at_ms)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(4, created_at_ms))?;

        debug!(id, key = %key, "vote inserted");
        Ok(VoteRecord {
            id: RecordId(id as u64),
            item: key.item,
            user: key.user,
            category: key.category,
            created_at,
        })
    }

    fn count(&self, filter: &VoteFilter) -> Result<u64> {
        let (clause, values) = where_clause(filter)?;
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM votes{clause}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn list(&self, filter: &VoteFilter) -> Result<Vec<VoteRecord>> {
        let (clause, values) = where_clause(filter)?;
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, item_id, user_id, category, created_at_ms FROM votes{clause} ORDER BY id"
        ))?;
        let records = stmt
            .query_map(params_from_iter(values.iter()), parse_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

/// Returns `true` only for a `UNIQUE` constraint failure. Other constraint
/// failures (CHECK, NOT NULL) are real errors.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn sql_id(field: &str, raw: u64) -> Result<i64> {
    i64::try_from(raw).map_err(|_| {
        LedgerError::Serialization(format!("{field} {raw} exceeds the sqlite integer range"))
    })
}

fn where_clause(filter: &VoteFilter) -> Result<(String, Vec<Value>)> {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if let Some(item) = filter.item {
        clauses.push("item_id = ?");
        values.push(Value::Integer(sql_id("item_id", item.get())?));
    }
    if let Some(user) = filter.user {
        clauses.push("user_id = ?");
        values.push(Value::Integer(sql_id("user_id", user.get())?));
    }
    if let Some(category) = filter.category {
        clauses.push("category = ?");
        values.push(Value::Text(category.as_str().to_string()));
    }

    let clause = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    Ok((clause, values))
}

fn datetime_from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

fn conversion_failure(index: usize, ty: Type, err: TypeError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, ty, Box::new(err))
}

fn parse_row(row: &Row<'_>) -> rusqlite::Result<VoteRecord> {
    let id: i64 = row.get(0)?;
    let item: i64 = row.get(1)?;
    let user: i64 = row.get(2)?;
    let category: String = row.get(3)?;
    let created_at_ms: i64 = row.get(4)?;

    Ok(VoteRecord {
        id: RecordId(id as u64),
        item: ItemId::try_from(item).map_err(|e| conversion_failure(1, Type::Integer, e))?,
        user: UserId::try_from(user).map_err(|e| conversion_failure(2, Type::Integer, e))?,
        category: category
            .parse::<VoteCategory>()
            .map_err(|e| conversion_failure(3, Type::Text, e))?,
        created_at: datetime_from_millis(created_at_ms)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(4, created_at_ms))?,
    })
}
