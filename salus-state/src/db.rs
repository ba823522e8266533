use redb::{Database, TableDefinition};
use std::path::Path;
use std::sync::Arc;
use bincode::{serialize, deserialize};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Database handle wrapped in Arc for sharing across threads.
pub type DbHandle = Arc<Database>;

/// Per-user per-day token counters. Keys are `<date>/<user_id>` with the
/// date in `%Y-%m-%d` form, so a retention sweep is a key-range scan.
pub const USAGE_TOKENS: TableDefinition<&str, &[u8]> = TableDefinition::new("usage_tokens");

/// Append-only audit trail of charge attempts. Keys are
/// `<zero-padded unix timestamp>/<uuid>` so entries iterate in insertion order.
pub const TOKEN_USAGE_LOGS: TableDefinition<&str, &[u8]> = TableDefinition::new("token_usage_logs");

/// Professional listing records, keyed by listing id.
pub const PROFESSIONALS: TableDefinition<&str, &[u8]> = TableDefinition::new("professionals");

/// Active exclusivity claims, keyed by claim id.
pub const EXCLUSIVE_CLAIMS: TableDefinition<&str, &[u8]> = TableDefinition::new("exclusive_claims");

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] redb::Error),
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redb::DatabaseError> for StoreError {
    fn from(e: redb::DatabaseError) -> Self {
        Self::Database(e.into())
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Database(e.into())
    }
}

impl From<redb::TableError> for StoreError {
    fn from(e: redb::TableError) -> Self {
        Self::Database(e.into())
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(e: redb::StorageError) -> Self {
        Self::Database(e.into())
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(e: redb::CommitError) -> Self {
        Self::Database(e.into())
    }
}

/// Opens the database at the specified path, creating it (and its parent
/// directory, and every table) if missing, so readers never race table
/// creation.
pub fn open_db(path: impl AsRef<Path>) -> Result<DbHandle, StoreError> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let db = Database::create(path)?;

    let init = db.begin_write()?;
    {
        init.open_table(USAGE_TOKENS)?;
        init.open_table(TOKEN_USAGE_LOGS)?;
        init.open_table(PROFESSIONALS)?;
        init.open_table(EXCLUSIVE_CLAIMS)?;
    }
    init.commit()?;

    Ok(Arc::new(db))
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    Ok(serialize(value)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    Ok(deserialize(bytes)?)
}
