use redb::ReadableTable;
use salus_types::UsageLogEntry;

use crate::db::{DbHandle, StoreError, TOKEN_USAGE_LOGS, encode, decode};

/// Maximum number of entries returned by a single trail query
pub const MAX_ENTRIES_PER_QUERY: usize = 100;

/// Append-only audit trail over the `token_usage_logs` table. Entries are
/// the side-channel record of every charge attempt; quota decisions never
/// read them and the retention sweep never deletes them.
#[derive(Clone)]
pub struct AuditState {
    db: DbHandle,
}

impl AuditState {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }

    pub fn append(&self, entry: &UsageLogEntry) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(TOKEN_USAGE_LOGS)?;
            // timestamp-major key keeps the trail in insertion order; the
            // uuid suffix disambiguates entries within the same second
            let key = format!("{:020}/{}", entry.timestamp, entry.id);
            table.insert(key.as_str(), encode(entry)?.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Entries for one user, most recent first, capped at `limit`.
    pub fn entries_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<UsageLogEntry>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TOKEN_USAGE_LOGS)?;
        let mut matches = Vec::new();
        for item in table.iter()? {
            let (_key, raw) = item?;
            let entry: UsageLogEntry = decode(raw.value())?;
            if entry.user_id == user_id {
                matches.push(entry);
            }
        }
        matches.reverse();
        matches.truncate(limit);
        Ok(matches)
    }

    /// Total number of entries in the trail.
    pub fn total_entries(&self) -> Result<u64, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TOKEN_USAGE_LOGS)?;
        Ok(table.len()?)
    }
}
