use chrono::NaiveDate;
use redb::ReadableTable;
use serde::{Serialize, Deserialize};

use crate::db::{DbHandle, StoreError, USAGE_TOKENS, encode, decode};

/// One row per (user, calendar day). `tokens_used` only moves up within a
/// day and never past the daily limit; the row disappears when the
/// retention sweep passes its date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageRecord {
    pub user_id: String,
    pub date: NaiveDate,
    pub tokens_used: u64,
}

/// Result of a charge attempt. `tokens_used` is the stored total after the
/// attempt: unchanged when denied, incremented when allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChargeOutcome {
    pub allowed: bool,
    pub tokens_used: u64,
}

fn usage_key(date: NaiveDate, user_id: &str) -> String {
    format!("{}/{}", date.format("%Y-%m-%d"), user_id)
}

/// Ledger access over the `usage_tokens` table.
#[derive(Clone)]
pub struct UsageState {
    db: DbHandle,
}

impl UsageState {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }

    /// Charges `tokens` against the user's budget for `date`, as a single
    /// write transaction: the read, the ceiling check and the write commit
    /// together, so two chargers can never both observe the same pre-update
    /// total.
    ///
    /// A denied charge commits nothing; a first-of-day charge above the
    /// limit denies without creating a row.
    pub fn charge(
        &self,
        user_id: &str,
        date: NaiveDate,
        tokens: u64,
        limit: u64,
    ) -> Result<ChargeOutcome, StoreError> {
        let txn = self.db.begin_write()?;
        let outcome = {
            let mut table = txn.open_table(USAGE_TOKENS)?;
            let key = usage_key(date, user_id);
            let existing = match table.get(key.as_str())? {
                Some(raw) => Some(decode::<UsageRecord>(raw.value())?),
                None => None,
            };

            match existing {
                None => {
                    if tokens > limit {
                        ChargeOutcome { allowed: false, tokens_used: 0 }
                    } else {
                        let record = UsageRecord {
                            user_id: user_id.to_string(),
                            date,
                            tokens_used: tokens,
                        };
                        table.insert(key.as_str(), encode(&record)?.as_slice())?;
                        ChargeOutcome { allowed: true, tokens_used: tokens }
                    }
                }
                Some(mut record) => match record.tokens_used.checked_add(tokens) {
                    Some(new_total) if new_total <= limit => {
                        record.tokens_used = new_total;
                        table.insert(key.as_str(), encode(&record)?.as_slice())?;
                        ChargeOutcome { allowed: true, tokens_used: new_total }
                    }
                    _ => ChargeOutcome { allowed: false, tokens_used: record.tokens_used },
                },
            }
        };
        txn.commit()?;
        Ok(outcome)
    }

    /// Tokens already consumed by the user on `date`; 0 when no row exists.
    pub fn tokens_used_on(&self, user_id: &str, date: NaiveDate) -> Result<u64, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(USAGE_TOKENS)?;
        let key = usage_key(date, user_id);
        let result = match table.get(key.as_str())? {
            Some(raw) => Ok(decode::<UsageRecord>(raw.value())?.tokens_used),
            None => Ok(0),
        };
        result
    }

    /// Deletes every ledger row dated strictly before `cutoff`, returning
    /// the number removed. Deleting rows that are already gone is a no-op,
    /// so repeated sweeps converge.
    pub fn sweep_before(&self, cutoff: NaiveDate) -> Result<u64, StoreError> {
        let txn = self.db.begin_write()?;
        let deleted = {
            let mut table = txn.open_table(USAGE_TOKENS)?;
            let cutoff_key = cutoff.format("%Y-%m-%d").to_string();
            let stale: Vec<String> = {
                let mut keys = Vec::new();
                for item in table.range(..cutoff_key.as_str())? {
                    let (key, _) = item?;
                    keys.push(key.value().to_string());
                }
                keys
            };
            for key in &stale {
                table.remove(key.as_str())?;
            }
            stale.len() as u64
        };
        txn.commit()?;
        Ok(deleted)
    }
}
