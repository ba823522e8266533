use chrono::{Duration, NaiveDate, Utc};
use serde::{Serialize, Deserialize};

use crate::datastore::DataStore;
use crate::db::StoreError;

/// Outcome of one retention pass
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SweepReport {
    pub cutoff_date: NaiveDate,
    pub deleted: u64,
}

/// The oldest ledger date retained is `today - retention_days`; everything
/// strictly before it is swept. With the default window of 1 day, today
/// and yesterday survive.
pub fn retention_cutoff(today: NaiveDate, retention_days: u32) -> NaiveDate {
    today - Duration::days(retention_days as i64)
}

pub fn run_sweep_for(datastore: &DataStore, today: NaiveDate) -> Result<SweepReport, StoreError> {
    let cutoff_date = retention_cutoff(today, datastore.config.retention_days);
    let deleted = datastore.usage_state.sweep_before(cutoff_date)?;
    Ok(SweepReport { cutoff_date, deleted })
}

/// One retention pass against the current calendar day. Failures are left
/// to the caller; the next scheduled pass retries the same cutoff-based
/// deletion, which is idempotent.
pub fn run_sweep(datastore: &DataStore) -> Result<SweepReport, StoreError> {
    run_sweep_for(datastore, Utc::now().date_naive())
}
