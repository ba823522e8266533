use serde::{Serialize, Deserialize};
use uuid::Uuid;

/// Represents a single token charge attempt for audit purposes.
///
/// Entries are append-only: they are written once when a charge is
/// attempted (allowed, denied or exempt) and are never updated or swept.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageLogEntry {
    /// Unique identifier for this entry
    pub id: String,

    /// Type of event, always "token_usage" for these entries
    pub event_type: String,

    /// Schema version for forward compatibility
    pub version: String,

    /// Unix timestamp when the entry was created
    pub timestamp: i64,

    /// Identifier for the account that made the request
    pub user_id: String,

    /// Tokens the request asked of the daily budget; always 0 for exempt categories
    pub tokens_consumed: u64,

    /// Category the request was classified under
    pub category: String,

    /// Truncated preview of the triggering text, if any
    pub question_preview: Option<String>,
}

impl UsageLogEntry {
    /// Creates a new UsageLogEntry with the current timestamp
    pub fn new(
        user_id: String,
        tokens_consumed: u64,
        category: String,
        question_preview: Option<String>,
    ) -> Self {
        let timestamp = chrono::Utc::now().timestamp();

        Self {
            id: Uuid::new_v4().to_string(),
            event_type: "token_usage".to_string(),
            version: "1.0".to_string(),
            timestamp,
            user_id,
            tokens_consumed,
            category,
            question_preview,
        }
    }
}
