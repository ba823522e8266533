use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::{Serialize, Deserialize};
use serde_json::{json, Value};
use thiserror::Error;

use salus_types::UsageLogEntry;

use crate::classifier::{classify, QuestionCategory};
use crate::datastore::DataStore;
use crate::db::StoreError;

/// A validated charge request. `category` is whatever string the caller
/// sent; unknown categories pass through and are simply never exempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub user_id: String,
    pub tokens: u64,
    pub category: Option<String>,
    pub question_preview: Option<String>,
}

/// The gate's decision. `used` and `remaining` reflect the stored total
/// after the attempt; `free` is present only on the exempt path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaVerdict {
    pub allowed: bool,
    pub remaining: u64,
    pub used: u64,
    pub limit: u64,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free: Option<bool>,
}

#[derive(Debug, Error)]
pub enum QuotaError {
    /// Malformed request, rejected before any storage access. Safe to
    /// retry after fixing the payload.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Ledger read or write failed. The charge may or may not have been
    /// applied; the caller must treat the operation as failed and decide
    /// its own retry policy.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl IntoResponse for QuotaError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::InvalidPayload(message) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "invalid_payload",
                    "message": message,
                }),
            ),
            Self::Storage(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": "database_error",
                    "message": err.to_string(),
                }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

/// Parses and validates a raw request body. Field-level problems are
/// reported as `InvalidPayload` so callers get a machine-readable kind
/// rather than a generic deserialization failure.
pub fn parse_charge_request(body: &Value) -> Result<ChargeRequest, QuotaError> {
    let user_id = body
        .get("user_id")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    if user_id.is_empty() {
        return Err(QuotaError::InvalidPayload("user_id is required".to_string()));
    }

    let tokens = body
        .get("tokens")
        .and_then(Value::as_u64)
        .ok_or_else(|| {
            QuotaError::InvalidPayload("tokens must be a non-negative integer".to_string())
        })?;

    let category = body
        .get("category")
        .and_then(Value::as_str)
        .map(str::to_string);
    let question_preview = body
        .get("question_preview")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(ChargeRequest { user_id, tokens, category, question_preview })
}

/// Truncates to at most `max` characters, respecting UTF-8 boundaries.
pub fn truncate_preview(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Runs the full gate for one request: resolve the category, log the
/// attempt, then either report the exempt verdict or charge the ledger.
///
/// An explicit category wins; without one the classifier runs over the
/// preview; with neither the request is `general`.
pub fn charge_tokens(
    datastore: &DataStore,
    body: &Value,
    today: NaiveDate,
) -> Result<QuotaVerdict, QuotaError> {
    let request = parse_charge_request(body)?;
    let limit = datastore.config.daily_token_limit;

    let preview = request
        .question_preview
        .as_deref()
        .map(|p| truncate_preview(p, datastore.config.preview_max_chars));

    let category = match request.category {
        Some(category) => category,
        None => match preview.as_deref() {
            Some(p) => classify(p).as_str().to_string(),
            None => QuestionCategory::General.as_str().to_string(),
        },
    };

    let exempt = category == QuestionCategory::Bulario.as_str();
    let charged = if exempt { 0 } else { request.tokens };

    datastore.audit_state.append(&UsageLogEntry::new(
        request.user_id.clone(),
        charged,
        category.clone(),
        preview,
    ))?;

    if exempt {
        let used = datastore.usage_state.tokens_used_on(&request.user_id, today)?;
        return Ok(QuotaVerdict {
            allowed: true,
            remaining: limit.saturating_sub(used),
            used,
            limit,
            category,
            free: Some(true),
        });
    }

    let outcome = datastore
        .usage_state
        .charge(&request.user_id, today, request.tokens, limit)?;

    Ok(QuotaVerdict {
        allowed: outcome.allowed,
        remaining: if outcome.allowed {
            limit.saturating_sub(outcome.tokens_used)
        } else {
            0
        },
        used: outcome.tokens_used,
        limit,
        category,
        free: None,
    })
}
