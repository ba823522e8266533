use crate::audit::MAX_ENTRIES_PER_QUERY;
use crate::classifier::classify;
use crate::datastore::DataStore;
use crate::quota;
use crate::tasks;
use std::sync::Arc;
use tokio::sync::Mutex;
use axum::{extract::{State, Path}, Json, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use serde_json::{json, Value};
use salus_types::{Response, Success, UsageLogEntry};

/// POST /usage/charge — the quota gate.
pub async fn charge_tokens(
    State(state): State<Arc<Mutex<DataStore>>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let datastore = state.lock().await;
    let today = Utc::now().date_naive();
    match quota::charge_tokens(&datastore, &body, today) {
        Ok(verdict) => {
            log::info!(
                "charge_tokens: user={} category={} allowed={} remaining={}",
                body.get("user_id").and_then(Value::as_str).unwrap_or("?"),
                verdict.category,
                verdict.allowed,
                verdict.remaining
            );
            (StatusCode::OK, Json(verdict)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// GET /usage/:user_id/remaining — current balance for display.
pub async fn remaining_tokens(
    State(state): State<Arc<Mutex<DataStore>>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let datastore = state.lock().await;
    let today = Utc::now().date_naive();
    let limit = datastore.config.daily_token_limit;
    match datastore.usage_state.tokens_used_on(&user_id, today) {
        Ok(used) => (
            StatusCode::OK,
            Json(json!({
                "user_id": user_id,
                "remaining": limit.saturating_sub(used),
                "used": used,
                "limit": limit,
            })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "database_error",
                "message": e.to_string(),
            })),
        ),
    }
}

/// GET /usage/:user_id/logs — recent audit trail entries.
pub async fn usage_logs(
    State(state): State<Arc<Mutex<DataStore>>>,
    Path(user_id): Path<String>,
) -> Json<Response<UsageLogEntry>> {
    let datastore = state.lock().await;
    match datastore.audit_state.entries_for_user(&user_id, MAX_ENTRIES_PER_QUERY) {
        Ok(entries) => Json(Response::Success(Success::List(entries))),
        Err(e) => Json(Response::Failure { reason: Some(e.to_string()) }),
    }
}

/// POST /usage/sweep — retention sweep on demand.
pub async fn sweep_usage(
    State(state): State<Arc<Mutex<DataStore>>>,
) -> impl IntoResponse {
    let datastore = state.lock().await;
    match tasks::run_sweep(&datastore) {
        Ok(report) => {
            log::info!(
                "sweep_usage: removed {} rows older than {}",
                report.deleted,
                report.cutoff_date
            );
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "message": format!("Old usage records deleted successfully (before {})", report.cutoff_date),
                    "cutoff_date": report.cutoff_date,
                    "deleted": report.deleted,
                })),
            )
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "error": e.to_string(),
                "message": "Failed to delete old records",
            })),
        ),
    }
}

/// POST /classify — the question classifier as a service.
pub async fn classify_question(Json(body): Json<Value>) -> impl IntoResponse {
    let question = body.get("question").and_then(Value::as_str).unwrap_or("");
    let category = classify(question);
    (
        StatusCode::OK,
        Json(json!({
            "category": category.as_str(),
        })),
    )
}
