use crate::datastore::DataStore;
use std::sync::Arc;
use tokio::sync::Mutex;
use axum::{
    Router,
    routing::{post, get},
    Json,
};
use serde::{Serialize, Deserialize};
use serde_json::Value;
use crate::helpers::{
    usage::*,
    listings::*,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HealthStatus {
    Healthy,
    Degraded { reason: String },
    Unhealthy { reason: String }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

async fn health_check() -> Json<HealthResponse> {
    let version = option_env!("CARGO_PKG_VERSION").map(String::from);

    Json(HealthResponse {
        status: HealthStatus::Healthy,
        version,
    })
}

async fn pong() -> Json<Value> {
    log::info!("Received Ping Request, sending Pong...");
    Json(serde_json::json!({"ping":"pong"}))
}

pub fn app(state: Arc<Mutex<DataStore>>) -> Router {
    let usage_api = Router::new()
        .route("/usage/charge", post(charge_tokens))
        .route("/usage/:user_id/remaining", get(remaining_tokens))
        .route("/usage/:user_id/logs", get(usage_logs))
        .route("/usage/sweep", post(sweep_usage))
        .route("/classify", post(classify_question));

    let marketplace_api = Router::new()
        .route("/professional/create", post(create_professional))
        .route("/professional/update", post(update_professional))
        .route("/professional/list", get(list_professionals))
        .route("/professional/search", post(search_professionals))
        .route("/claim/create", post(create_claim))
        .route("/claim/:professional_id/list", get(list_claims))
        .route("/claim/:id/delete", post(delete_claim));

    Router::new()
        .route("/ping", get(pong))
        .route("/health", get(health_check))
        .merge(usage_api)
        .merge(marketplace_api)
        .with_state(state)
}
