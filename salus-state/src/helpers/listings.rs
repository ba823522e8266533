use crate::datastore::DataStore;
use crate::listings::{NewClaim, NewProfessional, Professional};
use std::sync::Arc;
use tokio::sync::Mutex;
use axum::{extract::{State, Path}, Json, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;
use salus_types::{Response, Success};

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub specialty: String,
    #[serde(default)]
    pub neighborhood: String,
}

/// POST /professional/create
pub async fn create_professional(
    State(state): State<Arc<Mutex<DataStore>>>,
    Json(request): Json<NewProfessional>,
) -> impl IntoResponse {
    let datastore = state.lock().await;
    match datastore.listing_state.create(request) {
        Ok(professional) => {
            log::info!("create_professional: created listing {}", professional.id);
            Json(Response::Success(Success::Some(professional))).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "database_error",
                "message": e.to_string(),
            })),
        )
            .into_response(),
    }
}

/// POST /professional/update
pub async fn update_professional(
    State(state): State<Arc<Mutex<DataStore>>>,
    Json(request): Json<Professional>,
) -> impl IntoResponse {
    let datastore = state.lock().await;
    match datastore.listing_state.update(request) {
        Ok(professional) => Json(Response::Success(Success::Some(professional))).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /professional/list
pub async fn list_professionals(
    State(state): State<Arc<Mutex<DataStore>>>,
) -> Json<Response<Professional>> {
    let datastore = state.lock().await;
    match datastore.listing_state.list() {
        Ok(listings) => Json(Response::Success(Success::List(listings))),
        Err(e) => Json(Response::Failure { reason: Some(e.to_string()) }),
    }
}

/// POST /professional/search — verified listings matching the filters,
/// highest tiers first.
pub async fn search_professionals(
    State(state): State<Arc<Mutex<DataStore>>>,
    Json(request): Json<SearchRequest>,
) -> Json<Response<Professional>> {
    let datastore = state.lock().await;
    match datastore
        .listing_state
        .search(&request.specialty, &request.neighborhood)
    {
        Ok(listings) => Json(Response::Success(Success::List(listings))),
        Err(e) => Json(Response::Failure { reason: Some(e.to_string()) }),
    }
}

/// POST /claim/create
pub async fn create_claim(
    State(state): State<Arc<Mutex<DataStore>>>,
    Json(request): Json<NewClaim>,
) -> impl IntoResponse {
    let datastore = state.lock().await;
    let max_claims = datastore.config.max_exclusive_claims;
    match datastore.listing_state.create_claim(request, max_claims) {
        Ok(claim) => {
            log::info!(
                "create_claim: professional {} claimed {}",
                claim.professional_id,
                claim.neighborhood
            );
            Json(Response::Success(Success::Some(claim))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// GET /claim/:professional_id/list
pub async fn list_claims(
    State(state): State<Arc<Mutex<DataStore>>>,
    Path(professional_id): Path<String>,
) -> Json<Response<crate::listings::ExclusiveClaim>> {
    let datastore = state.lock().await;
    match datastore.listing_state.claims_for(&professional_id) {
        Ok(claims) => Json(Response::Success(Success::List(claims))),
        Err(e) => Json(Response::Failure { reason: Some(e.to_string()) }),
    }
}

/// POST /claim/:id/delete — idempotent.
pub async fn delete_claim(
    State(state): State<Arc<Mutex<DataStore>>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let datastore = state.lock().await;
    match datastore.listing_state.delete_claim(&id) {
        Ok(removed) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "removed": removed,
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
