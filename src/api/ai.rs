use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::api::pagination::PaginatedResponse;
use crate::api::validation::validate_page;
use crate::core::state::AppState;
use crate::repositories;
use crate::repositories::generation_requests::ListFilter;
use crate::schemas::generation::{GenerationRequestResponse, ListGenerationQuery};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/generate-process", get(list_requests))
        .route("/generate-process/:request_id", get(get_request))
}

async fn list_requests(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Query(query): Query<ListGenerationQuery>,
) -> Result<Json<PaginatedResponse<GenerationRequestResponse>>, ApiError> {
    validate_page(query.skip, query.limit)?;

    let filter = ListFilter {
        user_id: None,
        status: query.status,
        model_name: query.model_name.filter(|model| !model.is_empty()),
    };
    let items = repositories::generation_requests::list(state.db(), &filter, query.skip, query.limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list generation requests"))?;
    let total_count = repositories::generation_requests::count(state.db(), &filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count generation requests"))?;

    Ok(Json(PaginatedResponse {
        items: items.into_iter().map(GenerationRequestResponse::from_db).collect(),
        total_count,
        skip: query.skip,
        limit: query.limit,
    }))
}

async fn get_request(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Path(request_id): Path<String>,
) -> Result<Json<GenerationRequestResponse>, ApiError> {
    let request = repositories::generation_requests::find_by_id(state.db(), &request_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load generation request"))?
        .ok_or_else(|| ApiError::NotFound("Generation request not found".to_string()))?;

    Ok(Json(GenerationRequestResponse::from_db(request)))
}
