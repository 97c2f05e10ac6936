use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::errors::ApiError;
use crate::api::guards::{require_role, require_student_access, CurrentUser};
use crate::api::pagination::{default_limit, PaginatedResponse};
use crate::api::validation::validate_page;
use crate::core::state::AppState;
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::attempt::ChildResultResponse;

#[derive(Debug, Deserialize)]
struct ResultsQuery {
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/:child_id/results", get(child_results))
}

async fn child_results(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(child_id): Path<String>,
    Query(query): Query<ResultsQuery>,
) -> Result<Json<PaginatedResponse<ChildResultResponse>>, ApiError> {
    require_role(&user, &[UserRole::Parent, UserRole::Administrator])?;
    validate_page(query.skip, query.limit)?;
    require_student_access(&state, &user, &child_id).await?;

    let rows = repositories::attempt_histories::list_results_for_student(
        state.db(),
        &child_id,
        query.skip,
        query.limit,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to load child results"))?;
    let total_count = repositories::attempt_histories::count_for_student(state.db(), &child_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count child results"))?;

    Ok(Json(PaginatedResponse {
        items: rows.into_iter().map(ChildResultResponse::from_row).collect(),
        total_count,
        skip: query.skip,
        limit: query.limit,
    }))
}
