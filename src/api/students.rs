use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::{require_role, require_student_access, CurrentUser};
use crate::core::state::AppState;
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::attempt::AssignmentOverviewResponse;
use crate::schemas::quiz::AssignmentResponse;
use crate::services::quiz_catalog;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/:student_id/quizzes", get(list_assignments))
        .route("/quizzes/:assignment_id/start", post(start_assignment))
}

async fn list_assignments(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(student_id): Path<String>,
) -> Result<Json<Vec<AssignmentOverviewResponse>>, ApiError> {
    require_student_access(&state, &user, &student_id).await?;

    let rows = repositories::assignments::list_overview_for_student(state.db(), &student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list assignments"))?;

    Ok(Json(rows.into_iter().map(AssignmentOverviewResponse::from_row).collect()))
}

async fn start_assignment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(assignment_id): Path<String>,
) -> Result<Json<AssignmentResponse>, ApiError> {
    require_role(&user, &[UserRole::Student])?;

    let assignment = quiz_catalog::start_assignment(state.db(), &assignment_id, &user.id).await?;
    tracing::info!(assignment_id, student_id = %user.id, "Assignment started");
    Ok(Json(AssignmentResponse::from_db(assignment)))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use tower::ServiceExt;

    use crate::db::types::UserRole;
    use crate::services::quiz_catalog;
    use crate::test_support;

    #[tokio::test]
    async fn student_lists_and_starts_assignments_but_not_others() {
        let ctx = test_support::setup_test_context().await;
        let pool = ctx.state.db();
        let admin =
            test_support::insert_user(pool, "admin", UserRole::Administrator, None, None).await;
        let student = test_support::insert_user(pool, "student", UserRole::Student, None, None).await;
        let other = test_support::insert_user(pool, "other", UserRole::Student, None, None).await;
        let (quiz, _) = test_support::insert_sample_quiz(pool, &admin.id).await;
        let assignment = quiz_catalog::assign_quiz(pool, &quiz.id, &student.id).await.unwrap();
        let token = test_support::bearer_token(&student, ctx.state.settings());

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/v1/students/{}/quizzes", student.id),
                Some(&token),
                None,
            ))
            .await
            .expect("list");
        let status = response.status();
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::OK, "response: {body}");
        assert_eq!(body[0]["quiz_title"], "Basics");
        assert_eq!(body[0]["attempts_left"], 3);

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/v1/students/{}/quizzes", other.id),
                Some(&token),
                None,
            ))
            .await
            .expect("list other");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::POST,
                &format!("/api/v1/students/quizzes/{}/start", assignment.id),
                Some(&token),
                None,
            ))
            .await
            .expect("start");
        let status = response.status();
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::OK, "response: {body}");
        assert_eq!(body["status"], "in_progress");
    }
}
