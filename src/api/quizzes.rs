use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::{require_role, require_student_access, CurrentAdmin, CurrentUser};
use crate::api::validation::validate_payload;
use crate::core::queue::{GenerationJob, GENERATION_QUEUE};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::{GenerationStatus, UserRole};
use crate::repositories;
use crate::schemas::attempt::{
    AttemptDetailResponse, AttemptHistoryResponse, AttemptResultResponse, AttemptSubmit,
    HistoryQuery,
};
use crate::schemas::generation::{
    AiSaveRequest, AiSaveResponse, GenerateAcceptedResponse, GenerateQuizRequest,
};
use crate::schemas::quiz::{AssignQuizRequest, AssignmentResponse, QuizCreate, QuizResponse};
use crate::services::quiz_catalog;
use crate::services::quiz_generation;
use crate::services::quiz_scoring::{self, AttemptSubmission};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_quiz))
        .route("/generate_ai", post(generate_ai))
        .route("/ai-save", post(ai_save))
        .route("/history/:history_id", get(attempt_detail))
        .route("/:quiz_id", get(get_quiz))
        .route("/:quiz_id/assign", post(assign_quiz))
        .route("/:quiz_id/make", post(make_attempt))
        .route("/:quiz_id/history", get(quiz_history))
}

async fn create_quiz(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Json(payload): Json<QuizCreate>,
) -> Result<(StatusCode, Json<QuizResponse>), ApiError> {
    validate_payload(&payload)?;

    let defaults = state.settings().quiz();
    let draft = payload.into_draft(defaults.default_passing_score, defaults.default_max_attempts);
    let created = quiz_catalog::create_quiz(state.db(), &admin.id, draft).await?;

    Ok((StatusCode::CREATED, Json(QuizResponse::from_loaded(created))))
}

async fn get_quiz(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(quiz_id): Path<String>,
) -> Result<Json<QuizResponse>, ApiError> {
    let loaded = quiz_catalog::load_quiz(state.db(), &quiz_id).await?;
    Ok(Json(QuizResponse::from_loaded(loaded)))
}

async fn assign_quiz(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(quiz_id): Path<String>,
    Json(payload): Json<AssignQuizRequest>,
) -> Result<(StatusCode, Json<AssignmentResponse>), ApiError> {
    require_role(&user, &[UserRole::Administrator, UserRole::Parent])?;
    validate_payload(&payload)?;
    require_student_access(&state, &user, &payload.student_id).await?;

    let assignment = quiz_catalog::assign_quiz(state.db(), &quiz_id, &payload.student_id).await?;
    Ok((StatusCode::CREATED, Json(AssignmentResponse::from_db(assignment))))
}

async fn make_attempt(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(quiz_id): Path<String>,
    Json(payload): Json<AttemptSubmit>,
) -> Result<(StatusCode, Json<AttemptResultResponse>), ApiError> {
    require_role(&user, &[UserRole::Student])?;
    validate_payload(&payload)?;

    let submission =
        AttemptSubmission { answers: payload.answers, submission_time: payload.submission_time };
    let scored = quiz_scoring::submit_and_notify(&state, &user.id, &quiz_id, submission).await?;

    Ok((StatusCode::CREATED, Json(AttemptResultResponse::from_scored(scored))))
}

async fn quiz_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(quiz_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<AttemptHistoryResponse>>, ApiError> {
    let student_id = resolve_student(&state, &user, query.child_id).await?;

    let histories =
        repositories::attempt_histories::list_for_student_quiz(state.db(), &student_id, &quiz_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load attempt history"))?;

    Ok(Json(histories.into_iter().map(AttemptHistoryResponse::from_db).collect()))
}

async fn attempt_detail(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(history_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<AttemptDetailResponse>, ApiError> {
    let student_id = resolve_student(&state, &user, query.child_id).await?;
    let detail = quiz_scoring::attempt_detail(state.db(), &history_id, &student_id).await?;
    Ok(Json(AttemptDetailResponse::from_detail(detail)))
}

/// The student whose attempts are being read: `child_id` when given (guardian
/// or administrator), otherwise the caller, who must then be a student.
async fn resolve_student(
    state: &AppState,
    user: &crate::db::models::User,
    child_id: Option<String>,
) -> Result<String, ApiError> {
    match child_id {
        Some(child_id) => {
            require_student_access(state, user, &child_id).await?;
            Ok(child_id)
        }
        None => {
            require_role(user, &[UserRole::Student])?;
            Ok(user.id.clone())
        }
    }
}

async fn generate_ai(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Json(payload): Json<GenerateQuizRequest>,
) -> Result<(StatusCode, Json<GenerateAcceptedResponse>), ApiError> {
    validate_payload(&payload)?;

    let quiz_settings = state.settings().quiz();
    let rate_key = format!("rl:generate:{}", admin.id);
    let allowed = state
        .redis()
        .rate_limit(
            &rate_key,
            quiz_settings.generation_rate_limit,
            quiz_settings.generation_rate_window_seconds,
        )
        .await
        .unwrap_or(true);
    if !allowed {
        return Err(ApiError::TooManyRequests("Too many generation requests, try again later"));
    }

    let title = payload.title.trim().to_string();
    let params =
        payload.into_params(quiz_settings.default_passing_score, quiz_settings.default_max_attempts);
    let input = serde_json::to_value(&params)
        .map_err(|e| ApiError::internal(e, "Failed to encode generation input"))?;

    let ai = state.settings().ai();
    let ledger_id = Uuid::new_v4().to_string();
    repositories::generation_requests::create(
        state.db(),
        repositories::generation_requests::CreateGenerationRequest {
            id: &ledger_id,
            user_id: &admin.id,
            title: &title,
            provider: &ai.provider,
            model_name: &ai.model,
            input: &input,
            created_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to record generation request"))?;

    let job = GenerationJob { request_id: ledger_id.clone() };
    let status = match state.queue().enqueue(GENERATION_QUEUE, &job).await {
        Ok(()) => {
            repositories::generation_requests::mark_enqueued(
                state.db(),
                &ledger_id,
                primitive_now_utc(),
            )
            .await
            .map_err(|e| ApiError::internal(e, "Failed to update generation request"))?;
            GenerationStatus::InProgress
        }
        Err(err) => {
            // Left not_started; the worker's requeue loop picks it up.
            tracing::warn!(ledger_id, error = %err, "Failed to enqueue generation job");
            GenerationStatus::NotStarted
        }
    };

    metrics::counter!("quiz_generation_requests_total", "outcome" => "accepted").increment(1);
    tracing::info!(ledger_id, user_id = %admin.id, topic = %params.topic, "Quiz generation accepted");

    Ok((StatusCode::ACCEPTED, Json(GenerateAcceptedResponse { ledger_id, status })))
}

async fn ai_save(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Json(payload): Json<AiSaveRequest>,
) -> Result<(StatusCode, Json<AiSaveResponse>), ApiError> {
    validate_payload(&payload)?;

    let data_ai = payload.data_ai.unwrap_or_else(|| json!({"source": "callback"}));
    let saved = quiz_generation::save_generated_quiz(
        state.db(),
        &payload.ledger_id,
        payload.questions,
        &data_ai,
    )
    .await?;

    let status = if saved.created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((
        status,
        Json(AiSaveResponse {
            ledger_id: payload.ledger_id,
            quiz_id: saved.quiz.id,
            created: saved.created,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::db::types::{GenerationStatus, UserRole};
    use crate::repositories;
    use crate::test_support::{self, TestContext};

    fn quiz_payload() -> Value {
        json!({
            "title": "Basics",
            "passing_score": 60,
            "max_attempts": 2,
            "questions": [
                {
                    "title": "The sky is blue",
                    "type": "true_false",
                    "points": 10,
                    "answers": [
                        {"id": "T1", "text": "True", "is_correct": true},
                        {"id": "F1", "text": "False", "is_correct": false}
                    ]
                },
                {
                    "title": "Capital of France",
                    "type": "fill_blank",
                    "points": 10,
                    "answers": [{"text": "Paris", "is_correct": true}]
                }
            ]
        })
    }

    fn answers(pairs: &[(&str, &str)]) -> Value {
        let map: serde_json::Map<String, Value> = pairs
            .iter()
            .map(|(question_id, answer)| (question_id.to_string(), json!(answer)))
            .collect();
        Value::Object(map)
    }

    async fn send(
        ctx: &TestContext,
        method: Method,
        uri: &str,
        token: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(method, uri, Some(token), body))
            .await
            .expect("response");
        let status = response.status();
        (status, test_support::read_json(response).await)
    }

    #[tokio::test]
    async fn admin_creates_assigns_and_student_makes_attempts() {
        let ctx = test_support::setup_test_context().await;
        let pool = ctx.state.db();
        let admin = test_support::insert_user(pool, "admin", UserRole::Administrator, None, None).await;
        let parent = test_support::insert_user(pool, "parent", UserRole::Parent, None, None).await;
        let student =
            test_support::insert_user(pool, "student", UserRole::Student, Some(&parent.id), None).await;
        let admin_token = test_support::bearer_token(&admin, ctx.state.settings());
        let parent_token = test_support::bearer_token(&parent, ctx.state.settings());
        let student_token = test_support::bearer_token(&student, ctx.state.settings());

        let (status, quiz) =
            send(&ctx, Method::POST, "/api/v1/quizzes", &admin_token, Some(quiz_payload())).await;
        assert_eq!(status, StatusCode::CREATED, "response: {quiz}");
        assert_eq!(quiz["total_points"], 20.0);
        let quiz_id = quiz["id"].as_str().unwrap().to_string();
        let first_question = quiz["questions"][0]["id"].as_str().unwrap().to_string();
        let second_question = quiz["questions"][1]["id"].as_str().unwrap().to_string();
        assert!(quiz["questions"][0]["options"][0].get("is_correct").is_none());
        assert!(quiz["questions"][1]["options"].as_array().unwrap().is_empty());

        let (status, _) = send(
            &ctx,
            Method::POST,
            &format!("/api/v1/quizzes/{quiz_id}/make"),
            &student_token,
            Some(json!({"answers": {}, "submission_time": 5})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, assignment) = send(
            &ctx,
            Method::POST,
            &format!("/api/v1/quizzes/{quiz_id}/assign"),
            &parent_token,
            Some(json!({"student_id": student.id})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "response: {assignment}");
        assert_eq!(assignment["status"], "not_started");

        let (status, result) = send(
            &ctx,
            Method::POST,
            &format!("/api/v1/quizzes/{quiz_id}/make"),
            &student_token,
            Some(json!({
                "answers": answers(&[(first_question.as_str(), "T1"), (second_question.as_str(), " paris ")]),
                "submission_time": 42
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "response: {result}");
        assert_eq!(result["history"]["attempt_number"], 1);
        assert_eq!(result["history"]["total_score"], 20.0);
        assert_eq!(result["history"]["status"], "passed");
        assert_eq!(result["rate_percent"], 100.0);

        let (status, result) = send(
            &ctx,
            Method::POST,
            &format!("/api/v1/quizzes/{quiz_id}/make"),
            &student_token,
            Some(json!({"answers": answers(&[(first_question.as_str(), "F1")]), "submission_time": 10})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "response: {result}");
        assert_eq!(result["history"]["attempt_number"], 2);
        assert_eq!(result["history"]["status"], "failed");
        assert_eq!(result["attempt_count"], 2);
        let history_id = result["history"]["id"].as_str().unwrap().to_string();

        let (status, history) = send(
            &ctx,
            Method::GET,
            &format!("/api/v1/quizzes/{quiz_id}/history"),
            &student_token,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "response: {history}");
        let attempts = history.as_array().unwrap();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0]["attempt_number"], 2);

        let (status, history) = send(
            &ctx,
            Method::GET,
            &format!("/api/v1/quizzes/{quiz_id}/history?child_id={}", student.id),
            &parent_token,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "response: {history}");
        assert_eq!(history.as_array().unwrap().len(), 2);

        let (status, detail) = send(
            &ctx,
            Method::GET,
            &format!("/api/v1/quizzes/history/{history_id}"),
            &student_token,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "response: {detail}");
        assert_eq!(detail["quiz"]["id"], quiz_id);
        assert_eq!(detail["questions"].as_array().unwrap().len(), 2);
        assert_eq!(detail["questions"][0]["passed"], false);
        assert_eq!(detail["failed_question_ids"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn quiz_creation_rejects_broken_questions() {
        let ctx = test_support::setup_test_context().await;
        let pool = ctx.state.db();
        let admin = test_support::insert_user(pool, "admin", UserRole::Administrator, None, None).await;
        let student = test_support::insert_user(pool, "student", UserRole::Student, None, None).await;
        let admin_token = test_support::bearer_token(&admin, ctx.state.settings());
        let student_token = test_support::bearer_token(&student, ctx.state.settings());

        let (status, _) =
            send(&ctx, Method::POST, "/api/v1/quizzes", &student_token, Some(quiz_payload())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let mut payload = quiz_payload();
        payload["questions"][0]["answers"][1]["is_correct"] = json!(true);
        let (status, body) =
            send(&ctx, Method::POST, "/api/v1/quizzes", &admin_token, Some(payload)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "response: {body}");
        assert!(body["errors"]["questions[0].answers"].is_array());

        let mut payload = quiz_payload();
        payload["questions"][1]["points"] = json!(-1);
        let (status, body) =
            send(&ctx, Method::POST, "/api/v1/quizzes", &admin_token, Some(payload)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "response: {body}");
        assert!(body["errors"]["questions[1].points"].is_array());
    }

    #[tokio::test]
    async fn generate_ai_records_a_ledger_entry_and_ai_save_is_idempotent() {
        let ctx = test_support::setup_test_context().await;
        let pool = ctx.state.db();
        let admin = test_support::insert_user(pool, "admin", UserRole::Administrator, None, None).await;
        let token = test_support::bearer_token(&admin, ctx.state.settings());

        let (status, accepted) = send(
            &ctx,
            Method::POST,
            "/api/v1/quizzes/generate_ai",
            &token,
            Some(json!({
                "title": "Arithmetic",
                "topic": "Addition",
                "total_questions": 2,
                "difficulty": {"easy": 1, "medium": 1},
                "total_points": 10
            })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED, "response: {accepted}");
        let ledger_id = accepted["ledger_id"].as_str().unwrap().to_string();

        let entry =
            repositories::generation_requests::find_by_id(pool, &ledger_id).await.unwrap().unwrap();
        assert!(matches!(entry.status, GenerationStatus::NotStarted | GenerationStatus::InProgress));
        assert_eq!(entry.input.0["total_points"], 10.0);
        assert_eq!(entry.title, "Arithmetic");

        let questions = json!([
            {"title": "1+1", "difficulty": "easy", "type": "true_false", "points": 4,
             "answers": [{"text": "2", "isCorrect": true}, {"text": "3", "isCorrect": false}]},
            {"title": "2+2", "difficulty": "medium", "type": "fill_blank", "points": 6,
             "answers": [{"text": "4", "isCorrect": true}]}
        ]);
        let save = json!({"ledger_id": ledger_id, "questions": questions});

        let (status, first) =
            send(&ctx, Method::POST, "/api/v1/quizzes/ai-save", &token, Some(save.clone())).await;
        assert_eq!(status, StatusCode::CREATED, "response: {first}");
        assert_eq!(first["created"], true);

        let (status, second) =
            send(&ctx, Method::POST, "/api/v1/quizzes/ai-save", &token, Some(save)).await;
        assert_eq!(status, StatusCode::OK, "response: {second}");
        assert_eq!(second["quiz_id"], first["quiz_id"]);

        let entry =
            repositories::generation_requests::find_by_id(pool, &ledger_id).await.unwrap().unwrap();
        assert_eq!(entry.status, GenerationStatus::Completed);
        assert_eq!(entry.quiz_id.as_deref(), first["quiz_id"].as_str());
    }

    #[tokio::test]
    async fn generate_ai_rejects_mismatched_difficulty_split() {
        let ctx = test_support::setup_test_context().await;
        let pool = ctx.state.db();
        let admin = test_support::insert_user(pool, "admin", UserRole::Administrator, None, None).await;
        let token = test_support::bearer_token(&admin, ctx.state.settings());

        let (status, body) = send(
            &ctx,
            Method::POST,
            "/api/v1/quizzes/generate_ai",
            &token,
            Some(json!({
                "title": "Arithmetic",
                "topic": "Addition",
                "total_questions": 3,
                "difficulty": {"easy": 1},
                "total_points": 10
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "response: {body}");
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quiz_generation_requests")
            .fetch_one(pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
