use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::validation::validate_payload;
use crate::core::security;
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::auth::{LoginRequest, TokenResponse};
use crate::schemas::user::UserResponse;

/// Max login attempts per username per window.
const LOGIN_RATE_LIMIT: u64 = 10;
const LOGIN_RATE_WINDOW_SECONDS: u64 = 60;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/login", post(login)).route("/me", get(me))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    validate_payload(&payload)?;
    let username = payload.username.trim();

    let rate_key = format!("rl:login:{}", username.to_lowercase());
    let allowed = state
        .redis()
        .rate_limit(&rate_key, LOGIN_RATE_LIMIT, LOGIN_RATE_WINDOW_SECONDS)
        .await
        .unwrap_or(true);
    if !allowed {
        return Err(ApiError::TooManyRequests("Too many login attempts, try again later"));
    }

    let user = repositories::users::find_by_username(state.db(), username)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?
        .ok_or(ApiError::Unauthorized("Incorrect username or password"))?;

    let verified = security::verify_password(&payload.password, &user.hashed_password)
        .map_err(|_| ApiError::Unauthorized("Incorrect username or password"))?;
    if !verified {
        return Err(ApiError::Unauthorized("Incorrect username or password"));
    }

    if !user.is_active {
        return Err(ApiError::Forbidden("Inactive user"));
    }

    let token = security::create_access_token(&user.id, user.role, state.settings(), None)
        .map_err(|e| ApiError::internal(e, "Failed to create access token"))?;

    tracing::info!(user_id = %user.id, role = ?user.role, "User logged in");
    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        user: UserResponse::from_db(user),
    }))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from_db(user))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::db::types::UserRole;
    use crate::test_support;

    #[tokio::test]
    async fn login_then_me_round_trip() {
        let ctx = test_support::setup_test_context().await;
        test_support::insert_user(ctx.state.db(), "alice", UserRole::Student, None, None).await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({"username": "alice", "password": test_support::TEST_PASSWORD})),
            ))
            .await
            .expect("login");
        let status = response.status();
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::OK, "response: {body}");
        assert_eq!(body["token_type"], "bearer");
        assert_eq!(body["user"]["role"], "student");
        let token = body["access_token"].as_str().expect("token").to_string();

        let response = ctx
            .app
            .oneshot(test_support::json_request(Method::GET, "/api/v1/auth/me", Some(&token), None))
            .await
            .expect("me");
        let status = response.status();
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::OK, "response: {body}");
        assert_eq!(body["username"], "alice");
        assert!(body.get("hashed_password").is_none());
    }

    #[tokio::test]
    async fn wrong_password_and_missing_token_are_unauthorized() {
        let ctx = test_support::setup_test_context().await;
        test_support::insert_user(ctx.state.db(), "bob", UserRole::Parent, None, None).await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({"username": "bob", "password": "wrong-password"})),
            ))
            .await
            .expect("login");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = ctx
            .app
            .oneshot(test_support::json_request(Method::GET, "/api/v1/auth/me", None, None))
            .await
            .expect("me");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
