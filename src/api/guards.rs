use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::{security, state::AppState};
use crate::db::models::User;
use crate::db::types::UserRole;
use crate::repositories;

pub(crate) struct CurrentUser(pub(crate) User);
pub(crate) struct CurrentAdmin(pub(crate) User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(app_state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let claims = security::verify_token(token, app_state.settings())
            .map_err(|_| ApiError::Unauthorized("Invalid authentication credentials"))?;

        let user = repositories::users::find_by_id(app_state.db(), &claims.sub)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load user"))?;

        let Some(user) = user else {
            return Err(ApiError::Unauthorized("User not found"));
        };

        if !user.is_active {
            return Err(ApiError::Unauthorized("Invalid authentication credentials"));
        }

        Ok(CurrentUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;

        if user.role == UserRole::Administrator {
            Ok(CurrentAdmin(user))
        } else {
            Err(ApiError::Forbidden("Administrator access required"))
        }
    }
}

pub(crate) fn require_role(user: &User, roles: &[UserRole]) -> Result<(), ApiError> {
    if roles.contains(&user.role) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Not enough permissions"))
    }
}

/// Whose attempts `user` may read: their own, a child's (parents), anyone's
/// (administrators).
pub(crate) async fn require_student_access(
    state: &AppState,
    user: &User,
    student_id: &str,
) -> Result<(), ApiError> {
    match user.role {
        UserRole::Administrator => Ok(()),
        UserRole::Student if user.id == student_id => Ok(()),
        UserRole::Parent => {
            let is_child = repositories::users::is_child_of(state.db(), &user.id, student_id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to check guardianship"))?;
            if is_child {
                Ok(())
            } else {
                Err(ApiError::Forbidden("Student is not linked to this parent"))
            }
        }
        UserRole::Student => Err(ApiError::Forbidden("Students can only access their own data")),
    }
}
