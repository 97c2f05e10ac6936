use uuid::Uuid;

use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::repositories;

/// Makes sure the configured administrator account exists, is active, and has
/// the configured password.
pub(crate) async fn ensure_superuser(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();
    if admin.first_superuser_password.is_empty() {
        tracing::warn!("FIRST_SUPERUSER_PASSWORD not configured; skipping superuser creation");
        return Ok(());
    }

    let username = admin.first_superuser_username.as_str();
    let now = primitive_now_utc();

    let Some(user) = repositories::users::find_by_username(state.db(), username).await? else {
        repositories::users::create(
            state.db(),
            repositories::users::CreateUser {
                id: &Uuid::new_v4().to_string(),
                username,
                hashed_password: security::hash_password(&admin.first_superuser_password)?,
                full_name: "Administrator",
                role: UserRole::Administrator,
                parent_id: None,
                telegram_chat_id: None,
                created_at: now,
            },
        )
        .await?;
        tracing::info!(username, "Created default superuser");
        return Ok(());
    };

    let password_matches =
        security::verify_password(&admin.first_superuser_password, &user.hashed_password)
            .unwrap_or(false);
    let up_to_date =
        password_matches && user.role == UserRole::Administrator && user.is_active;
    if up_to_date {
        tracing::info!(username, "Default superuser already up to date");
        return Ok(());
    }

    let hashed_password = if password_matches {
        None
    } else {
        Some(security::hash_password(&admin.first_superuser_password)?)
    };

    repositories::users::promote_to_active_admin(state.db(), &user.id, hashed_password, now)
        .await?;
    tracing::info!(username, "Updated default superuser");
    Ok(())
}
