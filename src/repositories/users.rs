use sqlx::{FromRow, PgPool};
use time::PrimitiveDateTime;

use crate::db::models::User;
use crate::db::types::UserRole;

const COLUMNS: &str = "\
    id, username, hashed_password, full_name, role, parent_id, telegram_chat_id, \
    is_active, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE username = $1"))
        .bind(username)
        .fetch_optional(pool)
        .await
}

pub(crate) struct CreateUser<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub hashed_password: String,
    pub full_name: &'a str,
    pub role: UserRole,
    pub parent_id: Option<&'a str>,
    pub telegram_chat_id: Option<&'a str>,
    pub created_at: PrimitiveDateTime,
}

pub(crate) async fn create(pool: &PgPool, params: CreateUser<'_>) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (
            id, username, hashed_password, full_name, role, parent_id, telegram_chat_id,
            is_active, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,TRUE,$8,$8)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.username)
    .bind(params.hashed_password)
    .bind(params.full_name)
    .bind(params.role)
    .bind(params.parent_id)
    .bind(params.telegram_chat_id)
    .bind(params.created_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn promote_to_active_admin(
    pool: &PgPool,
    id: &str,
    hashed_password: Option<String>,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users
         SET hashed_password = COALESCE($1, hashed_password),
             role = $2,
             is_active = TRUE,
             updated_at = $3
         WHERE id = $4",
    )
    .bind(hashed_password)
    .bind(UserRole::Administrator)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Where a student's guardian wants quiz results delivered.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct GuardianContact {
    pub(crate) guardian_name: String,
    pub(crate) student_name: String,
    pub(crate) chat_id: String,
}

pub(crate) async fn find_guardian_contact(
    pool: &PgPool,
    student_id: &str,
) -> Result<Option<GuardianContact>, sqlx::Error> {
    sqlx::query_as::<_, GuardianContact>(
        "SELECT g.full_name AS guardian_name,
                s.full_name AS student_name,
                g.telegram_chat_id AS chat_id
         FROM users s
         JOIN users g ON g.id = s.parent_id
         WHERE s.id = $1
           AND g.is_active
           AND g.telegram_chat_id IS NOT NULL
           AND g.telegram_chat_id <> ''",
    )
    .bind(student_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn is_child_of(
    pool: &PgPool,
    parent_id: &str,
    child_id: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = $1 AND parent_id = $2 AND role = $3)",
    )
    .bind(child_id)
    .bind(parent_id)
    .bind(UserRole::Student)
    .fetch_one(pool)
    .await
}
