use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::GenerationRequest;
use crate::db::types::GenerationStatus;

const COLUMNS: &str = "\
    id, user_id, title, provider, model_name, input, status, data_ai, data_error, quiz_id, \
    claimed_at, completed_at, created_at, updated_at";

pub(crate) struct CreateGenerationRequest<'a> {
    pub(crate) id: &'a str,
    pub(crate) user_id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) provider: &'a str,
    pub(crate) model_name: &'a str,
    pub(crate) input: &'a serde_json::Value,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    pool: &PgPool,
    params: CreateGenerationRequest<'_>,
) -> Result<GenerationRequest, sqlx::Error> {
    sqlx::query_as::<_, GenerationRequest>(&format!(
        "INSERT INTO quiz_generation_requests (
            id, user_id, title, provider, model_name, input, status, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$8)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.user_id)
    .bind(params.title)
    .bind(params.provider)
    .bind(params.model_name)
    .bind(Json(params.input))
    .bind(GenerationStatus::NotStarted)
    .bind(params.created_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<GenerationRequest>, sqlx::Error> {
    sqlx::query_as::<_, GenerationRequest>(&format!(
        "SELECT {COLUMNS} FROM quiz_generation_requests WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// `not_started -> in_progress` once the job is on the queue. No-op if a worker
/// already claimed the entry.
pub(crate) async fn mark_enqueued(
    pool: &PgPool,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE quiz_generation_requests
         SET status = $1, updated_at = $2
         WHERE id = $3 AND status = $4",
    )
    .bind(GenerationStatus::InProgress)
    .bind(now)
    .bind(id)
    .bind(GenerationStatus::NotStarted)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Takes exclusive ownership of an unclaimed, non-terminal entry. Returns `None`
/// for duplicate deliveries and finished entries.
pub(crate) async fn claim(
    pool: &PgPool,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<Option<GenerationRequest>, sqlx::Error> {
    sqlx::query_as::<_, GenerationRequest>(&format!(
        "UPDATE quiz_generation_requests
         SET status = $1, claimed_at = $2, updated_at = $2
         WHERE id = $3
           AND status IN ($4, $1)
           AND claimed_at IS NULL
         RETURNING {COLUMNS}"
    ))
    .bind(GenerationStatus::InProgress)
    .bind(now)
    .bind(id)
    .bind(GenerationStatus::NotStarted)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn lock_for_update(
    executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: &str,
) -> Result<Option<GenerationRequest>, sqlx::Error> {
    sqlx::query_as::<_, GenerationRequest>(&format!(
        "SELECT {COLUMNS} FROM quiz_generation_requests WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut **executor)
    .await
}

pub(crate) async fn mark_completed(
    executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: &str,
    quiz_id: &str,
    data_ai: &serde_json::Value,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE quiz_generation_requests
         SET status = $1,
             quiz_id = $2,
             data_ai = $3,
             data_error = NULL,
             completed_at = $4,
             updated_at = $4
         WHERE id = $5",
    )
    .bind(GenerationStatus::Completed)
    .bind(quiz_id)
    .bind(Json(data_ai))
    .bind(now)
    .bind(id)
    .execute(&mut **executor)
    .await?;
    Ok(())
}

/// Terminal failure. Entries already in a terminal state are left untouched.
pub(crate) async fn mark_failed(
    pool: &PgPool,
    id: &str,
    data_error: &serde_json::Value,
    data_ai: Option<&serde_json::Value>,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE quiz_generation_requests
         SET status = $1,
             data_error = $2,
             data_ai = COALESCE($3, data_ai),
             completed_at = $4,
             updated_at = $4
         WHERE id = $5 AND status IN ($6, $7)",
    )
    .bind(GenerationStatus::Failed)
    .bind(Json(data_error))
    .bind(data_ai.map(Json))
    .bind(now)
    .bind(id)
    .bind(GenerationStatus::NotStarted)
    .bind(GenerationStatus::InProgress)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Entries that never reached a worker: still `not_started`, or `in_progress`
/// but unclaimed, and untouched since `updated_before`.
pub(crate) async fn list_requeue_candidates(
    pool: &PgPool,
    updated_before: PrimitiveDateTime,
    limit: i64,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT id
         FROM quiz_generation_requests
         WHERE status IN ($1, $2)
           AND claimed_at IS NULL
           AND updated_at < $3
         ORDER BY created_at
         LIMIT $4",
    )
    .bind(GenerationStatus::NotStarted)
    .bind(GenerationStatus::InProgress)
    .bind(updated_before)
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
}

pub(crate) async fn mark_requeued(
    pool: &PgPool,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE quiz_generation_requests
         SET status = $1, updated_at = $2
         WHERE id = $3 AND claimed_at IS NULL AND status IN ($4, $1)",
    )
    .bind(GenerationStatus::InProgress)
    .bind(now)
    .bind(id)
    .bind(GenerationStatus::NotStarted)
    .execute(pool)
    .await?;
    Ok(())
}

/// Fails claimed entries whose worker stopped reporting before `claimed_before`.
pub(crate) async fn fail_stale(
    pool: &PgPool,
    claimed_before: PrimitiveDateTime,
    data_error: &serde_json::Value,
    now: PrimitiveDateTime,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "UPDATE quiz_generation_requests
         SET status = $1,
             data_error = $2,
             completed_at = $3,
             updated_at = $3
         WHERE status = $4
           AND claimed_at IS NOT NULL
           AND claimed_at < $5
         RETURNING id",
    )
    .bind(GenerationStatus::Failed)
    .bind(Json(data_error))
    .bind(now)
    .bind(GenerationStatus::InProgress)
    .bind(claimed_before)
    .fetch_all(pool)
    .await
}

#[derive(Debug, Default, Clone)]
pub(crate) struct ListFilter {
    pub(crate) user_id: Option<String>,
    pub(crate) status: Option<GenerationStatus>,
    pub(crate) model_name: Option<String>,
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &ListFilter) {
    builder.push(" WHERE TRUE");
    if let Some(user_id) = &filter.user_id {
        builder.push(" AND user_id = ");
        builder.push_bind(user_id.clone());
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ");
        builder.push_bind(status);
    }
    if let Some(model_name) = &filter.model_name {
        builder.push(" AND model_name = ");
        builder.push_bind(model_name.clone());
    }
}

pub(crate) async fn list(
    pool: &PgPool,
    filter: &ListFilter,
    skip: i64,
    limit: i64,
) -> Result<Vec<GenerationRequest>, sqlx::Error> {
    let mut builder =
        QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM quiz_generation_requests"));
    push_filter(&mut builder, filter);

    builder.push(" ORDER BY created_at DESC OFFSET ");
    builder.push_bind(skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(limit.clamp(1, 1000));

    builder.build_query_as::<GenerationRequest>().fetch_all(pool).await
}

pub(crate) async fn count(pool: &PgPool, filter: &ListFilter) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM quiz_generation_requests");
    push_filter(&mut builder, filter);
    builder.build_query_scalar::<i64>().fetch_one(pool).await
}
