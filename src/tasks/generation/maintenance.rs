use anyhow::{Context, Result};
use serde_json::json;

use crate::core::queue::{GenerationJob, GENERATION_QUEUE};
use crate::core::state::AppState;
use crate::core::time::{primitive_now_utc, seconds_ago};
use crate::repositories;

const REQUEUE_BATCH: i64 = 100;

/// Puts unclaimed ledger entries back on the queue when their job was lost
/// between the ledger insert and the worker (Redis restart, enqueue failure).
pub(crate) async fn requeue_orphaned_requests(state: &AppState) -> Result<usize> {
    let now = primitive_now_utc();
    let cutoff = seconds_ago(now, state.settings().worker().requeue_after_seconds);

    let ids = repositories::generation_requests::list_requeue_candidates(
        state.db(),
        cutoff,
        REQUEUE_BATCH,
    )
    .await
    .context("Failed to list orphaned generation requests")?;

    let mut requeued = 0;
    for id in &ids {
        let job = GenerationJob { request_id: id.clone() };
        if let Err(err) = state.queue().enqueue(GENERATION_QUEUE, &job).await {
            tracing::warn!(request_id = %id, error = %err, "Failed to requeue generation request");
            continue;
        }
        repositories::generation_requests::mark_requeued(state.db(), id, now)
            .await
            .context("Failed to touch requeued generation request")?;
        requeued += 1;
    }

    if requeued > 0 {
        tracing::info!(requeued, "Requeued orphaned generation requests");
    }
    Ok(requeued)
}

/// Fails entries a worker claimed but never finished.
pub(crate) async fn fail_stale_requests(state: &AppState) -> Result<usize> {
    let now = primitive_now_utc();
    let stale_after = state.settings().worker().stale_after_seconds;
    let data_error = json!({
        "code": "worker_timeout",
        "message": format!("generation did not finish within {stale_after} seconds"),
    });

    let ids = repositories::generation_requests::fail_stale(
        state.db(),
        seconds_ago(now, stale_after),
        &data_error,
        now,
    )
    .await
    .context("Failed to fail stale generation requests")?;

    if !ids.is_empty() {
        metrics::counter!("quiz_generation_requests_total", "outcome" => "worker_timeout")
            .increment(ids.len() as u64);
        tracing::warn!(failed = ids.len(), "Failed stale generation requests");
    }
    Ok(ids.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::{GenerationStatus, UserRole};
    use crate::services::quiz_generation::tests::{algebra_params, insert_request};
    use crate::test_support;

    async fn age_request(pool: &sqlx::PgPool, id: &str, claimed: bool) {
        sqlx::query(
            "UPDATE quiz_generation_requests
             SET updated_at = updated_at - INTERVAL '2 days',
                 claimed_at = CASE WHEN $2 THEN created_at - INTERVAL '2 days' ELSE NULL END,
                 status = CASE WHEN $2 THEN 'in_progress' ELSE status END
             WHERE id = $1",
        )
        .bind(id)
        .bind(claimed)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn orphaned_requests_go_back_on_the_queue() {
        let ctx = test_support::setup_test_context().await;
        let pool = ctx.state.db();
        let admin =
            test_support::insert_user(pool, "admin", UserRole::Administrator, None, None).await;
        let orphan = insert_request(pool, &admin.id, &algebra_params()).await;
        let fresh = insert_request(pool, &admin.id, &algebra_params()).await;
        age_request(pool, &orphan, false).await;

        assert_eq!(requeue_orphaned_requests(&ctx.state).await.unwrap(), 1);

        let job: GenerationJob =
            ctx.state.queue().dequeue(GENERATION_QUEUE).await.unwrap().unwrap();
        assert_eq!(job.request_id, orphan);
        let entry =
            repositories::generation_requests::find_by_id(pool, &orphan).await.unwrap().unwrap();
        assert_eq!(entry.status, GenerationStatus::InProgress);
        assert!(entry.claimed_at.is_none());

        let untouched =
            repositories::generation_requests::find_by_id(pool, &fresh).await.unwrap().unwrap();
        assert_eq!(untouched.status, GenerationStatus::NotStarted);
    }

    #[tokio::test]
    async fn stale_claims_are_failed_with_worker_timeout() {
        let ctx = test_support::setup_test_context().await;
        let pool = ctx.state.db();
        let admin =
            test_support::insert_user(pool, "admin", UserRole::Administrator, None, None).await;
        let stale = insert_request(pool, &admin.id, &algebra_params()).await;
        let pending = insert_request(pool, &admin.id, &algebra_params()).await;
        age_request(pool, &stale, true).await;

        assert_eq!(fail_stale_requests(&ctx.state).await.unwrap(), 1);

        let entry =
            repositories::generation_requests::find_by_id(pool, &stale).await.unwrap().unwrap();
        assert_eq!(entry.status, GenerationStatus::Failed);
        assert_eq!(entry.data_error.unwrap().0["code"], "worker_timeout");
        assert!(entry.completed_at.is_some());
        assert!(entry.quiz_id.is_none());

        let entry =
            repositories::generation_requests::find_by_id(pool, &pending).await.unwrap().unwrap();
        assert_eq!(entry.status, GenerationStatus::NotStarted);
    }
}
