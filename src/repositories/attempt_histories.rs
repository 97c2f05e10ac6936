use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use time::PrimitiveDateTime;

use crate::db::models::AttemptHistory;
use crate::db::types::AttemptVerdict;

const COLUMNS: &str = "\
    h.id, h.student_quiz_id, h.student_id, h.attempt_number, h.total_score, \
    h.passed_question_ids, h.failed_question_ids, h.student_answers, h.submission_time, \
    h.status, h.ai_comment, h.created_at";

pub(crate) struct CreateAttemptHistory<'a> {
    pub(crate) id: &'a str,
    pub(crate) student_quiz_id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) attempt_number: i32,
    pub(crate) total_score: f64,
    pub(crate) passed_question_ids: &'a [String],
    pub(crate) failed_question_ids: &'a [String],
    pub(crate) student_answers: &'a serde_json::Value,
    pub(crate) submission_time: i32,
    pub(crate) status: AttemptVerdict,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn insert(
    executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    params: CreateAttemptHistory<'_>,
) -> Result<AttemptHistory, sqlx::Error> {
    sqlx::query_as::<_, AttemptHistory>(&format!(
        "INSERT INTO quiz_attempt_histories AS h (
            id, student_quiz_id, student_id, attempt_number, total_score,
            passed_question_ids, failed_question_ids, student_answers, submission_time,
            status, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.student_quiz_id)
    .bind(params.student_id)
    .bind(params.attempt_number)
    .bind(params.total_score)
    .bind(Json(params.passed_question_ids))
    .bind(Json(params.failed_question_ids))
    .bind(Json(params.student_answers))
    .bind(params.submission_time)
    .bind(params.status)
    .bind(params.created_at)
    .fetch_one(&mut **executor)
    .await
}

pub(crate) async fn find_for_student(
    pool: &PgPool,
    id: &str,
    student_id: &str,
) -> Result<Option<AttemptHistory>, sqlx::Error> {
    sqlx::query_as::<_, AttemptHistory>(&format!(
        "SELECT {COLUMNS} FROM quiz_attempt_histories h WHERE h.id = $1 AND h.student_id = $2"
    ))
    .bind(id)
    .bind(student_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_for_student_quiz(
    pool: &PgPool,
    student_id: &str,
    quiz_id: &str,
) -> Result<Vec<AttemptHistory>, sqlx::Error> {
    sqlx::query_as::<_, AttemptHistory>(&format!(
        "SELECT {COLUMNS}
         FROM quiz_attempt_histories h
         JOIN student_quizzes sq ON sq.id = h.student_quiz_id
         WHERE sq.student_id = $1 AND sq.quiz_id = $2
         ORDER BY h.attempt_number DESC"
    ))
    .bind(student_id)
    .bind(quiz_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_for_assignment(
    executor: impl sqlx::PgExecutor<'_>,
    student_quiz_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM quiz_attempt_histories WHERE student_quiz_id = $1")
        .bind(student_quiz_id)
        .fetch_one(executor)
        .await
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct AttemptResultRow {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) quiz_title: String,
    pub(crate) attempt_number: i32,
    pub(crate) total_score: f64,
    pub(crate) total_points: f64,
    pub(crate) status: AttemptVerdict,
    pub(crate) submission_time: i32,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn list_results_for_student(
    pool: &PgPool,
    student_id: &str,
    skip: i64,
    limit: i64,
) -> Result<Vec<AttemptResultRow>, sqlx::Error> {
    sqlx::query_as::<_, AttemptResultRow>(
        "SELECT h.id,
                q.id AS quiz_id,
                q.title AS quiz_title,
                h.attempt_number,
                h.total_score,
                q.total_points,
                h.status,
                h.submission_time,
                h.created_at
         FROM quiz_attempt_histories h
         JOIN student_quizzes sq ON sq.id = h.student_quiz_id
         JOIN quizzes q ON q.id = sq.quiz_id
         WHERE h.student_id = $1
         ORDER BY h.created_at DESC
         OFFSET $2 LIMIT $3",
    )
    .bind(student_id)
    .bind(skip.max(0))
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_for_student(pool: &PgPool, student_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM quiz_attempt_histories WHERE student_id = $1")
        .bind(student_id)
        .fetch_one(pool)
        .await
}
