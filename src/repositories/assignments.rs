use sqlx::{FromRow, PgPool};
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::Assignment;
use crate::db::types::{AssignmentStatus, AttemptVerdict};

const COLUMNS: &str = "\
    id, quiz_id, student_id, attempt_count, status, last_history_id, created_at, updated_at";

/// Creates the (student, quiz) assignment or returns the existing one unchanged.
pub(crate) async fn ensure(
    pool: &PgPool,
    quiz_id: &str,
    student_id: &str,
    now: PrimitiveDateTime,
) -> Result<Assignment, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!(
        "INSERT INTO student_quizzes AS sq (
            id, quiz_id, student_id, attempt_count, status, created_at, updated_at
        ) VALUES ($1,$2,$3,0,$4,$5,$5)
        ON CONFLICT (student_id, quiz_id) DO UPDATE SET updated_at = sq.updated_at
        RETURNING {COLUMNS}",
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(quiz_id)
    .bind(student_id)
    .bind(AssignmentStatus::NotStarted)
    .bind(now)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_for_student(
    pool: &PgPool,
    id: &str,
    student_id: &str,
) -> Result<Option<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!(
        "SELECT {COLUMNS} FROM student_quizzes WHERE id = $1 AND student_id = $2"
    ))
    .bind(id)
    .bind(student_id)
    .fetch_optional(pool)
    .await
}

/// Row-locks the assignment so attempts for one (student, quiz) pair serialize.
pub(crate) async fn lock_for_student_quiz(
    executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    student_id: &str,
    quiz_id: &str,
) -> Result<Option<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!(
        "SELECT {COLUMNS} FROM student_quizzes
         WHERE student_id = $1 AND quiz_id = $2
         FOR UPDATE"
    ))
    .bind(student_id)
    .bind(quiz_id)
    .fetch_optional(&mut **executor)
    .await
}

/// Bumps the attempt counter only if nobody else did since `expected_count` was read.
pub(crate) async fn record_attempt(
    executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: &str,
    expected_count: i32,
    history_id: &str,
    now: PrimitiveDateTime,
) -> Result<Option<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!(
        "UPDATE student_quizzes
         SET attempt_count = attempt_count + 1,
             status = $1,
             last_history_id = $2,
             updated_at = $3
         WHERE id = $4 AND attempt_count = $5
         RETURNING {COLUMNS}"
    ))
    .bind(AssignmentStatus::Completed)
    .bind(history_id)
    .bind(now)
    .bind(id)
    .bind(expected_count)
    .fetch_optional(&mut **executor)
    .await
}

/// Moves an assignment to `in_progress` while attempts remain.
pub(crate) async fn mark_started(
    pool: &PgPool,
    id: &str,
    student_id: &str,
    now: PrimitiveDateTime,
) -> Result<Option<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!(
        "UPDATE student_quizzes sq
         SET status = $1, updated_at = $2
         FROM quizzes q
         WHERE sq.id = $3
           AND sq.student_id = $4
           AND q.id = sq.quiz_id
           AND sq.attempt_count + 1 <= q.max_attempts
         RETURNING {}",
        qualified_columns("sq")
    ))
    .bind(AssignmentStatus::InProgress)
    .bind(now)
    .bind(id)
    .bind(student_id)
    .fetch_optional(pool)
    .await
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct AssignmentOverviewRow {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) quiz_title: String,
    pub(crate) total_points: f64,
    pub(crate) passing_score: f64,
    pub(crate) max_attempts: i32,
    pub(crate) attempt_count: i32,
    pub(crate) status: AssignmentStatus,
    pub(crate) last_history_id: Option<String>,
    pub(crate) last_score: Option<f64>,
    pub(crate) last_verdict: Option<AttemptVerdict>,
    pub(crate) updated_at: PrimitiveDateTime,
}

pub(crate) async fn list_overview_for_student(
    pool: &PgPool,
    student_id: &str,
) -> Result<Vec<AssignmentOverviewRow>, sqlx::Error> {
    sqlx::query_as::<_, AssignmentOverviewRow>(
        "SELECT sq.id,
                sq.quiz_id,
                q.title AS quiz_title,
                q.total_points,
                q.passing_score,
                q.max_attempts,
                sq.attempt_count,
                sq.status,
                sq.last_history_id,
                h.total_score AS last_score,
                h.status AS last_verdict,
                sq.updated_at
         FROM student_quizzes sq
         JOIN quizzes q ON q.id = sq.quiz_id
         LEFT JOIN quiz_attempt_histories h ON h.id = sq.last_history_id
         WHERE sq.student_id = $1
         ORDER BY sq.updated_at DESC",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await
}

fn qualified_columns(alias: &str) -> String {
    COLUMNS
        .split(',')
        .map(|column| format!("{alias}.{}", column.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}
