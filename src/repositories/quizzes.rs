use time::PrimitiveDateTime;

use crate::db::models::Quiz;
use crate::db::types::DifficultyLevel;

const COLUMNS: &str = "\
    id, title, description, difficulty, passing_score, max_attempts, total_points, \
    total_questions, is_active, created_by, created_at, updated_at";

pub(crate) struct CreateQuiz<'a> {
    pub(crate) id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) description: Option<&'a str>,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) passing_score: f64,
    pub(crate) max_attempts: i32,
    pub(crate) total_points: f64,
    pub(crate) total_questions: i32,
    pub(crate) created_by: &'a str,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateQuiz<'_>,
) -> Result<Quiz, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(&format!(
        "INSERT INTO quizzes (
            id, title, description, difficulty, passing_score, max_attempts, total_points,
            total_questions, is_active, created_by, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,TRUE,$9,$10,$10)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.title)
    .bind(params.description)
    .bind(params.difficulty)
    .bind(params.passing_score)
    .bind(params.max_attempts)
    .bind(params.total_points)
    .bind(params.total_questions)
    .bind(params.created_by)
    .bind(params.created_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn attach_questions(
    executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    quiz_id: &str,
    question_ids: &[String],
) -> Result<(), sqlx::Error> {
    for (position, question_id) in question_ids.iter().enumerate() {
        sqlx::query(
            "INSERT INTO quiz_questions (quiz_id, question_id, position)
             VALUES ($1,$2,$3)",
        )
        .bind(quiz_id)
        .bind(question_id)
        .bind(position as i32)
        .execute(&mut **executor)
        .await?;
    }

    Ok(())
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Quiz>, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(&format!("SELECT {COLUMNS} FROM quizzes WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}
