use sqlx::types::Json;
use time::PrimitiveDateTime;

use crate::db::models::{AnswerOption, Question};
use crate::db::types::{DifficultyLevel, QuestionType};

const COLUMNS: &str = "\
    q.id, q.title, q.content, q.question_type, q.answers, q.explanation, q.difficulty, \
    q.points, q.created_by, q.created_at, q.updated_at";

pub(crate) struct CreateQuestion<'a> {
    pub(crate) id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) content: Option<&'a str>,
    pub(crate) question_type: QuestionType,
    pub(crate) answers: &'a [AnswerOption],
    pub(crate) explanation: Option<&'a str>,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) points: f64,
    pub(crate) created_by: Option<&'a str>,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateQuestion<'_>,
) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions AS q (
            id, title, content, question_type, answers, explanation, difficulty, points,
            created_by, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$10)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.title)
    .bind(params.content)
    .bind(params.question_type)
    .bind(Json(params.answers))
    .bind(params.explanation)
    .bind(params.difficulty)
    .bind(params.points)
    .bind(params.created_by)
    .bind(params.created_at)
    .fetch_one(executor)
    .await
}

/// Questions of a quiz in their stored order.
pub(crate) async fn list_for_quiz(
    executor: impl sqlx::PgExecutor<'_>,
    quiz_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS}
         FROM quiz_questions qq
         JOIN questions q ON q.id = qq.question_id
         WHERE qq.quiz_id = $1
         ORDER BY qq.position"
    ))
    .bind(quiz_id)
    .fetch_all(executor)
    .await
}
