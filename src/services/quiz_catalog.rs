//! Quiz creation, assignment and the student-facing quiz view.

use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::core::time::primitive_now_utc;
use crate::db::models::{AnswerOption, Assignment, Question, Quiz};
use crate::db::types::{DifficultyLevel, QuestionType, UserRole};
use crate::repositories;
use crate::services::grading_rules::{check_answer_configuration, AnswerConfigError};

const POINTS_EPSILON: f64 = 1e-6;

#[derive(Debug, Error)]
pub(crate) enum CatalogError {
    #[error("quiz must contain at least one question")]
    NoQuestions,
    #[error("question {index}: {source}")]
    InvalidQuestion {
        index: usize,
        #[source]
        source: AnswerConfigError,
    },
    #[error("question {index}: points must be a positive number")]
    InvalidPoints { index: usize },
    #[error("quiz total points must be greater than zero")]
    ZeroTotalPoints,
    #[error("quiz not found")]
    QuizNotFound,
    #[error("student not found")]
    StudentNotFound,
    #[error("assignment not found")]
    AssignmentNotFound,
    #[error("no attempts remaining for this quiz")]
    AttemptsExhausted,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub(crate) struct AnswerDraft {
    pub(crate) id: Option<String>,
    pub(crate) text: String,
    pub(crate) is_correct: bool,
    pub(crate) explanation: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct QuestionDraft {
    pub(crate) title: String,
    pub(crate) content: Option<String>,
    pub(crate) question_type: QuestionType,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) points: f64,
    pub(crate) explanation: Option<String>,
    pub(crate) answers: Vec<AnswerDraft>,
}

#[derive(Debug, Clone)]
pub(crate) struct QuizDraft {
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) difficulty: Option<DifficultyLevel>,
    pub(crate) passing_score: f64,
    pub(crate) max_attempts: i32,
    pub(crate) questions: Vec<QuestionDraft>,
}

#[derive(Debug, Clone)]
pub(crate) struct QuizWithQuestions {
    pub(crate) quiz: Quiz,
    pub(crate) questions: Vec<Question>,
}

/// A question that passed validation, with option ids filled in.
#[derive(Debug, Clone)]
pub(crate) struct PreparedQuestion {
    pub(crate) draft: QuestionDraft,
    pub(crate) options: Vec<AnswerOption>,
}

/// Validates every question and returns them with their total point value.
pub(crate) fn prepare_questions(
    drafts: Vec<QuestionDraft>,
) -> Result<(Vec<PreparedQuestion>, f64), CatalogError> {
    if drafts.is_empty() {
        return Err(CatalogError::NoQuestions);
    }

    let mut prepared = Vec::with_capacity(drafts.len());
    let mut total_points = 0.0;

    for (index, draft) in drafts.into_iter().enumerate() {
        if !draft.points.is_finite() || draft.points <= 0.0 {
            return Err(CatalogError::InvalidPoints { index });
        }

        let options: Vec<AnswerOption> = draft
            .answers
            .iter()
            .map(|answer| AnswerOption {
                id: answer
                    .id
                    .as_deref()
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
                text: answer.text.trim().to_string(),
                is_correct: answer.is_correct,
                explanation: answer.explanation.clone(),
            })
            .collect();

        check_answer_configuration(draft.question_type, &options)
            .map_err(|source| CatalogError::InvalidQuestion { index, source })?;

        total_points += draft.points;
        prepared.push(PreparedQuestion { draft, options });
    }

    if total_points <= POINTS_EPSILON {
        return Err(CatalogError::ZeroTotalPoints);
    }

    Ok((prepared, total_points))
}

/// Writes the quiz and its questions inside the caller's transaction.
pub(crate) async fn insert_quiz(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    creator_id: &str,
    draft: QuizDraft,
) -> Result<QuizWithQuestions, CatalogError> {
    let QuizDraft { title, description, difficulty, passing_score, max_attempts, questions } =
        draft;
    let (prepared, total_points) = prepare_questions(questions)?;
    let now = primitive_now_utc();

    let mut stored = Vec::with_capacity(prepared.len());
    for question in &prepared {
        let id = Uuid::new_v4().to_string();
        let row = repositories::questions::create(
            &mut **tx,
            repositories::questions::CreateQuestion {
                id: &id,
                title: question.draft.title.trim(),
                content: question.draft.content.as_deref(),
                question_type: question.draft.question_type,
                answers: &question.options,
                explanation: question.draft.explanation.as_deref(),
                difficulty: question.draft.difficulty,
                points: question.draft.points,
                created_by: Some(creator_id),
                created_at: now,
            },
        )
        .await?;
        stored.push(row);
    }

    let quiz_id = Uuid::new_v4().to_string();
    let quiz = repositories::quizzes::create(
        &mut **tx,
        repositories::quizzes::CreateQuiz {
            id: &quiz_id,
            title: title.trim(),
            description: description.as_deref(),
            difficulty: difficulty.unwrap_or_else(|| dominant_difficulty(&stored)),
            passing_score,
            max_attempts,
            total_points,
            total_questions: stored.len() as i32,
            created_by: creator_id,
            created_at: now,
        },
    )
    .await?;

    let question_ids: Vec<String> = stored.iter().map(|question| question.id.clone()).collect();
    repositories::quizzes::attach_questions(tx, &quiz.id, &question_ids).await?;

    Ok(QuizWithQuestions { quiz, questions: stored })
}

fn dominant_difficulty(questions: &[Question]) -> DifficultyLevel {
    [DifficultyLevel::Easy, DifficultyLevel::Medium, DifficultyLevel::Hard]
        .into_iter()
        .max_by_key(|level| questions.iter().filter(|q| q.difficulty == *level).count())
        .unwrap_or(DifficultyLevel::Medium)
}

pub(crate) async fn create_quiz(
    pool: &PgPool,
    creator_id: &str,
    draft: QuizDraft,
) -> Result<QuizWithQuestions, CatalogError> {
    let mut tx = pool.begin().await?;
    let created = insert_quiz(&mut tx, creator_id, draft).await?;
    tx.commit().await?;

    tracing::info!(
        quiz_id = %created.quiz.id,
        creator_id,
        total_questions = created.quiz.total_questions,
        total_points = created.quiz.total_points,
        "Quiz created"
    );
    Ok(created)
}

pub(crate) async fn load_quiz(pool: &PgPool, quiz_id: &str) -> Result<QuizWithQuestions, CatalogError> {
    let quiz =
        repositories::quizzes::find_by_id(pool, quiz_id).await?.ok_or(CatalogError::QuizNotFound)?;
    let questions = repositories::questions::list_for_quiz(pool, quiz_id).await?;
    Ok(QuizWithQuestions { quiz, questions })
}

/// Idempotent on (student, quiz): assigning twice returns the existing assignment.
pub(crate) async fn assign_quiz(
    pool: &PgPool,
    quiz_id: &str,
    student_id: &str,
) -> Result<Assignment, CatalogError> {
    let quiz =
        repositories::quizzes::find_by_id(pool, quiz_id).await?.ok_or(CatalogError::QuizNotFound)?;
    let student = repositories::users::find_by_id(pool, student_id)
        .await?
        .filter(|user| user.role == UserRole::Student && user.is_active)
        .ok_or(CatalogError::StudentNotFound)?;

    let assignment =
        repositories::assignments::ensure(pool, &quiz.id, &student.id, primitive_now_utc()).await?;
    tracing::info!(assignment_id = %assignment.id, quiz_id, student_id, "Quiz assigned");
    Ok(assignment)
}

pub(crate) async fn start_assignment(
    pool: &PgPool,
    assignment_id: &str,
    student_id: &str,
) -> Result<Assignment, CatalogError> {
    let existing = repositories::assignments::find_for_student(pool, assignment_id, student_id)
        .await?
        .ok_or(CatalogError::AssignmentNotFound)?;

    repositories::assignments::mark_started(pool, &existing.id, student_id, primitive_now_utc())
        .await?
        .ok_or(CatalogError::AttemptsExhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::AssignmentStatus;
    use crate::test_support;

    fn draft(question_type: QuestionType, points: f64, answers: Vec<AnswerDraft>) -> QuestionDraft {
        QuestionDraft {
            title: "Question".to_string(),
            content: None,
            question_type,
            difficulty: DifficultyLevel::Medium,
            points,
            explanation: None,
            answers,
        }
    }

    fn answer(text: &str, is_correct: bool) -> AnswerDraft {
        AnswerDraft { id: None, text: text.to_string(), is_correct, explanation: None }
    }

    #[test]
    fn prepare_assigns_missing_option_ids_and_sums_points() {
        let (prepared, total) = prepare_questions(vec![
            draft(QuestionType::TrueFalse, 2.5, vec![answer("True", true), answer("False", false)]),
            draft(QuestionType::FillBlank, 1.5, vec![answer(" Paris ", true)]),
        ])
        .unwrap();

        assert_eq!(total, 4.0);
        assert!(prepared.iter().flat_map(|q| &q.options).all(|option| !option.id.is_empty()));
        assert_eq!(prepared[1].options[0].text, "Paris");
    }

    #[test]
    fn prepare_rejects_invalid_configurations() {
        assert!(matches!(prepare_questions(vec![]), Err(CatalogError::NoQuestions)));

        let zero_points =
            vec![draft(QuestionType::FillBlank, 0.0, vec![answer("x", true)])];
        assert!(matches!(
            prepare_questions(zero_points),
            Err(CatalogError::InvalidPoints { index: 0 })
        ));

        let bad_single = vec![
            draft(QuestionType::FillBlank, 1.0, vec![answer("x", true)]),
            draft(QuestionType::SingleChoice, 1.0, vec![answer("a", true), answer("b", true)]),
        ];
        assert!(matches!(
            prepare_questions(bad_single),
            Err(CatalogError::InvalidQuestion { index: 1, .. })
        ));
    }

    #[tokio::test]
    async fn create_assign_and_start_flow() {
        let ctx = test_support::setup_test_context().await;
        let pool = ctx.state.db();
        let admin = test_support::insert_user(pool, "admin", UserRole::Administrator, None, None).await;
        let student = test_support::insert_user(pool, "student", UserRole::Student, None, None).await;

        let created = create_quiz(pool, &admin.id, test_support::sample_quiz_draft()).await.unwrap();
        assert_eq!(created.quiz.total_points, 30.0);
        assert_eq!(created.quiz.total_questions, 3);

        let loaded = load_quiz(pool, &created.quiz.id).await.unwrap();
        let titles: Vec<_> = loaded.questions.iter().map(|q| q.title.as_str()).collect();
        assert_eq!(titles, ["The sky is blue", "Pick the prime", "Pick the vowels"]);

        let first = assign_quiz(pool, &created.quiz.id, &student.id).await.unwrap();
        let second = assign_quiz(pool, &created.quiz.id, &student.id).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.attempt_count, 0);

        let started = start_assignment(pool, &first.id, &student.id).await.unwrap();
        assert_eq!(started.status, AssignmentStatus::InProgress);

        assert!(matches!(
            start_assignment(pool, &first.id, &admin.id).await,
            Err(CatalogError::AssignmentNotFound)
        ));
        assert!(matches!(
            assign_quiz(pool, &created.quiz.id, &admin.id).await,
            Err(CatalogError::StudentNotFound)
        ));
    }

    #[tokio::test]
    async fn start_is_rejected_once_attempts_are_used_up() {
        let ctx = test_support::setup_test_context().await;
        let pool = ctx.state.db();
        let admin = test_support::insert_user(pool, "admin", UserRole::Administrator, None, None).await;
        let student = test_support::insert_user(pool, "student", UserRole::Student, None, None).await;
        let (quiz, _) = test_support::insert_sample_quiz(pool, &admin.id).await;
        let assignment = assign_quiz(pool, &quiz.id, &student.id).await.unwrap();

        sqlx::query("UPDATE student_quizzes SET attempt_count = $1 WHERE id = $2")
            .bind(quiz.max_attempts)
            .bind(&assignment.id)
            .execute(pool)
            .await
            .unwrap();

        assert!(matches!(
            start_assignment(pool, &assignment.id, &student.id).await,
            Err(CatalogError::AttemptsExhausted)
        ));
    }
}
