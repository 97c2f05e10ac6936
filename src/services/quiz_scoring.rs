//! Turns a submission into an immutable attempt history row.

use serde_json::{Map, Value};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Assignment, AttemptHistory, Question, Quiz};
use crate::db::types::AttemptVerdict;
use crate::repositories;
use crate::services::grading_rules::{grade, SubmittedAnswer};
use crate::services::notifications::{self, ResultNotice};

#[derive(Debug, Error)]
pub(crate) enum ScoringError {
    #[error("quiz is not assigned to this student")]
    AssignmentNotFound,
    #[error("quiz not found")]
    QuizNotFound,
    #[error("attempt not found")]
    AttemptNotFound,
    #[error("quiz has no points to score against")]
    ZeroTotalPoints,
    #[error("another attempt for this quiz was recorded concurrently, retry the submission")]
    Conflict,
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for ScoringError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict,
            _ => Self::Database(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AttemptOutcome {
    pub(crate) total_score: f64,
    pub(crate) total_points: f64,
    pub(crate) rate_percent: f64,
    pub(crate) verdict: AttemptVerdict,
    pub(crate) passed_question_ids: Vec<String>,
    pub(crate) failed_question_ids: Vec<String>,
}

/// Grades every question in stored order against `answers` (keyed by question id).
pub(crate) fn score_attempt(
    quiz: &Quiz,
    questions: &[Question],
    answers: &Map<String, Value>,
) -> Result<AttemptOutcome, ScoringError> {
    if !quiz.total_points.is_finite() || quiz.total_points <= 0.0 {
        return Err(ScoringError::ZeroTotalPoints);
    }

    let mut total_score = 0.0;
    let mut passed_question_ids = Vec::new();
    let mut failed_question_ids = Vec::new();

    for question in questions {
        let submitted = SubmittedAnswer::resolve(question.question_type, answers.get(&question.id));
        let outcome =
            grade(question.question_type, &question.answers, question.points, submitted.as_ref());

        total_score += outcome.points_awarded;
        if outcome.is_correct {
            passed_question_ids.push(question.id.clone());
        } else {
            failed_question_ids.push(question.id.clone());
        }
    }

    let rate_percent = total_score / quiz.total_points * 100.0;
    let verdict = if rate_percent >= quiz.passing_score {
        AttemptVerdict::Passed
    } else {
        AttemptVerdict::Failed
    };

    Ok(AttemptOutcome {
        total_score,
        total_points: quiz.total_points,
        rate_percent,
        verdict,
        passed_question_ids,
        failed_question_ids,
    })
}

#[derive(Debug, Clone)]
pub(crate) struct AttemptSubmission {
    pub(crate) answers: Map<String, Value>,
    pub(crate) submission_time: i32,
}

#[derive(Debug, Clone)]
pub(crate) struct ScoredAttempt {
    pub(crate) quiz: Quiz,
    pub(crate) assignment: Assignment,
    pub(crate) history: AttemptHistory,
    pub(crate) outcome: AttemptOutcome,
}

/// Scores and records one attempt. The assignment row stays locked from the
/// first read to commit, so attempts for one (student, quiz) pair serialize.
pub(crate) async fn submit_attempt(
    pool: &PgPool,
    student_id: &str,
    quiz_id: &str,
    submission: AttemptSubmission,
) -> Result<ScoredAttempt, ScoringError> {
    let mut tx = pool.begin().await?;

    let assignment =
        repositories::assignments::lock_for_student_quiz(&mut tx, student_id, quiz_id)
            .await?
            .ok_or(ScoringError::AssignmentNotFound)?;
    let quiz = repositories::quizzes::find_by_id(&mut *tx, quiz_id)
        .await?
        .ok_or(ScoringError::QuizNotFound)?;
    let questions = repositories::questions::list_for_quiz(&mut *tx, quiz_id).await?;

    let outcome = score_attempt(&quiz, &questions, &submission.answers)?;

    let now = primitive_now_utc();
    let history_id = Uuid::new_v4().to_string();
    let student_answers = Value::Object(submission.answers);
    let history = repositories::attempt_histories::insert(
        &mut tx,
        repositories::attempt_histories::CreateAttemptHistory {
            id: &history_id,
            student_quiz_id: &assignment.id,
            student_id,
            attempt_number: assignment.attempt_count + 1,
            total_score: outcome.total_score,
            passed_question_ids: &outcome.passed_question_ids,
            failed_question_ids: &outcome.failed_question_ids,
            student_answers: &student_answers,
            submission_time: submission.submission_time.max(0),
            status: outcome.verdict,
            created_at: now,
        },
    )
    .await?;

    let assignment = repositories::assignments::record_attempt(
        &mut tx,
        &assignment.id,
        assignment.attempt_count,
        &history.id,
        now,
    )
    .await?
    .ok_or(ScoringError::Conflict)?;

    tx.commit().await?;

    let verdict_label = if outcome.verdict.is_passed() { "passed" } else { "failed" };
    metrics::counter!("quiz_attempts_total", "verdict" => verdict_label).increment(1);
    metrics::histogram!("quiz_attempt_rate_percent").record(outcome.rate_percent);
    tracing::info!(
        quiz_id,
        student_id,
        history_id = %history.id,
        attempt_number = history.attempt_number,
        total_score = outcome.total_score,
        total_points = outcome.total_points,
        verdict = verdict_label,
        "Quiz attempt recorded"
    );

    Ok(ScoredAttempt { quiz, assignment, history, outcome })
}

/// [`submit_attempt`] followed by a detached guardian notification. The
/// notification never delays or fails the returned result.
pub(crate) async fn submit_and_notify(
    state: &AppState,
    student_id: &str,
    quiz_id: &str,
    submission: AttemptSubmission,
) -> Result<ScoredAttempt, ScoringError> {
    let scored = submit_attempt(state.db(), student_id, quiz_id, submission).await?;

    notifications::spawn_result_notice(
        state.clone(),
        ResultNotice {
            student_id: student_id.to_string(),
            quiz_title: scored.quiz.title.clone(),
            total_score: scored.outcome.total_score,
            total_points: scored.outcome.total_points,
            verdict: scored.outcome.verdict,
        },
    );

    Ok(scored)
}

/// One recorded attempt with the quiz and questions it was scored against.
#[derive(Debug, Clone)]
pub(crate) struct AttemptDetail {
    pub(crate) history: AttemptHistory,
    pub(crate) quiz: Quiz,
    pub(crate) questions: Vec<Question>,
}

pub(crate) async fn attempt_detail(
    pool: &PgPool,
    history_id: &str,
    student_id: &str,
) -> Result<AttemptDetail, ScoringError> {
    let history = repositories::attempt_histories::find_for_student(pool, history_id, student_id)
        .await?
        .ok_or(ScoringError::AttemptNotFound)?;
    let assignment =
        repositories::assignments::find_for_student(pool, &history.student_quiz_id, student_id)
            .await?
            .ok_or(ScoringError::AssignmentNotFound)?;
    let quiz = repositories::quizzes::find_by_id(pool, &assignment.quiz_id)
        .await?
        .ok_or(ScoringError::QuizNotFound)?;
    let questions = repositories::questions::list_for_quiz(pool, &quiz.id).await?;

    Ok(AttemptDetail { history, quiz, questions })
}
