use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{AnswerOption, AttemptHistory, Question};
use crate::db::types::{AssignmentStatus, AttemptVerdict, DifficultyLevel, QuestionType};
use crate::repositories::assignments::AssignmentOverviewRow;
use crate::repositories::attempt_histories::AttemptResultRow;
use crate::schemas::quiz::QuizSummary;
use crate::services::quiz_scoring::{AttemptDetail, ScoredAttempt};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AttemptSubmit {
    /// question id -> submitted value; the shape depends on the question type.
    #[serde(default)]
    pub(crate) answers: Map<String, Value>,
    #[serde(default, alias = "submissionTime")]
    #[validate(range(min = 0, message = "submission_time must be non-negative"))]
    pub(crate) submission_time: i32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryQuery {
    #[serde(default, alias = "childId")]
    pub(crate) child_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptHistoryResponse {
    pub(crate) id: String,
    pub(crate) student_quiz_id: String,
    pub(crate) student_id: String,
    pub(crate) attempt_number: i32,
    pub(crate) total_score: f64,
    pub(crate) passed_question_ids: Vec<String>,
    pub(crate) failed_question_ids: Vec<String>,
    pub(crate) student_answers: Value,
    pub(crate) submission_time: i32,
    pub(crate) status: AttemptVerdict,
    pub(crate) ai_comment: Option<String>,
    pub(crate) created_at: String,
}

impl AttemptHistoryResponse {
    pub(crate) fn from_db(history: AttemptHistory) -> Self {
        Self {
            id: history.id,
            student_quiz_id: history.student_quiz_id,
            student_id: history.student_id,
            attempt_number: history.attempt_number,
            total_score: history.total_score,
            passed_question_ids: history.passed_question_ids.0,
            failed_question_ids: history.failed_question_ids.0,
            student_answers: history.student_answers.0,
            submission_time: history.submission_time,
            status: history.status,
            ai_comment: history.ai_comment,
            created_at: format_primitive(history.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResultResponse {
    pub(crate) history: AttemptHistoryResponse,
    pub(crate) total_points: f64,
    pub(crate) rate_percent: f64,
    pub(crate) passing_score: f64,
    pub(crate) attempt_count: i32,
    pub(crate) max_attempts: i32,
}

impl AttemptResultResponse {
    pub(crate) fn from_scored(scored: ScoredAttempt) -> Self {
        Self {
            history: AttemptHistoryResponse::from_db(scored.history),
            total_points: scored.outcome.total_points,
            rate_percent: scored.outcome.rate_percent,
            passing_score: scored.quiz.passing_score,
            attempt_count: scored.assignment.attempt_count,
            max_attempts: scored.quiz.max_attempts,
        }
    }
}

/// Question as reviewed after an attempt: answer keys are visible.
#[derive(Debug, Serialize)]
pub(crate) struct ReviewedQuestion {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) content: Option<String>,
    #[serde(rename = "type")]
    pub(crate) question_type: QuestionType,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) points: f64,
    pub(crate) explanation: Option<String>,
    pub(crate) answers: Vec<AnswerOption>,
    pub(crate) passed: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptDetailResponse {
    #[serde(flatten)]
    pub(crate) history: AttemptHistoryResponse,
    pub(crate) quiz: QuizSummary,
    pub(crate) questions: Vec<ReviewedQuestion>,
}

impl AttemptDetailResponse {
    pub(crate) fn from_detail(detail: AttemptDetail) -> Self {
        let passed_ids = detail.history.passed_question_ids.0.clone();
        let questions = detail
            .questions
            .into_iter()
            .map(|question: Question| ReviewedQuestion {
                passed: passed_ids.contains(&question.id),
                id: question.id,
                title: question.title,
                content: question.content,
                question_type: question.question_type,
                difficulty: question.difficulty,
                points: question.points,
                explanation: question.explanation,
                answers: question.answers.0,
            })
            .collect();

        Self {
            history: AttemptHistoryResponse::from_db(detail.history),
            quiz: QuizSummary::from_db(detail.quiz),
            questions,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AssignmentOverviewResponse {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) quiz_title: String,
    pub(crate) total_points: f64,
    pub(crate) passing_score: f64,
    pub(crate) max_attempts: i32,
    pub(crate) attempt_count: i32,
    pub(crate) attempts_left: i32,
    pub(crate) status: AssignmentStatus,
    pub(crate) last_history_id: Option<String>,
    pub(crate) last_score: Option<f64>,
    pub(crate) last_verdict: Option<AttemptVerdict>,
    pub(crate) updated_at: String,
}

impl AssignmentOverviewResponse {
    pub(crate) fn from_row(row: AssignmentOverviewRow) -> Self {
        Self {
            attempts_left: (row.max_attempts - row.attempt_count).max(0),
            id: row.id,
            quiz_id: row.quiz_id,
            quiz_title: row.quiz_title,
            total_points: row.total_points,
            passing_score: row.passing_score,
            max_attempts: row.max_attempts,
            attempt_count: row.attempt_count,
            status: row.status,
            last_history_id: row.last_history_id,
            last_score: row.last_score,
            last_verdict: row.last_verdict,
            updated_at: format_primitive(row.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ChildResultResponse {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) quiz_title: String,
    pub(crate) attempt_number: i32,
    pub(crate) total_score: f64,
    pub(crate) total_points: f64,
    pub(crate) status: AttemptVerdict,
    pub(crate) submission_time: i32,
    pub(crate) created_at: String,
}

impl ChildResultResponse {
    pub(crate) fn from_row(row: AttemptResultRow) -> Self {
        Self {
            id: row.id,
            quiz_id: row.quiz_id,
            quiz_title: row.quiz_title,
            attempt_number: row.attempt_number,
            total_score: row.total_score,
            total_points: row.total_points,
            status: row.status,
            submission_time: row.submission_time,
            created_at: format_primitive(row.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn submission_defaults_and_rejects_negative_time() {
        let empty: AttemptSubmit = serde_json::from_value(json!({})).unwrap();
        assert!(empty.answers.is_empty());
        assert_eq!(empty.submission_time, 0);
        empty.validate().unwrap();

        let negative: AttemptSubmit =
            serde_json::from_value(json!({"answers": {"q1": "T1"}, "submissionTime": -3})).unwrap();
        assert!(negative.validate().unwrap_err().errors().contains_key("submission_time"));
    }
}
