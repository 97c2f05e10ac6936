use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Assignment, Question, Quiz};
use crate::db::types::{AssignmentStatus, DifficultyLevel, QuestionType};
use crate::services::quiz_catalog::{AnswerDraft, QuestionDraft, QuizDraft, QuizWithQuestions};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub(crate) struct AnswerCreate {
    #[serde(default)]
    pub(crate) id: Option<String>,
    #[validate(length(min = 1, max = 1000, message = "answer text must not be empty"))]
    pub(crate) text: String,
    #[serde(alias = "isCorrect")]
    pub(crate) is_correct: bool,
    #[serde(default)]
    pub(crate) explanation: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub(crate) struct QuestionCreate {
    #[validate(length(min = 1, max = 500, message = "title must not be empty"))]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) content: Option<String>,
    #[serde(rename = "type", alias = "question_type", alias = "questionType")]
    pub(crate) question_type: QuestionType,
    #[serde(default = "default_difficulty")]
    pub(crate) difficulty: DifficultyLevel,
    #[validate(range(exclusive_min = 0.0, message = "points must be positive"))]
    pub(crate) points: f64,
    #[serde(default)]
    pub(crate) explanation: Option<String>,
    #[validate(length(min = 1, message = "at least one answer is required"))]
    #[validate(nested)]
    pub(crate) answers: Vec<AnswerCreate>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuizCreate {
    #[validate(length(min = 1, max = 255, message = "title must not be empty"))]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default)]
    pub(crate) difficulty: Option<DifficultyLevel>,
    #[serde(default, alias = "passingScore")]
    #[validate(range(min = 0.0, max = 100.0, message = "passing_score must be within 0..=100"))]
    pub(crate) passing_score: Option<f64>,
    #[serde(default, alias = "maxAttempts")]
    #[validate(range(min = 1, max = 10, message = "max_attempts must be within 1..=10"))]
    pub(crate) max_attempts: Option<i32>,
    #[validate(length(min = 1, message = "quiz must contain at least one question"))]
    #[validate(nested)]
    pub(crate) questions: Vec<QuestionCreate>,
}

impl QuizCreate {
    pub(crate) fn into_draft(self, default_passing_score: f64, default_max_attempts: i32) -> QuizDraft {
        QuizDraft {
            title: self.title.trim().to_string(),
            description: self.description,
            difficulty: self.difficulty,
            passing_score: self.passing_score.unwrap_or(default_passing_score),
            max_attempts: self.max_attempts.unwrap_or(default_max_attempts),
            questions: self
                .questions
                .into_iter()
                .map(|question| QuestionDraft {
                    title: question.title,
                    content: question.content,
                    question_type: question.question_type,
                    difficulty: question.difficulty,
                    points: question.points,
                    explanation: question.explanation,
                    answers: question
                        .answers
                        .into_iter()
                        .map(|answer| AnswerDraft {
                            id: answer.id,
                            text: answer.text,
                            is_correct: answer.is_correct,
                            explanation: answer.explanation,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AssignQuizRequest {
    #[serde(alias = "studentId")]
    #[validate(length(min = 1, message = "student_id must not be empty"))]
    pub(crate) student_id: String,
}

/// Selectable option as shown to a student. Never carries `is_correct`.
#[derive(Debug, Serialize)]
pub(crate) struct PublicOption {
    pub(crate) id: String,
    pub(crate) text: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct PublicQuestion {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) content: Option<String>,
    #[serde(rename = "type")]
    pub(crate) question_type: QuestionType,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) points: f64,
    /// Empty for `fill_blank`: listing the accepted texts would leak the key.
    pub(crate) options: Vec<PublicOption>,
}

impl PublicQuestion {
    pub(crate) fn from_db(question: Question) -> Self {
        let options = if question.question_type == QuestionType::FillBlank {
            Vec::new()
        } else {
            question
                .answers
                .0
                .into_iter()
                .map(|option| PublicOption { id: option.id, text: option.text })
                .collect()
        };

        Self {
            id: question.id,
            title: question.title,
            content: question.content,
            question_type: question.question_type,
            difficulty: question.difficulty,
            points: question.points,
            options,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuizSummary {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) passing_score: f64,
    pub(crate) max_attempts: i32,
    pub(crate) total_points: f64,
    pub(crate) total_questions: i32,
    pub(crate) is_active: bool,
    pub(crate) created_by: String,
    pub(crate) created_at: String,
}

impl QuizSummary {
    pub(crate) fn from_db(quiz: Quiz) -> Self {
        Self {
            id: quiz.id,
            title: quiz.title,
            description: quiz.description,
            difficulty: quiz.difficulty,
            passing_score: quiz.passing_score,
            max_attempts: quiz.max_attempts,
            total_points: quiz.total_points,
            total_questions: quiz.total_questions,
            is_active: quiz.is_active,
            created_by: quiz.created_by,
            created_at: format_primitive(quiz.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuizResponse {
    #[serde(flatten)]
    pub(crate) quiz: QuizSummary,
    pub(crate) questions: Vec<PublicQuestion>,
}

impl QuizResponse {
    pub(crate) fn from_loaded(loaded: QuizWithQuestions) -> Self {
        Self {
            quiz: QuizSummary::from_db(loaded.quiz),
            questions: loaded.questions.into_iter().map(PublicQuestion::from_db).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AssignmentResponse {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) student_id: String,
    pub(crate) attempt_count: i32,
    pub(crate) status: AssignmentStatus,
    pub(crate) last_history_id: Option<String>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl AssignmentResponse {
    pub(crate) fn from_db(assignment: Assignment) -> Self {
        Self {
            id: assignment.id,
            quiz_id: assignment.quiz_id,
            student_id: assignment.student_id,
            attempt_count: assignment.attempt_count,
            status: assignment.status,
            last_history_id: assignment.last_history_id,
            created_at: format_primitive(assignment.created_at),
            updated_at: format_primitive(assignment.updated_at),
        }
    }
}

fn default_difficulty() -> DifficultyLevel {
    DifficultyLevel::Medium
}
