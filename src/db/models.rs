use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{
    AssignmentStatus, AttemptVerdict, DifficultyLevel, GenerationStatus, QuestionType, UserRole,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) hashed_password: String,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) parent_id: Option<String>,
    pub(crate) telegram_chat_id: Option<String>,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// One selectable (or, for `fill_blank`, acceptable) answer stored inline on a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct AnswerOption {
    pub(crate) id: String,
    pub(crate) text: String,
    pub(crate) is_correct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) content: Option<String>,
    pub(crate) question_type: QuestionType,
    pub(crate) answers: Json<Vec<AnswerOption>>,
    pub(crate) explanation: Option<String>,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) points: f64,
    pub(crate) created_by: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Quiz {
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
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Assignment {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) student_id: String,
    pub(crate) attempt_count: i32,
    pub(crate) status: AssignmentStatus,
    pub(crate) last_history_id: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AttemptHistory {
    pub(crate) id: String,
    pub(crate) student_quiz_id: String,
    pub(crate) student_id: String,
    pub(crate) attempt_number: i32,
    pub(crate) total_score: f64,
    pub(crate) passed_question_ids: Json<Vec<String>>,
    pub(crate) failed_question_ids: Json<Vec<String>>,
    pub(crate) student_answers: Json<serde_json::Value>,
    pub(crate) submission_time: i32,
    pub(crate) status: AttemptVerdict,
    pub(crate) ai_comment: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct GenerationRequest {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) title: String,
    pub(crate) provider: String,
    pub(crate) model_name: String,
    pub(crate) input: Json<serde_json::Value>,
    pub(crate) status: GenerationStatus,
    pub(crate) data_ai: Option<Json<serde_json::Value>>,
    pub(crate) data_error: Option<Json<serde_json::Value>>,
    pub(crate) quiz_id: Option<String>,
    pub(crate) claimed_at: Option<PrimitiveDateTime>,
    pub(crate) completed_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}
