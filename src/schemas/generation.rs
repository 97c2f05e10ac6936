use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError};

use crate::core::time::format_primitive;
use crate::db::models::GenerationRequest;
use crate::db::types::{GenerationStatus, QuestionType};
use crate::services::quiz_generation::{DifficultyCounts, GeneratedQuestion, GenerationParams};

#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct DifficultyCountsInput {
    #[serde(default)]
    pub(crate) easy: u32,
    #[serde(default)]
    pub(crate) medium: u32,
    #[serde(default)]
    pub(crate) hard: u32,
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_difficulty_split"))]
pub(crate) struct GenerateQuizRequest {
    #[validate(length(min = 1, max = 255, message = "title must not be empty"))]
    pub(crate) title: String,
    #[validate(length(min = 1, max = 500, message = "topic must not be empty"))]
    pub(crate) topic: String,
    #[serde(alias = "totalQuestions")]
    #[validate(range(min = 1, max = 50, message = "total_questions must be within 1..=50"))]
    pub(crate) total_questions: u32,
    pub(crate) difficulty: DifficultyCountsInput,
    #[serde(alias = "totalPoints")]
    #[validate(range(exclusive_min = 0.0, max = 10000.0, message = "total_points must be positive"))]
    pub(crate) total_points: f64,
    #[serde(default, alias = "questionTypes")]
    pub(crate) question_types: Vec<QuestionType>,
    #[serde(default)]
    #[validate(length(max = 50, message = "language is too long"))]
    pub(crate) language: Option<String>,
    #[serde(default)]
    #[validate(length(max = 2000, message = "notes are too long"))]
    pub(crate) notes: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default, alias = "passingScore")]
    #[validate(range(min = 0.0, max = 100.0, message = "passing_score must be within 0..=100"))]
    pub(crate) passing_score: Option<f64>,
    #[serde(default, alias = "maxAttempts")]
    #[validate(range(min = 1, max = 10, message = "max_attempts must be within 1..=10"))]
    pub(crate) max_attempts: Option<i32>,
}

fn validate_difficulty_split(request: &GenerateQuizRequest) -> Result<(), ValidationError> {
    let counts = request.difficulty;
    let sum = counts.easy as u64 + counts.medium as u64 + counts.hard as u64;
    if sum == request.total_questions as u64 {
        return Ok(());
    }

    let mut error = ValidationError::new("difficulty_split");
    error.message = Some(
        format!(
            "difficulty counts sum to {sum} but total_questions is {}",
            request.total_questions
        )
        .into(),
    );
    Err(error)
}

impl GenerateQuizRequest {
    pub(crate) fn into_params(
        self,
        default_passing_score: f64,
        default_max_attempts: i32,
    ) -> GenerationParams {
        let mut question_types: Vec<QuestionType> = Vec::with_capacity(self.question_types.len());
        for question_type in self.question_types {
            if !question_types.contains(&question_type) {
                question_types.push(question_type);
            }
        }

        GenerationParams {
            topic: self.topic.trim().to_string(),
            total_questions: self.total_questions,
            difficulty: DifficultyCounts {
                easy: self.difficulty.easy,
                medium: self.difficulty.medium,
                hard: self.difficulty.hard,
            },
            total_points: self.total_points,
            question_types,
            language: self.language.filter(|language| !language.trim().is_empty()),
            notes: self.notes.filter(|notes| !notes.trim().is_empty()),
            description: self.description,
            passing_score: self.passing_score.unwrap_or(default_passing_score),
            max_attempts: self.max_attempts.unwrap_or(default_max_attempts),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerateAcceptedResponse {
    pub(crate) ledger_id: String,
    pub(crate) status: GenerationStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AiSaveRequest {
    #[serde(alias = "ledgerId")]
    #[validate(length(min = 1, message = "ledger_id must not be empty"))]
    pub(crate) ledger_id: String,
    #[validate(length(min = 1, max = 50, message = "questions must not be empty"))]
    pub(crate) questions: Vec<GeneratedQuestion>,
    #[serde(default, alias = "dataAi")]
    pub(crate) data_ai: Option<Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AiSaveResponse {
    pub(crate) ledger_id: String,
    pub(crate) quiz_id: String,
    pub(crate) created: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListGenerationQuery {
    #[serde(default)]
    pub(crate) skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    pub(crate) limit: i64,
    #[serde(default)]
    pub(crate) status: Option<GenerationStatus>,
    #[serde(default, alias = "modelName")]
    pub(crate) model_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerationRequestResponse {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) title: String,
    pub(crate) provider: String,
    pub(crate) model_name: String,
    pub(crate) input: Value,
    pub(crate) status: GenerationStatus,
    pub(crate) data_ai: Option<Value>,
    pub(crate) data_error: Option<Value>,
    pub(crate) quiz_id: Option<String>,
    pub(crate) claimed_at: Option<String>,
    pub(crate) completed_at: Option<String>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl GenerationRequestResponse {
    pub(crate) fn from_db(request: GenerationRequest) -> Self {
        Self {
            id: request.id,
            user_id: request.user_id,
            title: request.title,
            provider: request.provider,
            model_name: request.model_name,
            input: request.input.0,
            status: request.status,
            data_ai: request.data_ai.map(|value| value.0),
            data_error: request.data_error.map(|value| value.0),
            quiz_id: request.quiz_id,
            claimed_at: request.claimed_at.map(format_primitive),
            completed_at: request.completed_at.map(format_primitive),
            created_at: format_primitive(request.created_at),
            updated_at: format_primitive(request.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(easy: u32, medium: u32, hard: u32) -> GenerateQuizRequest {
        serde_json::from_value(json!({
            "title": "Algebra",
            "topic": " Linear equations ",
            "totalQuestions": 5,
            "difficulty": {"easy": easy, "medium": medium, "hard": hard},
            "totalPoints": 25,
            "questionTypes": ["single_choice", "true_false", "single_choice"],
            "notes": "   "
        }))
        .unwrap()
    }

    #[test]
    fn difficulty_split_must_match_total() {
        request(2, 2, 1).validate().unwrap();

        let errors = request(2, 2, 2).validate().unwrap_err();
        let text = errors.to_string();
        assert!(text.contains("sum to 6"), "{text}");
    }

    #[test]
    fn params_carry_defaults_and_trimmed_input() {
        let params = request(2, 2, 1).into_params(60.0, 3);

        assert_eq!(params.topic, "Linear equations");
        assert_eq!(params.total_points, 25.0);
        assert_eq!(params.passing_score, 60.0);
        assert_eq!(params.max_attempts, 3);
        assert_eq!(
            params.question_types,
            vec![QuestionType::SingleChoice, QuestionType::TrueFalse]
        );
        assert!(params.notes.is_none());
    }

    #[test]
    fn zero_points_are_rejected() {
        let mut body = json!({
            "title": "Algebra",
            "topic": "Linear equations",
            "total_questions": 1,
            "difficulty": {"easy": 1},
            "total_points": 0
        });
        let invalid: GenerateQuizRequest = serde_json::from_value(body.clone()).unwrap();
        assert!(invalid.validate().unwrap_err().errors().contains_key("total_points"));

        body["total_points"] = json!(3);
        let valid: GenerateQuizRequest = serde_json::from_value(body).unwrap();
        valid.validate().unwrap();
    }
}
