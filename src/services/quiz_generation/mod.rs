//! AI quiz generation: prompt, provider call, repair, validation and persistence
//! of one generation request.
//!
//! Every path through [`QuizGenerator::generate`] that claimed a request ends
//! with the ledger entry in a terminal state.

pub(crate) mod prompt;
pub(crate) mod provider;
pub(crate) mod repair;
pub(crate) mod validate;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::PgPool;
use thiserror::Error;

use crate::core::config::Settings;
use crate::core::time::primitive_now_utc;
use crate::db::models::{GenerationRequest, Quiz};
use crate::db::types::{DifficultyLevel, GenerationStatus, QuestionType};
use crate::repositories;
use crate::services::quiz_catalog;

use provider::{OpenAiCompatibleProvider, ProviderError, QuizModelProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DifficultyCounts {
    pub(crate) easy: u32,
    pub(crate) medium: u32,
    pub(crate) hard: u32,
}

impl DifficultyCounts {
    pub(crate) fn total(&self) -> u32 {
        self.easy + self.medium + self.hard
    }
}

/// Stored verbatim as the ledger entry's `input`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct GenerationParams {
    pub(crate) topic: String,
    pub(crate) total_questions: u32,
    pub(crate) difficulty: DifficultyCounts,
    pub(crate) total_points: f64,
    #[serde(default)]
    pub(crate) question_types: Vec<QuestionType>,
    #[serde(default)]
    pub(crate) language: Option<String>,
    #[serde(default)]
    pub(crate) notes: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
    pub(crate) passing_score: f64,
    pub(crate) max_attempts: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct GeneratedAnswer {
    pub(crate) text: String,
    #[serde(rename = "isCorrect", alias = "is_correct")]
    pub(crate) is_correct: bool,
    #[serde(default)]
    pub(crate) explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct GeneratedQuestion {
    pub(crate) title: String,
    pub(crate) difficulty: DifficultyLevel,
    #[serde(default)]
    pub(crate) content: Option<String>,
    #[serde(rename = "type", alias = "question_type")]
    pub(crate) question_type: QuestionType,
    pub(crate) answers: Vec<GeneratedAnswer>,
    pub(crate) points: f64,
    #[serde(default)]
    pub(crate) explanation: Option<String>,
}

#[derive(Debug, Error)]
pub(crate) enum GenerationError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("model response is not valid JSON: {0}")]
    Parse(String),
    #[error("expected {expected} questions, model returned {actual}")]
    QuestionCountMismatch { expected: u32, actual: usize },
    #[error("question points sum to {actual}, expected {expected}")]
    PointsMismatch { expected: f64, actual: f64 },
    #[error("generated questions are invalid: {0}")]
    InvalidQuestions(String),
    #[error("generation input is invalid: {0}")]
    InvalidInput(String),
    #[error("generation request not found")]
    LedgerNotFound,
    #[error("generation request has already failed")]
    LedgerFailed,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl GenerationError {
    pub(crate) fn code(&self) -> &'static str {
        match self {
            Self::Provider(err) => err.code(),
            Self::Parse(_) => "parse_error",
            Self::QuestionCountMismatch { .. } => "question_count_mismatch",
            Self::PointsMismatch { .. } => "points_mismatch",
            Self::InvalidQuestions(_) => "invalid_question",
            Self::InvalidInput(_)
            | Self::LedgerNotFound
            | Self::LedgerFailed
            | Self::Database(_) => "worker_error",
        }
    }

    /// Structured `data_error` payload stored on the ledger entry.
    pub(crate) fn to_ledger_error(&self) -> Value {
        let mut error = json!({"code": self.code(), "message": self.to_string()});
        if let Self::Provider(provider) = self {
            if let Some(status) = provider.status() {
                error["status"] = json!(status);
            }
        }
        if let Self::PointsMismatch { expected, actual } = self {
            error["expected_points"] = json!(expected);
            error["actual_points"] = json!(actual);
        }
        error
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum GenerationOutcome {
    /// Duplicate delivery, or the entry is already terminal.
    Skipped,
    Completed { quiz_id: String },
    Failed { code: &'static str },
}

#[derive(Debug, Clone)]
pub(crate) struct SavedQuiz {
    pub(crate) quiz: Quiz,
    /// `false` when the ledger entry was already linked to a quiz.
    pub(crate) created: bool,
}

/// Creates the quiz for a ledger entry and completes the entry, in one
/// transaction. Repeated calls for the same entry return the linked quiz.
pub(crate) async fn save_generated_quiz(
    pool: &PgPool,
    ledger_id: &str,
    questions: Vec<GeneratedQuestion>,
    data_ai: &Value,
) -> Result<SavedQuiz, GenerationError> {
    let mut tx = pool.begin().await?;
    let request = repositories::generation_requests::lock_for_update(&mut tx, ledger_id)
        .await?
        .ok_or(GenerationError::LedgerNotFound)?;

    if let Some(quiz_id) = request.quiz_id.as_deref() {
        let quiz = repositories::quizzes::find_by_id(&mut *tx, quiz_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        tx.commit().await?;
        return Ok(SavedQuiz { quiz, created: false });
    }
    if request.status == GenerationStatus::Failed {
        return Err(GenerationError::LedgerFailed);
    }

    let params = request_params(&request)?;
    let draft = validate::check_generated(&params, &request.title, questions)?;
    let created = quiz_catalog::insert_quiz(&mut tx, &request.user_id, draft)
        .await
        .map_err(|err| match err {
            quiz_catalog::CatalogError::Database(db) => GenerationError::Database(db),
            other => GenerationError::InvalidQuestions(other.to_string()),
        })?;

    repositories::generation_requests::mark_completed(
        &mut tx,
        ledger_id,
        &created.quiz.id,
        data_ai,
        primitive_now_utc(),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(ledger_id, quiz_id = %created.quiz.id, "Generated quiz saved");
    Ok(SavedQuiz { quiz: created.quiz, created: true })
}

fn request_params(request: &GenerationRequest) -> Result<GenerationParams, GenerationError> {
    serde_json::from_value(request.input.0.clone())
        .map_err(|err| GenerationError::InvalidInput(err.to_string()))
}

/// Runs generation requests against an injected model provider.
#[derive(Clone)]
pub(crate) struct QuizGenerator {
    provider: Arc<dyn QuizModelProvider>,
    call_timeout: Duration,
}

impl QuizGenerator {
    pub(crate) fn new(provider: Arc<dyn QuizModelProvider>, call_timeout: Duration) -> Self {
        Self { provider, call_timeout }
    }

    pub(crate) fn from_settings(settings: &Settings) -> Result<Self, ProviderError> {
        let provider = OpenAiCompatibleProvider::from_settings(settings)?;
        Ok(Self::new(Arc::new(provider), settings.ai().generation_call_timeout()))
    }

    /// Claims the ledger entry and drives it to a terminal state. Only a failure
    /// to write that state is returned as an error.
    pub(crate) async fn generate(
        &self,
        pool: &PgPool,
        request_id: &str,
    ) -> Result<GenerationOutcome, sqlx::Error> {
        let Some(request) =
            repositories::generation_requests::claim(pool, request_id, primitive_now_utc()).await?
        else {
            tracing::info!(request_id, "Generation request already claimed or finished, skipping");
            return Ok(GenerationOutcome::Skipped);
        };

        tracing::info!(
            request_id,
            provider = self.provider.provider_name(),
            model = self.provider.model_name(),
            "Generation request claimed"
        );

        let mut data_ai = None;
        match self.produce(pool, &request, &mut data_ai).await {
            Ok(saved) => {
                metrics::counter!("quiz_generation_requests_total", "outcome" => "completed")
                    .increment(1);
                Ok(GenerationOutcome::Completed { quiz_id: saved.quiz.id })
            }
            Err(err) => {
                let code = err.code();
                tracing::warn!(request_id, code, error = %err, "Quiz generation failed");
                let data_error = err.to_ledger_error();
                repositories::generation_requests::mark_failed(
                    pool,
                    request_id,
                    &data_error,
                    data_ai.as_ref(),
                    primitive_now_utc(),
                )
                .await?;
                metrics::counter!("quiz_generation_requests_total", "outcome" => code)
                    .increment(1);
                Ok(GenerationOutcome::Failed { code })
            }
        }
    }

    async fn produce(
        &self,
        pool: &PgPool,
        request: &GenerationRequest,
        data_ai: &mut Option<Value>,
    ) -> Result<SavedQuiz, GenerationError> {
        let params = request_params(request)?;
        let prompt = prompt::build_prompt(&params);

        let started = Instant::now();
        let reply = tokio::time::timeout(self.call_timeout, self.provider.complete(&prompt))
            .await
            .map_err(|_| ProviderError::Timeout(self.call_timeout))??;
        let elapsed = started.elapsed().as_secs_f64();
        metrics::histogram!("quiz_generation_provider_seconds").record(elapsed);

        let audit = json!({
            "provider": self.provider.provider_name(),
            "model": self.provider.model_name(),
            "content": reply.content,
            "tokens_used": reply.tokens_used,
            "duration_seconds": elapsed,
        });
        *data_ai = Some(audit.clone());

        let questions = repair::parse_generated_questions(&reply.content)?;
        save_generated_quiz(pool, &request.id, questions, &audit).await
    }
}
