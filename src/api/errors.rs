use std::collections::BTreeMap;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::core::time::now_rfc3339;
use crate::services::quiz_catalog::CatalogError;
use crate::services::quiz_generation::GenerationError;
use crate::services::quiz_scoring::ScoringError;

pub(crate) type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<FieldErrors>,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    Forbidden(&'static str),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Validation { detail: String, errors: FieldErrors },
    TooManyRequests(&'static str),
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    pub(crate) fn validation(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.clone()]);
        Self::Validation { detail: message, errors }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (detail, errors) = match self {
            Self::Unauthorized(message) | Self::Forbidden(message) | Self::TooManyRequests(message) => {
                (message.to_string(), None)
            }
            Self::Validation { detail, errors } => (detail, Some(errors)),
            Self::ServiceUnavailable(message) => {
                tracing::error!(error = %message, "Service unavailable");
                (message, None)
            }
            Self::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                (message, None)
            }
            Self::BadRequest(message) | Self::NotFound(message) | Self::Conflict(message) => {
                (message, None)
            }
        };

        let body = ErrorResponse { status: status.as_u16(), detail, timestamp: now_rfc3339(), errors };
        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        collect_field_errors(&errors, "", &mut fields);
        Self::Validation { detail: "Request validation failed".to_string(), errors: fields }
    }
}

fn collect_field_errors(errors: &ValidationErrors, prefix: &str, out: &mut FieldErrors) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() { field.to_string() } else { format!("{prefix}.{field}") };
        match kind {
            ValidationErrorsKind::Field(list) => {
                let messages = out.entry(path).or_default();
                messages.extend(list.iter().map(|error| {
                    error.message.as_ref().map(|message| message.to_string()).unwrap_or_else(|| {
                        error.code.to_string()
                    })
                }));
            }
            ValidationErrorsKind::Struct(nested) => collect_field_errors(nested, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_field_errors(nested, &format!("{path}[{index}]"), out);
                }
            }
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NoQuestions => Self::validation("questions", err.to_string()),
            CatalogError::InvalidQuestion { index, .. } => {
                Self::validation(&format!("questions[{index}].answers"), err.to_string())
            }
            CatalogError::InvalidPoints { index } => {
                Self::validation(&format!("questions[{index}].points"), err.to_string())
            }
            CatalogError::ZeroTotalPoints => Self::validation("questions", err.to_string()),
            CatalogError::QuizNotFound
            | CatalogError::StudentNotFound
            | CatalogError::AssignmentNotFound => Self::NotFound(err.to_string()),
            CatalogError::AttemptsExhausted => Self::Conflict(err.to_string()),
            CatalogError::Database(db) => Self::internal(db, "Quiz catalog operation failed"),
        }
    }
}

impl From<ScoringError> for ApiError {
    fn from(err: ScoringError) -> Self {
        match err {
            ScoringError::AssignmentNotFound
            | ScoringError::QuizNotFound
            | ScoringError::AttemptNotFound => Self::NotFound(err.to_string()),
            ScoringError::ZeroTotalPoints => Self::validation("quiz", err.to_string()),
            ScoringError::Conflict => Self::Conflict(err.to_string()),
            ScoringError::Database(db) => Self::internal(db, "Failed to record attempt"),
        }
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::LedgerNotFound => Self::NotFound(err.to_string()),
            GenerationError::LedgerFailed => Self::Conflict(err.to_string()),
            GenerationError::QuestionCountMismatch { .. }
            | GenerationError::PointsMismatch { .. }
            | GenerationError::InvalidQuestions(_)
            | GenerationError::Parse(_) => Self::validation("questions", err.to_string()),
            GenerationError::InvalidInput(_) => Self::validation("input", err.to_string()),
            GenerationError::Provider(provider) => {
                Self::ServiceUnavailable(format!("Model provider failed: {provider}"))
            }
            GenerationError::Database(db) => Self::internal(db, "Failed to save generated quiz"),
        }
    }
}
