use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use thiserror::Error;

use crate::core::config::Settings;

const MAX_RETRIES: u32 = 2;
const QUOTA_ERROR_CODES: &[&str] = &["insufficient_quota", "rate_limit_exceeded", "quota_exceeded"];

#[derive(Debug, Error)]
pub(crate) enum ProviderError {
    #[error("provider quota or rate limit exceeded (HTTP {status}): {message}")]
    RateLimited { status: u16, message: String },
    #[error("provider returned HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("provider request failed: {0}")]
    Transport(String),
    #[error("provider did not answer within {0:?}")]
    Timeout(Duration),
    #[error("provider response has no message content")]
    EmptyResponse,
    #[error("provider client could not be built: {0}")]
    Client(String),
}

impl ProviderError {
    pub(crate) fn code(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "quota_exceeded",
            Self::Timeout(_) => "provider_timeout",
            _ => "provider_error",
        }
    }

    pub(crate) fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { status, .. } | Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ModelPrompt {
    pub(crate) system: String,
    pub(crate) user: String,
    pub(crate) schema: Value,
}

#[derive(Debug, Clone)]
pub(crate) struct ModelReply {
    /// Message text as produced by the model, before any repair.
    pub(crate) content: String,
    pub(crate) tokens_used: Option<u64>,
}

/// A generative model that answers a prompt with (hopefully) schema-shaped JSON text.
#[async_trait]
pub(crate) trait QuizModelProvider: Send + Sync {
    fn provider_name(&self) -> &str;
    fn model_name(&self) -> &str;
    async fn complete(&self, prompt: &ModelPrompt) -> Result<ModelReply, ProviderError>;
}

/// Any endpoint speaking the OpenAI `/chat/completions` dialect.
#[derive(Debug, Clone)]
pub(crate) struct OpenAiCompatibleProvider {
    client: Client,
    provider: String,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
    timeout_seconds: u64,
    retry_backoff: Duration,
}

impl OpenAiCompatibleProvider {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self, ProviderError> {
        let ai = settings.ai();
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(ai.request_timeout_seconds))
            .build()
            .map_err(|err| ProviderError::Client(err.to_string()))?;

        Ok(Self {
            client,
            provider: ai.provider.clone(),
            api_key: ai.api_key.clone(),
            base_url: ai.base_url.trim_end_matches('/').to_string(),
            model: ai.model.clone(),
            max_tokens: ai.max_tokens,
            temperature: ai.temperature,
            timeout_seconds: ai.request_timeout_seconds,
            retry_backoff: Duration::from_secs(1),
        })
    }

    fn payload(&self, prompt: &ModelPrompt) -> Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user}
            ],
            "max_completion_tokens": self.max_tokens,
            "temperature": self.temperature,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "quiz_questions",
                    "strict": true,
                    "schema": prompt.schema
                }
            }
        })
    }

    async fn call_once(&self, payload: &Value) -> Result<Value, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if status.is_success() {
            return Ok(body);
        }
        Err(classify_failure(status, &body))
    }

    fn transport_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(Duration::from_secs(self.timeout_seconds))
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl QuizModelProvider for OpenAiCompatibleProvider {
    fn provider_name(&self) -> &str {
        &self.provider
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &ModelPrompt) -> Result<ModelReply, ProviderError> {
        let payload = self.payload(prompt);

        let mut attempt = 0;
        let body = loop {
            match self.call_once(&payload).await {
                Ok(body) => break body,
                Err(err) if err.is_retryable() && attempt < MAX_RETRIES => {
                    tracing::warn!(model = %self.model, attempt, error = %err, "Retrying provider call");
                    tokio::time::sleep(self.retry_backoff * 2_u32.pow(attempt)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        };

        let content = extract_content(&body)?;
        let tokens_used = body
            .get("usage")
            .and_then(|usage| usage.get("total_tokens"))
            .and_then(|value| value.as_u64());

        Ok(ModelReply { content, tokens_used })
    }
}

fn extract_content(body: &Value) -> Result<String, ProviderError> {
    body.get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|value| value.as_str())
        .filter(|content| !content.trim().is_empty())
        .map(str::to_string)
        .ok_or(ProviderError::EmptyResponse)
}

fn classify_failure(status: StatusCode, body: &Value) -> ProviderError {
    let error = body.get("error");
    let message = error
        .and_then(|error| error.get("message"))
        .and_then(|value| value.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());
    let code = error
        .and_then(|error| error.get("code").or_else(|| error.get("type")))
        .and_then(|value| value.as_str())
        .unwrap_or_default();

    if status == StatusCode::TOO_MANY_REQUESTS || QUOTA_ERROR_CODES.contains(&code) {
        ProviderError::RateLimited { status: status.as_u16(), message }
    } else {
        ProviderError::Http { status: status.as_u16(), message }
    }
}
