use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_cors_origins, parse_environment, parse_f64,
    parse_i32, parse_u16, parse_u32, parse_u64,
};
use super::secret::load_or_create_secret_key;
use super::types::{
    AdminSettings, AiSettings, ApiSettings, ConfigError, CorsSettings, DatabaseSettings,
    QuizSettings, RedisSettings, RuntimeSettings, SecuritySettings, ServerHost, ServerPort,
    ServerSettings, Settings, TelegramSettings, TelemetrySettings, WorkerSettings,
};

/// Time a worker needs after the model call returns to save or fail the entry.
const STALE_PERSISTENCE_MARGIN_SECONDS: u64 = 30;

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("LMS_HOST", "0.0.0.0");
        let port = env_or_default("LMS_PORT", "8000");

        let environment =
            parse_environment(env_optional("LMS_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("LMS_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "LMS API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let secret_key = match env_optional("SECRET_KEY") {
            Some(value) => value,
            None => load_or_create_secret_key(),
        };
        let access_token_expire_minutes = parse_u64(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            env_or_default("ACCESS_TOKEN_EXPIRE_MINUTES", "10080"),
        )?;
        let algorithm = env_or_default("ALGORITHM", "HS256");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "lms");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "lms_db");
        let database_url = env_optional("DATABASE_URL");

        let redis_host = env_or_default("REDIS_HOST", "localhost");
        let redis_port = parse_u16("REDIS_PORT", env_or_default("REDIS_PORT", "6379"))?;
        let redis_db = parse_u16("REDIS_DB", env_or_default("REDIS_DB", "0"))?;
        let redis_password = env_or_default("REDIS_PASSWORD", "");

        let ai_provider = env_or_default("AI_PROVIDER", "openai").to_ascii_lowercase();
        let ai_api_key = env_or_default("OPENAI_API_KEY", "");
        let ai_base_url = env_or_default("OPENAI_BASE_URL", "https://api.openai.com/v1");
        let ai_model = env_or_default("AI_MODEL", "gpt-4o-mini");
        let ai_max_tokens = parse_u32("AI_MAX_TOKENS", env_or_default("AI_MAX_TOKENS", "8000"))?;
        let ai_temperature =
            parse_f64("AI_TEMPERATURE", env_or_default("AI_TEMPERATURE", "0.4"))?;
        let ai_request_timeout =
            parse_u64("AI_REQUEST_TIMEOUT", env_or_default("AI_REQUEST_TIMEOUT", "120"))?;

        let telegram_enabled =
            env_optional("TELEGRAM_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);
        let telegram_token = env_or_default("TG_TOKEN", "");
        let telegram_api_base_url =
            env_or_default("TELEGRAM_API_BASE_URL", "https://api.telegram.org");
        let telegram_request_timeout = parse_u64(
            "TELEGRAM_REQUEST_TIMEOUT_SECONDS",
            env_or_default("TELEGRAM_REQUEST_TIMEOUT_SECONDS", "10"),
        )?;

        let default_passing_score = parse_f64(
            "QUIZ_DEFAULT_PASSING_SCORE",
            env_or_default("QUIZ_DEFAULT_PASSING_SCORE", "60"),
        )?;
        let default_max_attempts = parse_i32(
            "QUIZ_DEFAULT_MAX_ATTEMPTS",
            env_or_default("QUIZ_DEFAULT_MAX_ATTEMPTS", "3"),
        )?;
        let generation_rate_limit = parse_u64(
            "QUIZ_GENERATION_RATE_LIMIT",
            env_or_default("QUIZ_GENERATION_RATE_LIMIT", "10"),
        )?;
        let generation_rate_window_seconds = parse_u64(
            "QUIZ_GENERATION_RATE_WINDOW_SECONDS",
            env_or_default("QUIZ_GENERATION_RATE_WINDOW_SECONDS", "3600"),
        )?;

        let generation_concurrency = parse_u64(
            "WORKER_GENERATION_CONCURRENCY",
            env_or_default("WORKER_GENERATION_CONCURRENCY", "2"),
        )? as usize;
        let requeue_after_seconds = parse_u64(
            "WORKER_REQUEUE_AFTER_SECONDS",
            env_or_default("WORKER_REQUEUE_AFTER_SECONDS", "120"),
        )?;
        let stale_after_seconds = parse_u64(
            "WORKER_STALE_AFTER_SECONDS",
            env_or_default("WORKER_STALE_AFTER_SECONDS", "900"),
        )?;

        let first_superuser_username = env_or_default("FIRST_SUPERUSER_USERNAME", "admin");
        let first_superuser_password = env_or_default("FIRST_SUPERUSER_PASSWORD", "");

        let log_level = env_or_default("LMS_LOG_LEVEL", "info");
        let json = env_optional("LMS_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            security: SecuritySettings { secret_key, access_token_expire_minutes, algorithm },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            redis: RedisSettings {
                host: redis_host,
                port: redis_port,
                db: redis_db,
                password: redis_password,
            },
            ai: AiSettings {
                provider: ai_provider,
                api_key: ai_api_key,
                base_url: ai_base_url,
                model: ai_model,
                max_tokens: ai_max_tokens,
                temperature: ai_temperature,
                request_timeout_seconds: ai_request_timeout,
            },
            telegram: TelegramSettings {
                enabled: telegram_enabled,
                token: telegram_token,
                api_base_url: telegram_api_base_url,
                request_timeout_seconds: telegram_request_timeout,
            },
            quiz: QuizSettings {
                default_passing_score,
                default_max_attempts,
                generation_rate_limit,
                generation_rate_window_seconds,
            },
            worker: WorkerSettings {
                generation_concurrency,
                requeue_after_seconds,
                stale_after_seconds,
            },
            admin: AdminSettings { first_superuser_username, first_superuser_password },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn redis(&self) -> &RedisSettings {
        &self.redis
    }

    pub(crate) fn ai(&self) -> &AiSettings {
        &self.ai
    }

    pub(crate) fn telegram(&self) -> &TelegramSettings {
        &self.telegram
    }

    pub(crate) fn quiz(&self) -> &QuizSettings {
        &self.quiz
    }

    pub(crate) fn worker(&self) -> &WorkerSettings {
        &self.worker
    }

    pub(crate) fn admin(&self) -> &AdminSettings {
        &self.admin
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=100.0).contains(&self.quiz.default_passing_score) {
            return Err(ConfigError::InvalidValue {
                field: "QUIZ_DEFAULT_PASSING_SCORE",
                value: self.quiz.default_passing_score.to_string(),
            });
        }

        if !(1..=10).contains(&self.quiz.default_max_attempts) {
            return Err(ConfigError::InvalidValue {
                field: "QUIZ_DEFAULT_MAX_ATTEMPTS",
                value: self.quiz.default_max_attempts.to_string(),
            });
        }

        if !(0.0..=2.0).contains(&self.ai.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "AI_TEMPERATURE",
                value: self.ai.temperature.to_string(),
            });
        }

        if self.ai.request_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "AI_REQUEST_TIMEOUT",
                value: "0".to_string(),
            });
        }

        if self.telegram.request_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "TELEGRAM_REQUEST_TIMEOUT_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.worker.generation_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "WORKER_GENERATION_CONCURRENCY",
                value: "0".to_string(),
            });
        }

        let generation_bound = self.ai.generation_call_timeout().as_secs();
        if self.worker.stale_after_seconds
            <= generation_bound.saturating_add(STALE_PERSISTENCE_MARGIN_SECONDS)
        {
            return Err(ConfigError::InvalidValue {
                field: "WORKER_STALE_AFTER_SECONDS",
                value: self.worker.stale_after_seconds.to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.ai.api_key.is_empty() {
            return Err(ConfigError::MissingSecret("OPENAI_API_KEY"));
        }
        if self.ai.base_url.is_empty() {
            return Err(ConfigError::MissingSecret("OPENAI_BASE_URL"));
        }
        if self.admin.first_superuser_password.is_empty() {
            return Err(ConfigError::MissingSecret("FIRST_SUPERUSER_PASSWORD"));
        }
        if self.telegram.enabled && self.telegram.token.is_empty() {
            return Err(ConfigError::MissingSecret("TG_TOKEN"));
        }

        Ok(())
    }
}
