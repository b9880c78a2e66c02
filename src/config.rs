//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};
use crate::tutor::DEFAULT_MAX_TOKENS;

/// Service configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct TutorConfig {
    /// Provider backend, credential and model for answering.
    pub llm: LlmConfig,
    /// Upper bound on a single answering call.
    pub answer_timeout: Duration,
    /// Completion token budget per answer.
    pub max_tokens: u32,
    /// Port for the web chat server.
    pub ws_port: u16,
    /// Whether to attach the stdin/stdout channel.
    pub cli_enabled: bool,
    /// Telegram channel settings; `None` when no bot token is set.
    pub telegram: Option<TelegramConfig>,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub allowed_users: Vec<String>,
}

impl TutorConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend: LlmBackend = match var("TUTOR_LLM_BACKEND") {
            Some(raw) => raw.parse()?,
            None => LlmBackend::OpenAi,
        };

        let api_key = var(backend.api_key_var())
            .ok_or_else(|| ConfigError::MissingEnvVar(backend.api_key_var().to_string()))?;

        let model = var("MODEL_NAME").unwrap_or_else(|| backend.default_model().to_string());

        let timeout_secs: u64 = parse_or(
            "TUTOR_ANSWER_TIMEOUT_SECS",
            var("TUTOR_ANSWER_TIMEOUT_SECS"),
            60,
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "TUTOR_ANSWER_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let max_tokens: u32 = parse_or(
            "TUTOR_MAX_TOKENS",
            var("TUTOR_MAX_TOKENS"),
            DEFAULT_MAX_TOKENS,
        )?;
        if max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                key: "TUTOR_MAX_TOKENS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let ws_port: u16 = parse_or("TUTOR_WS_PORT", var("TUTOR_WS_PORT"), 8080)?;
        let cli_enabled = parse_bool("TUTOR_CLI", var("TUTOR_CLI"), true)?;

        let telegram = var("TELEGRAM_BOT_TOKEN").map(|bot_token| {
            let allowed_users =
                parse_list(&var("TELEGRAM_ALLOWED_USERS").unwrap_or_else(|| "*".to_string()));
            TelegramConfig {
                bot_token,
                allowed_users,
            }
        });

        Ok(Self {
            llm: LlmConfig {
                backend,
                api_key: SecretString::from(api_key),
                model,
            },
            answer_timeout: Duration::from_secs(timeout_secs),
            max_tokens,
            ws_port,
            cli_enabled,
            telegram,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

fn parse_bool(key: &str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected true or false, got '{other}'"),
        }),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
