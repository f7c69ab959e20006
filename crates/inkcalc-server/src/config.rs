use std::env;
use std::time::Duration;

use inkcalc_contracts::models::{Capability, ModelSelector};
use inkcalc_contracts::PromptVariant;
use inkcalc_engine::gemini::DEFAULT_GEMINI_API_BASE;
use inkcalc_engine::GeminiSettings;
use thiserror::Error;

const API_KEY_VARS: [&str; 3] = ["GENERATIVEAI_API_KEY", "GEMINI_API_KEY", "GOOGLE_API_KEY"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required but not set")]
    Missing(String),

    #[error("invalid {key}: {reason}")]
    Invalid { key: String, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings for the upstream vision model.
#[derive(Debug, Clone, PartialEq)]
pub struct VisionConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub requested_model: Option<String>,
    pub model_fallback_reason: Option<String>,
    pub timeout: Duration,
    pub transport_retries: usize,
    pub prompt_variant: PromptVariant,
}

impl VisionConfig {
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let api_key = API_KEY_VARS
            .iter()
            .find_map(|key| lookup(key))
            .ok_or_else(|| ConfigError::Missing(API_KEY_VARS[0].to_string()))?;

        let requested_model = lookup("VISION_MODEL");
        let selection = ModelSelector::default()
            .select(requested_model.as_deref(), Capability::Vision)
            .map_err(|reason| ConfigError::Invalid {
                key: "VISION_MODEL".to_string(),
                reason,
            })?;

        let prompt_variant = match lookup("PROMPT_VARIANT") {
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                key: "PROMPT_VARIANT".to_string(),
                reason,
            })?,
            None => PromptVariant::default(),
        };

        Ok(Self {
            api_key,
            api_base: lookup("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string()),
            model: selection.model.name,
            requested_model,
            model_fallback_reason: selection.fallback_reason,
            timeout: Duration::from_secs(parse_or(lookup, "VISION_TIMEOUT_SECS", 30u64)?),
            transport_retries: parse_or(lookup, "VISION_RETRIES", 0usize)?,
            prompt_variant,
        })
    }

    pub fn gemini_settings(&self) -> GeminiSettings {
        let mut settings = GeminiSettings::new(self.api_key.clone(), self.model.clone());
        settings.api_base = self.api_base.clone();
        settings.request_timeout = self.timeout;
        settings.transport_retries = self.transport_retries;
        settings
    }
}

/// Settings for `inkcalc serve`.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub client_url: String,
    pub body_limit_bytes: usize,
    pub vision: VisionConfig,
}

impl ServerConfig {
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let port = lookup("PORT").ok_or_else(|| ConfigError::Missing("PORT".to_string()))?;
        let port = port.parse().map_err(|err| ConfigError::Invalid {
            key: "PORT".to_string(),
            reason: format!("{err}"),
        })?;
        let client_url = lookup("CLIENT_URL")
            .map(|value| value.trim_end_matches('/').to_string())
            .ok_or_else(|| ConfigError::Missing("CLIENT_URL".to_string()))?;
        let body_limit_mb: usize = parse_or(lookup, "BODY_LIMIT_MB", 50)?;
        let body_limit_bytes = body_limit_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| ConfigError::Invalid {
                key: "BODY_LIMIT_MB".to_string(),
                reason: format!("{body_limit_mb} MB does not fit in memory"),
            })?;

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            client_url,
            body_limit_bytes,
            vision: VisionConfig::from_lookup(lookup)?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Unset and blank variables both read as absent.
fn env_lookup(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_or<T>(lookup: &dyn Fn(&str) -> Option<String>, key: &str, default: T) -> ConfigResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.parse().map_err(|err| ConfigError::Invalid {
            key: key.to_string(),
            reason: format!("{err}"),
        }),
        None => Ok(default),
    }
}
