//! Model endpoint configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{AgentError, ErrorCode};

/// Supported provider wire protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ApiType {
    OpenAi,
    Anthropic,
}

impl ApiType {
    /// Case-insensitive lookup; unknown names are a configuration error.
    pub fn parse(name: &str) -> Result<Self, AgentError> {
        Self::from_str(name.trim()).map_err(|_| {
            AgentError::config(
                ErrorCode::UnsupportedLlmType,
                format!("unsupported LLM api type '{name}'"),
            )
        })
    }

    fn env_prefix(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI",
            Self::Anthropic => "ANTHROPIC",
        }
    }
}

/// Model endpoint settings. `api_type` picks the adapter at construction time.
#[derive(Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    pub api_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: String,
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_type", &self.api_type)
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .field("model", &self.model)
            .finish()
    }
}

impl LlmConfig {
    pub fn new(api_type: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_type: api_type.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    /// Fill a missing key or base URL from the environment (after loading
    /// `.env` if present). Explicit values always win.
    ///
    /// Reads `OPENAI_API_KEY`/`OPENAI_BASE_URL` or
    /// `ANTHROPIC_API_KEY`/`ANTHROPIC_BASE_URL` depending on `api_type`.
    pub fn with_env_defaults(mut self) -> Self {
        let _ = dotenvy::dotenv();
        let Ok(api_type) = ApiType::parse(&self.api_type) else {
            return self;
        };
        let prefix = api_type.env_prefix();
        if self.api_key.is_none() {
            self.api_key = non_empty_env(&format!("{prefix}_API_KEY"));
        }
        if self.api_url.is_none() {
            self.api_url = non_empty_env(&format!("{prefix}_BASE_URL"));
        }
        self
    }

    /// The API key, trimmed; missing or blank keys are a configuration error.
    pub(crate) fn require_api_key(&self) -> Result<String, AgentError> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key.to_string()),
            _ => Err(AgentError::config(
                ErrorCode::MissingApiKey,
                format!("API key is required for '{}'", self.api_type),
            )),
        }
    }

    pub(crate) fn require_model(&self) -> Result<String, AgentError> {
        match self.model.trim() {
            "" => Err(AgentError::config(
                ErrorCode::MissingModelName,
                "model name is required",
            )),
            model => Ok(model.to_string()),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}
