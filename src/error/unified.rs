//! Error classification: kinds, machine-readable codes, recovery hints.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Broad error category. Every [`AgentError`](super::AgentError) carries one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Invalid or missing configuration, detected at construction.
    Config,
    /// Anything coming from the remote model call.
    LlmService,
    /// Content normalization or extraction failures.
    Content,
    /// Session lifecycle violations.
    Session,
    /// Uncategorized; always wraps the original cause.
    Unknown,
}

/// Machine-readable error code.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MissingApiKey,
    MissingModelName,
    UnsupportedLlmType,
    InvalidConfig,
    ConfigParseError,
    LlmApiError,
    SseParsingError,
    RequestTimeout,
    NetworkError,
    RateLimitExceeded,
    AuthenticationFailed,
    EmptyContent,
    UnsupportedContent,
    SessionNotFound,
    ToolServerError,
    ToolExecutionError,
    SerializationError,
    IoError,
    UnknownError,
}

impl ErrorCode {
    /// Whether the policy layer may retry a request that failed with this code.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::NetworkError | Self::RateLimitExceeded)
    }
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    RetryWithBackoff,
    CheckCredentials,
    CheckConfiguration,
    IncreaseTimeout,
    CheckContent,
    CreateSession,
    CheckToolServer,
    ContactSupport,
}

impl RecoverySuggestion {
    pub(crate) fn for_code(code: ErrorCode) -> Self {
        match code {
            ErrorCode::MissingApiKey | ErrorCode::AuthenticationFailed => Self::CheckCredentials,
            ErrorCode::MissingModelName
            | ErrorCode::UnsupportedLlmType
            | ErrorCode::InvalidConfig
            | ErrorCode::ConfigParseError => Self::CheckConfiguration,
            ErrorCode::NetworkError | ErrorCode::RateLimitExceeded => Self::RetryWithBackoff,
            ErrorCode::RequestTimeout => Self::IncreaseTimeout,
            ErrorCode::EmptyContent | ErrorCode::UnsupportedContent => Self::CheckContent,
            ErrorCode::SessionNotFound => Self::CreateSession,
            ErrorCode::ToolServerError | ErrorCode::ToolExecutionError => Self::CheckToolServer,
            _ => Self::ContactSupport,
        }
    }
}
