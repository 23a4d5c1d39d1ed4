//! Error types for colloquy.

pub mod unified;

pub use unified::{ErrorCode, ErrorKind, RecoverySuggestion};

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The single error type surfaced across every component boundary.
///
/// Foreign errors are wrapped exactly once, where they are first caught, and
/// kept as [`source`](std::error::Error::source). An `AgentError` is never
/// re-wrapped; components pass it through unchanged.
#[derive(Error, Debug)]
#[error("{kind} error [{code}]: {message}")]
pub struct AgentError {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub message: String,
    /// HTTP status of the failed call, when one was received.
    pub status: Option<u16>,
    #[source]
    pub source: Option<BoxError>,
}

impl AgentError {
    pub fn new(kind: ErrorKind, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
            status: None,
            source: None,
        }
    }

    pub fn config(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, code, message)
    }

    pub fn llm_service(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LlmService, code, message)
    }

    pub fn content(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Content, code, message)
    }

    pub fn session(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Session, code, message)
    }

    /// Tool server failures (`TOOL_SERVER_ERROR`, `TOOL_EXECUTION_ERROR`).
    pub fn tool(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, code, message)
    }

    /// Wrap an uncategorized foreign error.
    pub fn unknown(cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::new(ErrorKind::Unknown, ErrorCode::UnknownError, cause.to_string()).with_source(cause)
    }

    /// Attach the original cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Build the error for a non-2xx provider response.
    pub fn from_status(status: u16, body: &str) -> Self {
        let code = match status {
            401 | 403 => ErrorCode::AuthenticationFailed,
            429 => ErrorCode::RateLimitExceeded,
            _ => ErrorCode::LlmApiError,
        };
        Self::llm_service(code, format!("HTTP {status}: {body}")).with_status(status)
    }

    /// Whether this error is retryable by the request policy.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    pub fn is(&self, kind: ErrorKind, code: ErrorCode) -> bool {
        self.kind == kind && self.code == code
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        RecoverySuggestion::for_code(self.code)
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(error: reqwest::Error) -> Self {
        let status = error.status().map(|s| s.as_u16());
        let mut wrapped = Self::llm_service(ErrorCode::NetworkError, error.to_string());
        wrapped.status = status;
        wrapped.with_source(error)
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(
            ErrorKind::Unknown,
            ErrorCode::SerializationError,
            error.to_string(),
        )
        .with_source(error)
    }
}

impl From<std::io::Error> for AgentError {
    fn from(error: std::io::Error) -> Self {
        Self::new(ErrorKind::Unknown, ErrorCode::IoError, error.to_string()).with_source(error)
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, AgentError>;
