//! Agent configuration: model endpoint, system prompt, tool servers.
//!
//! Values are plain serde types so they can come from the markup compiler,
//! a TOML/JSON file, or code. Nothing here touches the environment unless
//! [`LlmConfig::with_env_defaults`] is called explicitly.

pub mod llm;
pub mod tool_server;

pub use llm::{ApiType, LlmConfig};
pub use tool_server::{
    HttpTransportConfig, StdioTransportConfig, ToolServerConfig, TransportKind,
};

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, ErrorCode};
use crate::util::retry::RetryPolicy;

/// Default maximum number of messages kept per session.
pub const DEFAULT_SESSION_CAPACITY: usize = 100;
/// Default inactivity timeout for a streaming request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Default maximum number of tool round trips per request.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 5;

/// Complete, immutable description of one agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    pub llm: LlmConfig,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub tool_servers: Vec<ToolServerConfig>,
}

impl AgentConfig {
    pub fn new(llm: LlmConfig, prompt: impl Into<String>) -> Self {
        Self {
            llm,
            prompt: prompt.into(),
            tool_servers: Vec::new(),
        }
    }

    pub fn with_tool_server(mut self, server: ToolServerConfig) -> Self {
        self.tool_servers.push(server);
        self
    }

    /// Parse a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, AgentError> {
        toml::from_str(source).map_err(|e| {
            AgentError::config(ErrorCode::ConfigParseError, format!("invalid TOML config: {e}"))
                .with_source(e)
        })
    }

    /// Parse a JSON document.
    pub fn from_json_str(source: &str) -> Result<Self, AgentError> {
        serde_json::from_str(source).map_err(|e| {
            AgentError::config(ErrorCode::ConfigParseError, format!("invalid JSON config: {e}"))
                .with_source(e)
        })
    }

    /// Load from a `.json` or `.toml` file; other extensions are read as TOML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            AgentError::config(
                ErrorCode::ConfigParseError,
                format!("cannot read config file {}: {e}", path.display()),
            )
            .with_source(e)
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_str(&source),
            _ => Self::from_toml_str(&source),
        }
    }

    /// Agent-level structural checks. Per-server problems are left to
    /// registration, where they only disable the offending server.
    pub fn validate(&self) -> Result<(), AgentError> {
        let mut seen = HashSet::new();
        for server in &self.tool_servers {
            if !seen.insert(server.name.as_str()) {
                return Err(AgentError::config(
                    ErrorCode::InvalidConfig,
                    format!("duplicate tool server name '{}'", server.name),
                ));
            }
        }
        Ok(())
    }
}

/// Runtime knobs that are not part of the declarative config.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Maximum messages retained per session (oldest evicted first). The
    /// prompt and the current user turn are always sent even if evicted.
    pub session_capacity: usize,
    /// Inactivity timeout between streamed chunks.
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    /// Maximum tool round trips one request may trigger per tool server.
    pub max_tool_rounds: usize,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            session_capacity: DEFAULT_SESSION_CAPACITY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }
}
