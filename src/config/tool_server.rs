//! Tool server descriptors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{AgentError, ErrorCode};

/// How to reach a tool server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransportKind {
    Http,
    Stdio,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpTransportConfig {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdioTransportConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// One tool server registered with an agent. Names are unique per agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolServerConfig {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub transport: TransportKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpTransportConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdio: Option<StdioTransportConfig>,
}

fn default_enabled() -> bool {
    true
}

impl ToolServerConfig {
    pub fn http(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            transport: TransportKind::Http,
            http: Some(HttpTransportConfig { url: url.into() }),
            stdio: None,
        }
    }

    pub fn stdio<I, S>(name: impl Into<String>, command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            enabled: true,
            transport: TransportKind::Stdio,
            http: None,
            stdio: Some(StdioTransportConfig {
                command: command.into(),
                args: args.into_iter().map(Into::into).collect(),
                env: BTreeMap::new(),
            }),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Some(stdio) = self.stdio.as_mut() {
            stdio.env.insert(key.into(), value.into());
        }
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Structural checks for this server alone.
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.name.trim().is_empty() {
            return Err(invalid("tool server name must not be empty"));
        }
        match self.transport {
            TransportKind::Http => match &self.http {
                Some(http) if !http.url.trim().is_empty() => Ok(()),
                Some(_) => Err(invalid(format!("tool server '{}' has an empty url", self.name))),
                None => Err(invalid(format!(
                    "tool server '{}' uses http transport but has no [http] section",
                    self.name
                ))),
            },
            TransportKind::Stdio => match &self.stdio {
                Some(stdio) if !stdio.command.trim().is_empty() => Ok(()),
                Some(_) => Err(invalid(format!(
                    "tool server '{}' has an empty command",
                    self.name
                ))),
                None => Err(invalid(format!(
                    "tool server '{}' uses stdio transport but has no [stdio] section",
                    self.name
                ))),
            },
        }
    }
}

fn invalid(message: impl Into<String>) -> AgentError {
    AgentError::config(ErrorCode::InvalidConfig, message)
}
