//! Tool server abstraction shared by every transport.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ToolServerConfig;
use crate::error::AgentError;

/// Schema for a tool exposed by a tool server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Value,
}

/// Successful result of a tool call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCallOutput {
    pub structured_content: Option<Value>,
    pub text_content: Option<String>,
    pub content: Vec<Value>,
}

impl ToolCallOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text_content: Some(text.into()),
            ..Default::default()
        }
    }

    /// Structured content first, then joined text, then the raw content array.
    pub fn into_value_or_text(self) -> Value {
        if let Some(structured) = self.structured_content {
            return structured;
        }
        if let Some(text) = self.text_content {
            return Value::String(text);
        }
        Value::Array(self.content)
    }

    /// Rendering fed back to the model.
    pub fn render(self) -> String {
        match self.into_value_or_text() {
            Value::String(text) => text,
            other => other.to_string(),
        }
    }
}

/// A connected tool server.
#[async_trait]
pub trait ToolServer: Send + Sync {
    /// Name the server is registered under.
    fn name(&self) -> &str;

    async fn list_tools(&self) -> Result<Vec<ToolSchema>, AgentError>;

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallOutput, AgentError>;

    /// Tear the connection down. Closing twice is not an error.
    async fn close(&self) -> Result<(), AgentError>;
}

/// Establishes tool server connections from their descriptors.
#[async_trait]
pub trait ToolServerConnector: Send + Sync {
    async fn connect(&self, config: &ToolServerConfig) -> Result<Arc<dyn ToolServer>, AgentError>;
}
