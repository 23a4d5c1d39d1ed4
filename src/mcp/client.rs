//! rmcp-backed tool server client.

use async_trait::async_trait;
use rmcp::{
    model::{CallToolRequestParams, CallToolResult, Content, JsonObject, ResourceContents},
    service::{ClientInitializeError, DynService, Peer, RoleClient, RunningService, ServiceError},
};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{AgentError, ErrorCode};

use super::server::{ToolCallOutput, ToolSchema, ToolServer};

type DynClientService = Box<dyn DynService<RoleClient>>;
pub type McpRunningService = RunningService<RoleClient, DynClientService>;

/// A tool server reached over MCP.
pub struct McpToolServer {
    name: String,
    peer: Peer<RoleClient>,
    session: Mutex<Option<McpRunningService>>,
}

impl McpToolServer {
    /// Wrap an initialized session; the rmcp handshake already happened in `serve`.
    pub fn new(name: impl Into<String>, session: McpRunningService) -> Self {
        Self {
            name: name.into(),
            peer: session.peer().clone(),
            session: Mutex::new(Some(session)),
        }
    }

    /// Convert an rmcp initialization result into a connected server.
    pub fn from_running_service_result(
        name: &str,
        result: Result<McpRunningService, ClientInitializeError>,
    ) -> Result<Self, AgentError> {
        result
            .map(|session| Self::new(name, session))
            .map_err(|e| map_initialize_error(name, e))
    }
}

#[async_trait]
impl ToolServer for McpToolServer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> Result<Vec<ToolSchema>, AgentError> {
        let tools = match self.peer.list_all_tools().await {
            Ok(tools) => tools,
            Err(ServiceError::UnexpectedResponse) => {
                self.peer
                    .list_tools(None)
                    .await
                    .map_err(|e| map_service_error(&self.name, "list_tools", e))?
                    .tools
            }
            Err(e) => return Err(map_service_error(&self.name, "list_tools", e)),
        };
        Ok(tools.into_iter().map(map_tool_schema).collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallOutput, AgentError> {
        let arguments = coerce_tool_arguments(arguments)?;
        debug!(server = %self.name, tool = name, "Calling tool");

        let result = self
            .peer
            .call_tool(CallToolRequestParams {
                meta: None,
                name: name.to_owned().into(),
                arguments,
                task: None,
            })
            .await
            .map_err(|e| map_service_error(&self.name, "call_tool", e))?;

        map_call_result(name, result)
    }

    async fn close(&self) -> Result<(), AgentError> {
        let Some(session) = self.session.lock().await.take() else {
            return Ok(());
        };
        session.cancel().await.map_err(|e| {
            AgentError::tool(
                ErrorCode::ToolServerError,
                format!("tool server '{}' did not shut down cleanly: {e}", self.name),
            )
            .with_source(e)
        })?;
        debug!(server = %self.name, "Tool server closed");
        Ok(())
    }
}

fn map_tool_schema(tool: rmcp::model::Tool) -> ToolSchema {
    ToolSchema {
        name: tool.name.to_string(),
        description: tool.description.map(|d| d.to_string()),
        input_schema: Value::Object((*tool.input_schema).clone()),
    }
}

/// Accept an object, null, or a JSON string holding an object.
pub(crate) fn coerce_tool_arguments(value: Value) -> Result<Option<JsonObject>, AgentError> {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            let parsed: Value = serde_json::from_str(trimmed).map_err(|e| {
                AgentError::tool(
                    ErrorCode::ToolExecutionError,
                    format!("tool arguments must be valid JSON: {e}"),
                )
            })?;
            coerce_tool_arguments(parsed)
        }
        other => Err(AgentError::tool(
            ErrorCode::ToolExecutionError,
            format!("tool arguments must be a JSON object; got {other}"),
        )),
    }
}

fn extract_text_content(content: &[Content]) -> Option<String> {
    let mut lines = Vec::new();
    for item in content {
        if let Some(text) = item.as_text() {
            lines.push(text.text.clone());
            continue;
        }
        if let Some(resource) = item.as_resource() {
            if let ResourceContents::TextResourceContents { text, .. } = &resource.resource {
                lines.push(text.clone());
            }
        }
    }
    (!lines.is_empty()).then(|| lines.join("\n"))
}

fn map_call_result(name: &str, result: CallToolResult) -> Result<ToolCallOutput, AgentError> {
    let text_content = extract_text_content(&result.content);
    let content = result
        .content
        .iter()
        .filter_map(|item| serde_json::to_value(item).ok())
        .collect::<Vec<_>>();

    if result.is_error.unwrap_or(false) {
        let message = result
            .structured_content
            .as_ref()
            .map(|v| v.to_string())
            .or(text_content)
            .unwrap_or_else(|| "tool returned an error result".into());
        return Err(AgentError::tool(
            ErrorCode::ToolExecutionError,
            format!("tool '{name}' failed: {message}"),
        ));
    }

    Ok(ToolCallOutput {
        structured_content: result.structured_content,
        text_content,
        content,
    })
}

fn map_initialize_error(server: &str, error: ClientInitializeError) -> AgentError {
    AgentError::tool(
        ErrorCode::ToolServerError,
        format!("tool server '{server}' failed to initialize: {error}"),
    )
    .with_source(error)
}

fn map_service_error(server: &str, context: &str, error: ServiceError) -> AgentError {
    AgentError::tool(
        ErrorCode::ToolServerError,
        format!("tool server '{server}' {context} failed: {error}"),
    )
    .with_source(error)
}
