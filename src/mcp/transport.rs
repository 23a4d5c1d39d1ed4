//! Transport selection: spawns stdio servers or dials streamable-HTTP servers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rmcp::model::ClientInfo;
use rmcp::service::{ClientInitializeError, ServiceExt};
use rmcp::transport::{StreamableHttpClientTransport, TokioChildProcess};
use tokio::process::Command;
use tracing::debug;

use crate::config::{HttpTransportConfig, StdioTransportConfig, ToolServerConfig, TransportKind};
use crate::error::{AgentError, ErrorCode};

use super::client::{McpRunningService, McpToolServer};
use super::server::{ToolServer, ToolServerConnector};

/// Upper bound on spawning/dialing plus the initialize handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connects tool servers over MCP using the transport named in their config.
#[derive(Debug, Clone)]
pub struct McpConnector {
    connect_timeout: Duration,
}

impl Default for McpConnector {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl McpConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[async_trait]
impl ToolServerConnector for McpConnector {
    async fn connect(&self, config: &ToolServerConfig) -> Result<Arc<dyn ToolServer>, AgentError> {
        config.validate()?;

        let handshake = async {
            match (config.transport, &config.http, &config.stdio) {
                (TransportKind::Stdio, _, Some(stdio)) => connect_stdio(stdio).await,
                (TransportKind::Http, Some(http), _) => connect_http(http).await,
                // validate() guarantees the section exists.
                _ => Err(ClientInitializeError::ConnectionClosed(
                    "transport section missing".into(),
                )),
            }
        };

        let result = tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| {
                AgentError::tool(
                    ErrorCode::ToolServerError,
                    format!(
                        "tool server '{}' did not initialize within {}ms",
                        config.name,
                        self.connect_timeout.as_millis()
                    ),
                )
            })?;

        let server = McpToolServer::from_running_service_result(&config.name, result)?;
        debug!(server = %config.name, transport = %config.transport, "Tool server connected");
        Ok(Arc::new(server))
    }
}

async fn connect_stdio(
    stdio: &StdioTransportConfig,
) -> Result<McpRunningService, ClientInitializeError> {
    let mut command = Command::new(&stdio.command);
    command.args(&stdio.args).envs(&stdio.env).kill_on_drop(true);

    let transport = TokioChildProcess::new(command).map_err(|error| {
        ClientInitializeError::transport::<TokioChildProcess>(error, "spawn stdio transport")
    })?;
    ClientInfo::default().into_dyn().serve(transport).await
}

async fn connect_http(
    http: &HttpTransportConfig,
) -> Result<McpRunningService, ClientInitializeError> {
    let transport = StreamableHttpClientTransport::from_uri(http.url.as_str());
    ClientInfo::default().into_dyn().serve(transport).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_config_fails_before_connecting() {
        let mut config = ToolServerConfig::http("web", "http://localhost:1");
        config.http = None;
        let err = McpConnector::new().connect(&config).await.err().unwrap();
        assert_eq!(err.code, ErrorCode::InvalidConfig);
    }

    #[tokio::test]
    async fn missing_binary_is_a_tool_server_error() {
        let config = ToolServerConfig::stdio(
            "ghost",
            "/nonexistent/colloquy-test-binary",
            Vec::<String>::new(),
        );
        let err = McpConnector::new().connect(&config).await.err().unwrap();
        assert_eq!(err.code, ErrorCode::ToolServerError);
        assert!(err.message.contains("ghost"));
    }
}
