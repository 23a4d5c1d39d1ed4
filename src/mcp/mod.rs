//! Tool servers: connection, the tool-call protocol, and the enhancement layer.

pub mod enhance;
pub mod protocol;
pub mod server;

#[cfg(feature = "mcp")]
pub mod client;
#[cfg(feature = "mcp")]
pub mod transport;

pub use enhance::{enhance_client, EnhancedClient, ToolServerSet};
pub use server::{ToolCallOutput, ToolSchema, ToolServer, ToolServerConnector};

#[cfg(feature = "mcp")]
pub use client::McpToolServer;
#[cfg(feature = "mcp")]
pub use transport::McpConnector;
