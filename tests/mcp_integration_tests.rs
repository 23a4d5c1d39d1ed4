#![cfg(feature = "mcp")]

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::time::timeout;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use colloquy::agent::Agent;
use colloquy::config::{AgentConfig, LlmConfig, ToolServerConfig};
use colloquy::error::ErrorCode;
use colloquy::mcp::{McpConnector, ToolServerConnector};
use common::{tool_call, StubClient};

fn search_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "query": { "type": "string" }
        }
    })
}

fn mock_mcp_handler(
    server_name: &'static str,
    tools: &'static [(&'static str, &'static str)],
) -> impl Fn(&Request) -> ResponseTemplate + Send + Sync {
    move |request: &Request| {
        let body: serde_json::Value = request.body_json().unwrap_or_else(|_| json!({}));
        let method = body.get("method").and_then(|v| v.as_str()).unwrap_or_default();
        let id = body.get("id").cloned().unwrap_or_else(|| json!(1));

        match method {
            "initialize" => ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": "2025-03-26",
                    "capabilities": { "tools": { "listChanged": false } },
                    "serverInfo": { "name": server_name, "version": "0.1.0" }
                }
            })),
            "tools/list" => {
                let definitions: Vec<_> = tools
                    .iter()
                    .map(|(name, description)| {
                        json!({
                            "name": name,
                            "description": description,
                            "inputSchema": search_schema()
                        })
                    })
                    .collect();
                ResponseTemplate::new(200).set_body_json(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": { "tools": definitions, "nextCursor": null }
                }))
            }
            "tools/call" => {
                let params = body.get("params").cloned().unwrap_or_else(|| json!({}));
                let tool = params.get("name").and_then(|n| n.as_str()).unwrap_or_default();
                if tool == "explode" {
                    return ResponseTemplate::new(200).set_body_json(json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "result": {
                            "content": [{ "type": "text", "text": "index unavailable" }],
                            "isError": true
                        }
                    }));
                }
                ResponseTemplate::new(200).set_body_json(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": {
                        "content": [{ "type": "text", "text": format!("{server_name}:{tool}") }],
                        "structuredContent": {
                            "server": server_name,
                            "tool": tool,
                            "arguments": params.get("arguments").cloned().unwrap_or_else(|| json!({}))
                        },
                        "isError": false
                    }
                }))
            }
            "notifications/initialized" => ResponseTemplate::new(202),
            _ => ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": null
            })),
        }
    }
}

async fn start_mcp_server(
    server_name: &'static str,
    tools: &'static [(&'static str, &'static str)],
) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .respond_with(mock_mcp_handler(server_name, tools))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/mcp"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/mcp"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;
    server
}

async fn request_methods(server: &MockServer) -> HashSet<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter_map(|request| {
            request
                .body_json::<serde_json::Value>()
                .ok()
                .and_then(|body| body.get("method")?.as_str().map(str::to_string))
        })
        .collect()
}

#[tokio::test]
async fn http_server_lists_and_calls_tools() {
    let server = start_mcp_server("library", &[("search", "Search the catalog")]).await;
    let config = ToolServerConfig::http("library", format!("{}/mcp", server.uri()));

    let connection = timeout(Duration::from_secs(5), McpConnector::new().connect(&config))
        .await
        .expect("connect should complete before timeout")
        .expect("MCP server should connect");
    assert_eq!(connection.name(), "library");

    let tools = connection.list_tools().await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "search");
    assert_eq!(tools[0].description.as_deref(), Some("Search the catalog"));
    assert_eq!(tools[0].input_schema, search_schema());

    let output = connection
        .call_tool("search", json!({"query": "rust"}))
        .await
        .unwrap();
    assert_eq!(
        output.into_value_or_text(),
        json!({"server": "library", "tool": "search", "arguments": {"query": "rust"}})
    );

    connection.close().await.unwrap();
    connection.close().await.unwrap();

    let methods = request_methods(&server).await;
    assert!(methods.contains("initialize"));
    assert!(methods.contains("tools/list"));
    assert!(methods.contains("tools/call"));
}

#[tokio::test]
async fn tool_error_results_become_execution_errors() {
    let server = start_mcp_server("library", &[("explode", "Always fails")]).await;
    let config = ToolServerConfig::http("library", format!("{}/mcp", server.uri()));
    let connection = McpConnector::new().connect(&config).await.unwrap();

    let err = connection.call_tool("explode", json!({})).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ToolExecutionError);
    assert!(err.message.contains("index unavailable"));
    connection.close().await.unwrap();
}

#[tokio::test]
async fn unreachable_server_fails_to_connect() {
    let config = ToolServerConfig::http("gone", "http://127.0.0.1:1/mcp");
    let connector = McpConnector::new().with_connect_timeout(Duration::from_secs(5));
    let err = match connector.connect(&config).await {
        Ok(_) => panic!("expected connection failure"),
        Err(err) => err,
    };
    assert_eq!(err.code, ErrorCode::ToolServerError);
    assert!(err.message.contains("gone"), "unexpected error: {err}");
}

#[tokio::test]
async fn agent_routes_calls_to_live_server_and_skips_unreachable_one() {
    let server = start_mcp_server("library", &[("search", "Search the catalog")]).await;
    let client = StubClient::new();
    client.queue_text(&[
        "Let me look. ",
        &tool_call("library", "search", r#"{"query": "dune"}"#),
    ]);
    client.queue_text(&["Found Dune."]);

    let config = AgentConfig::new(LlmConfig::new("openai", "gpt-4").with_api_key("k"), "sys")
        .with_tool_server(ToolServerConfig::http("gone", "http://127.0.0.1:1/mcp"))
        .with_tool_server(ToolServerConfig::http(
            "library",
            format!("{}/mcp", server.uri()),
        ));
    let agent = Agent::builder(config)
        .with_client(client.clone())
        .with_connector(Arc::new(
            McpConnector::new().with_connect_timeout(Duration::from_secs(5)),
        ))
        .build()
        .await
        .unwrap();
    assert_eq!(agent.tool_servers(), vec!["library"]);

    let session = agent.create_session().await;
    let reply = agent
        .chat(&session, "find dune")
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(reply, "Let me look. Found Dune.");

    let requests = client.requests();
    assert_eq!(requests.len(), 2);
    let fed_back = requests[1].messages.last().unwrap().text();
    assert!(fed_back.contains(r#"server="library""#), "{fed_back}");
    assert!(fed_back.contains("dune"), "{fed_back}");

    agent.shutdown().await;
}
