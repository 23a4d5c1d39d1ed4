//! Shared test helpers: scripted LLM client and fake tool servers.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use colloquy::config::ToolServerConfig;
use colloquy::error::{AgentError, ErrorCode};
use colloquy::mcp::{ToolCallOutput, ToolSchema, ToolServer, ToolServerConnector};
use colloquy::provider::{LlmClient, LlmRequest};
use colloquy::types::{LlmChunk, LlmStream};

/// One step of a scripted reply.
#[derive(Debug, Clone)]
pub enum Step {
    Text(String),
    Fail(ErrorCode),
    /// Pause before the next step.
    Delay(Duration),
    /// Never yields again.
    Stall,
}

/// An LLM client that plays one script per request and records requests.
#[derive(Default)]
pub struct StubClient {
    scripts: Mutex<VecDeque<Vec<Step>>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl StubClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a reply made of plain text chunks.
    pub fn queue_text(&self, chunks: &[&str]) {
        self.queue(chunks.iter().map(|c| Step::Text(c.to_string())).collect());
    }

    pub fn queue(&self, steps: Vec<Step>) {
        self.scripts.lock().unwrap().push_back(steps);
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl LlmClient for StubClient {
    fn provider_name(&self) -> &str {
        "stub"
    }

    fn send_request(&self, request: LlmRequest) -> LlmStream {
        self.requests.lock().unwrap().push(request);
        let steps = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        Box::pin(async_stream::stream! {
            for step in steps {
                match step {
                    Step::Text(text) => yield Ok(LlmChunk::text(text)),
                    Step::Fail(code) => {
                        yield Err(AgentError::llm_service(code, "scripted failure"));
                        break;
                    }
                    Step::Delay(duration) => tokio::time::sleep(duration).await,
                    Step::Stall => futures::future::pending::<()>().await,
                }
            }
        })
    }
}

/// A tool server that echoes its arguments back.
pub struct FakeToolServer {
    name: String,
    tools: Vec<ToolSchema>,
    pub calls: Mutex<Vec<(String, Value)>>,
    pub closed: AtomicBool,
}

impl FakeToolServer {
    pub fn new(name: &str, tools: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            tools: tools
                .iter()
                .map(|t| ToolSchema {
                    name: t.to_string(),
                    description: Some(format!("{t} tool")),
                    input_schema: Value::Null,
                })
                .collect(),
            calls: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolServer for FakeToolServer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> Result<Vec<ToolSchema>, AgentError> {
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallOutput, AgentError> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments.clone()));
        Ok(ToolCallOutput::text(format!("{}:{name}:{arguments}", self.name)))
    }

    async fn close(&self) -> Result<(), AgentError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector handing out pre-built fake servers; unknown names fail to connect.
#[derive(Default)]
pub struct FakeConnector {
    servers: HashMap<String, Arc<FakeToolServer>>,
    pub attempts: Mutex<Vec<String>>,
}

impl FakeConnector {
    pub fn with(mut self, server: Arc<FakeToolServer>) -> Self {
        self.servers.insert(server.name.clone(), server);
        self
    }

    pub fn attempted(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolServerConnector for FakeConnector {
    async fn connect(&self, config: &ToolServerConfig) -> Result<Arc<dyn ToolServer>, AgentError> {
        self.attempts.lock().unwrap().push(config.name.clone());
        match self.servers.get(&config.name) {
            Some(server) => Ok(Arc::clone(server) as Arc<dyn ToolServer>),
            None => Err(AgentError::tool(
                ErrorCode::ToolServerError,
                format!("connection refused for '{}'", config.name),
            )),
        }
    }
}

/// A tool-call block addressed to `server`.
pub fn tool_call(server: &str, tool: &str, arguments: &str) -> String {
    format!(r#"<tool_call server="{server}">{{"name": "{tool}", "arguments": {arguments}}}</tool_call>"#)
}
