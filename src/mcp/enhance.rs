//! Decorator that routes model-issued tool calls to one tool server.

use std::sync::{Arc, MutexGuard, PoisonError};

use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::config::ToolServerConfig;
use crate::error::AgentError;
use crate::provider::{LlmClient, LlmRequest, Transcript};
use crate::types::{LlmChunk, LlmStream, Message, Role};

use super::protocol::{system_instructions, tool_result_message, RawToolCall, Segment, ToolCallScanner};
use super::server::{ToolSchema, ToolServer, ToolServerConnector};

/// Wraps a client so that calls addressed to `server` are executed and the
/// conversation continued, while everything else streams through unchanged.
pub struct EnhancedClient {
    inner: Arc<dyn LlmClient>,
    server: Arc<dyn ToolServer>,
    tools: Arc<Vec<ToolSchema>>,
    max_rounds: usize,
}

impl EnhancedClient {
    pub fn new(
        inner: Arc<dyn LlmClient>,
        server: Arc<dyn ToolServer>,
        tools: Vec<ToolSchema>,
        max_rounds: usize,
    ) -> Self {
        Self {
            inner,
            server,
            tools: Arc::new(tools),
            max_rounds,
        }
    }

    pub fn server_name(&self) -> &str {
        self.server.name()
    }
}

impl LlmClient for EnhancedClient {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn send_request(&self, request: LlmRequest) -> LlmStream {
        let inner = Arc::clone(&self.inner);
        let server = Arc::clone(&self.server);
        let tools = Arc::clone(&self.tools);
        let max_rounds = self.max_rounds;

        Box::pin(async_stream::stream! {
            let server_name = server.name().to_string();
            let above = request.transcript.clone();
            let mut messages = with_instructions(
                request.messages.clone(),
                system_instructions(&server_name, &tools),
            );
            let mut round = 0;

            'rounds: loop {
                let below: Transcript = Arc::default();
                let mut upstream = inner.send_request(LlmRequest {
                    messages: messages.clone(),
                    transcript: Some(Arc::clone(&below)),
                    ..request.clone()
                });
                let mut scanner = ToolCallScanner::new();
                let mut reply = String::new();
                let mut pending: Option<RawToolCall> = None;

                'chunks: while let Some(item) = upstream.next().await {
                    // Text streamed so far is part of what an inner server recorded.
                    if absorb(&below, &mut messages, above.as_ref()) {
                        reply.clear();
                    }
                    let chunk = match item {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            if let Some(rest) = scanner.finish() {
                                yield Ok(LlmChunk::text(rest));
                            }
                            yield Err(e);
                            break 'rounds;
                        }
                    };
                    let Some(text) = chunk.content.as_text() else {
                        if let Some(rest) = scanner.finish() {
                            reply.push_str(&rest);
                            yield Ok(LlmChunk::text(rest));
                        }
                        yield Ok(chunk);
                        continue;
                    };
                    for segment in scanner.push(text) {
                        match segment {
                            Segment::Text(text) => {
                                reply.push_str(&text);
                                yield Ok(LlmChunk::text(text));
                            }
                            Segment::Call(call) if call.server == server_name && round < max_rounds => {
                                pending = Some(call);
                                break 'chunks;
                            }
                            Segment::Call(call) => {
                                if call.server == server_name {
                                    warn!(server = %server_name, max_rounds, "Tool round limit reached; passing call through");
                                }
                                reply.push_str(&call.raw);
                                yield Ok(LlmChunk::text(call.raw));
                            }
                        }
                    }
                }
                if absorb(&below, &mut messages, above.as_ref()) {
                    reply.clear();
                }

                let Some(call) = pending else {
                    if let Some(rest) = scanner.finish() {
                        yield Ok(LlmChunk::text(rest));
                    }
                    break 'rounds;
                };

                // Stop the current generation before running the tool.
                drop(upstream);

                let (tool, outcome) = execute(server.as_ref(), &tools, &call).await;
                reply.push_str(&call.raw);
                let exchange = [
                    Message::assistant(reply),
                    Message::user(tool_result_message(&server_name, &tool, outcome)),
                ];
                if let Some(above) = &above {
                    lock(above).extend(exchange.iter().cloned());
                }
                messages.extend(exchange);
                round += 1;
                debug!(session_id = %request.session_id, server = %server_name, round, "Continuing after tool call");
            }
        })
    }
}

fn lock(transcript: &Transcript) -> MutexGuard<'_, Vec<Message>> {
    transcript.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Move exchanges recorded by inner servers into `messages`, passing them on
/// to `above`. Returns whether there were any.
fn absorb(below: &Transcript, messages: &mut Vec<Message>, above: Option<&Transcript>) -> bool {
    let recorded = std::mem::take(&mut *lock(below));
    if recorded.is_empty() {
        return false;
    }
    if let Some(above) = above {
        lock(above).extend(recorded.iter().cloned());
    }
    messages.extend(recorded);
    true
}

/// Insert `instructions` as a system message after any leading system messages.
fn with_instructions(mut messages: Vec<Message>, instructions: String) -> Vec<Message> {
    let at = messages
        .iter()
        .position(|m| m.role != Role::System)
        .unwrap_or(messages.len());
    messages.insert(at, Message::system(instructions));
    messages
}

/// Run one call. Failures become error results for the model, never stream errors.
async fn execute(
    server: &dyn ToolServer,
    tools: &[ToolSchema],
    call: &RawToolCall,
) -> (String, Result<String, String>) {
    let invocation = match call.invocation() {
        Ok(invocation) => invocation,
        Err(e) => {
            warn!(server = server.name(), error = %e, "Malformed tool call");
            return (String::new(), Err(format!("malformed tool call: {e}")));
        }
    };

    if !tools.iter().any(|t| t.name == invocation.name) {
        warn!(server = server.name(), tool = %invocation.name, "Unknown tool requested");
        return (
            invocation.name.clone(),
            Err(format!("unknown tool '{}'", invocation.name)),
        );
    }

    let outcome = match server.call_tool(&invocation.name, invocation.arguments).await {
        Ok(output) => Ok(output.render()),
        Err(e) => {
            warn!(server = server.name(), tool = %invocation.name, error = %e, "Tool call failed");
            Err(e.message)
        }
    };
    (invocation.name, outcome)
}

/// Connected tool servers owned by one agent.
#[derive(Default, Clone)]
pub struct ToolServerSet {
    servers: Vec<Arc<dyn ToolServer>>,
}

impl ToolServerSet {
    pub fn names(&self) -> Vec<&str> {
        self.servers.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Close every server; failures are logged and do not stop the rest.
    pub async fn close_all(&self) {
        for server in &self.servers {
            if let Err(e) = server.close().await {
                warn!(server = server.name(), error = %e, "Failed to close tool server");
            }
        }
    }
}

impl std::fmt::Debug for ToolServerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Register every enabled server and wrap `base` once per connected server.
///
/// A server that fails validation, connection, or tool listing is logged and
/// skipped; the others and the base client are unaffected. With nothing to
/// register the base client is returned unchanged.
pub async fn enhance_client(
    base: Arc<dyn LlmClient>,
    configs: &[ToolServerConfig],
    connector: &dyn ToolServerConnector,
    max_rounds: usize,
) -> (Arc<dyn LlmClient>, ToolServerSet) {
    let mut client = base;
    let mut set = ToolServerSet::default();

    for config in configs {
        if !config.enabled {
            debug!(server = %config.name, "Tool server disabled; skipping");
            continue;
        }
        match register(config, connector).await {
            Ok((server, tools)) => {
                info!(server = %config.name, tools = tools.len(), "Tool server registered");
                set.servers.push(Arc::clone(&server));
                client = Arc::new(EnhancedClient::new(client, server, tools, max_rounds));
            }
            Err(e) => {
                warn!(server = %config.name, error = %e, "Tool server registration failed; skipping");
            }
        }
    }

    (client, set)
}

async fn register(
    config: &ToolServerConfig,
    connector: &dyn ToolServerConnector,
) -> Result<(Arc<dyn ToolServer>, Vec<ToolSchema>), AgentError> {
    config.validate()?;
    let server = connector.connect(config).await?;
    match server.list_tools().await {
        Ok(tools) => Ok((server, tools)),
        Err(e) => {
            let _ = server.close().await;
            Err(e)
        }
    }
}
