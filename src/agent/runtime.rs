//! The agent orchestrator: sessions, request dispatch, and accumulation.
//!
//! Public surface:
//! - [`Agent::create_session`] / [`Agent::remove_session`]
//! - [`Agent::chat`] / [`Agent::chat_with_options`]: stream a reply into the session
//! - [`Agent::cancel`]: stop the in-flight request of a session
//! - [`Agent::shutdown`]: cancel everything and close tool servers

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{AgentConfig, AgentOptions, ApiType};
use crate::error::{AgentError, ErrorCode};
use crate::mcp::{enhance_client, ToolServerConnector, ToolServerSet};
use crate::provider::{create_client, LlmClient, LlmRequest};
use crate::session::{SessionStore, SessionUpdate};
use crate::types::{ChatInput, LlmChunk, LlmStream, Message, Role};

use super::chat::{accumulate, ChatOptions, ChatStream};

/// Handle of the one request a session may have in flight.
struct ActiveRequest {
    id: u64,
    token: CancellationToken,
}

type ActiveMap = Arc<Mutex<HashMap<String, ActiveRequest>>>;

/// Builder for [`Agent`], for supplying a client, connector, or options.
pub struct AgentBuilder {
    config: AgentConfig,
    options: AgentOptions,
    client: Option<Arc<dyn LlmClient>>,
    connector: Option<Arc<dyn ToolServerConnector>>,
}

impl AgentBuilder {
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            options: AgentOptions::default(),
            client: None,
            connector: None,
        }
    }

    pub fn with_options(mut self, options: AgentOptions) -> Self {
        self.options = options;
        self
    }

    /// Use `client` as the base client instead of building one from
    /// `config.llm`. It is used as given, without the retry/timeout layer.
    /// `config.llm.api_type` must still name a supported provider; the key
    /// and model are not checked.
    pub fn with_client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Use `connector` to reach tool servers instead of the MCP default.
    pub fn with_connector(mut self, connector: Arc<dyn ToolServerConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Validate the configuration, build the client, and register tool servers.
    pub async fn build(self) -> Result<Agent, AgentError> {
        self.config.validate()?;
        ApiType::parse(&self.config.llm.api_type)?;

        let base = match self.client {
            Some(client) => client,
            None => create_client(&self.config.llm, &self.options)?,
        };

        let (client, tool_servers) = match self.connector.or_else(default_connector) {
            Some(connector) => {
                enhance_client(
                    base,
                    &self.config.tool_servers,
                    connector.as_ref(),
                    self.options.max_tool_rounds,
                )
                .await
            }
            None => {
                if self.config.tool_servers.iter().any(|s| s.enabled) {
                    warn!("Tool servers configured but MCP support is not enabled; skipping");
                }
                (base, ToolServerSet::default())
            }
        };

        info!(
            provider = client.provider_name(),
            tool_servers = tool_servers.len(),
            "Agent ready"
        );

        Ok(Agent {
            config: self.config,
            options: self.options,
            client,
            tool_servers,
            sessions: RwLock::new(HashMap::new()),
            active: Arc::new(Mutex::new(HashMap::new())),
            next_request_id: AtomicU64::new(1),
        })
    }
}

#[cfg(feature = "mcp")]
fn default_connector() -> Option<Arc<dyn ToolServerConnector>> {
    Some(Arc::new(crate::mcp::McpConnector::new()))
}

#[cfg(not(feature = "mcp"))]
fn default_connector() -> Option<Arc<dyn ToolServerConnector>> {
    None
}

/// Conversational agent owning its sessions and tool server connections.
///
/// All methods take `&self`; share it across tasks with `Arc<Agent>`.
///
/// # Example
///
/// ```ignore
/// let agent = Agent::new(config).await?;
/// let session = agent.create_session().await;
/// let reply = agent.chat(&session, "Hello").await?.text().await?;
/// ```
pub struct Agent {
    config: AgentConfig,
    options: AgentOptions,
    client: Arc<dyn LlmClient>,
    tool_servers: ToolServerSet,
    sessions: RwLock<HashMap<String, Arc<SessionStore>>>,
    active: ActiveMap,
    next_request_id: AtomicU64,
}

impl Agent {
    /// Build an agent with default options.
    ///
    /// Fails with a `CONFIG` error for an unknown provider, a missing key or
    /// model, or duplicate tool server names. Tool servers that cannot be
    /// registered are skipped.
    pub async fn new(config: AgentConfig) -> Result<Self, AgentError> {
        AgentBuilder::new(config).build().await
    }

    pub fn builder(config: AgentConfig) -> AgentBuilder {
        AgentBuilder::new(config)
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Names of the tool servers that registered successfully.
    pub fn tool_servers(&self) -> Vec<&str> {
        self.tool_servers.names()
    }

    /// Create a session, seeded with the system prompt unless it is empty.
    pub async fn create_session(&self) -> String {
        let id = Uuid::new_v4().to_string();
        let store = Arc::new(SessionStore::new(id.clone(), self.options.session_capacity));
        if !self.config.prompt.is_empty() {
            store.add_message(Message::system(self.config.prompt.clone())).await;
        }
        self.sessions.write().await.insert(id.clone(), store);
        info!(session_id = %id, "Session created");
        id
    }

    /// Cancel any in-flight request and delete the session.
    pub async fn remove_session(&self, session_id: &str) -> bool {
        self.cancel(session_id).await;
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if removed {
            info!(session_id, "Session removed");
        }
        removed
    }

    pub async fn session_ids(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }

    /// Snapshot of a session's log.
    pub async fn messages(&self, session_id: &str) -> Result<Vec<Message>, AgentError> {
        Ok(self.session(session_id).await?.get_messages().await)
    }

    /// Replay-then-follow stream of a session's log.
    pub async fn subscribe(
        &self,
        session_id: &str,
    ) -> Result<BoxStream<'static, SessionUpdate>, AgentError> {
        Ok(self.session(session_id).await?.updates().await)
    }

    /// Whether the session has a request in flight.
    pub async fn is_active(&self, session_id: &str) -> bool {
        self.active.lock().await.contains_key(session_id)
    }

    pub async fn chat(
        &self,
        session_id: &str,
        input: impl Into<ChatInput>,
    ) -> Result<ChatStream, AgentError> {
        self.chat_with_options(session_id, input, ChatOptions::default())
            .await
    }

    /// Send one user turn and stream the reply into the session.
    ///
    /// Any request still running for this session is cancelled first. The
    /// user message and an empty assistant placeholder are appended before
    /// this returns; the placeholder then fills in as chunks arrive.
    pub async fn chat_with_options(
        &self,
        session_id: &str,
        input: impl Into<ChatInput>,
        options: ChatOptions,
    ) -> Result<ChatStream, AgentError> {
        let content = input.into().into_content()?;
        let store = self.session(session_id).await?;

        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let superseded = self.active.lock().await.insert(
            session_id.to_string(),
            ActiveRequest {
                id: request_id,
                token: token.clone(),
            },
        );
        if let Some(previous) = superseded {
            debug!(session_id, "Cancelling superseded request");
            previous.token.cancel();
        }

        let user = Message::user(content);
        let user_id = store.add_message(user.clone()).await;
        let user = user.with_id(user_id);
        let messages = self.outbound_history(&store, user).await;
        let assistant_id = store.add_message(Message::placeholder()).await;

        let request = LlmRequest {
            session_id: session_id.to_string(),
            messages,
            model: options.model,
            settings: options.settings,
            transcript: None,
        };
        debug!(
            session_id,
            messages = request.messages.len(),
            model = request.model.as_deref().unwrap_or(&self.config.llm.model),
            "Dispatching chat request"
        );

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(drive_request(
            self.client.send_request(request),
            Arc::clone(&store),
            assistant_id.clone(),
            token,
            tx,
            Arc::clone(&self.active),
            request_id,
        ));

        Ok(ChatStream::new(
            session_id.to_string(),
            assistant_id,
            UnboundedReceiverStream::new(rx),
        ))
    }

    /// Cancel the session's in-flight request. Returns whether one was running.
    pub async fn cancel(&self, session_id: &str) -> bool {
        match self.active.lock().await.remove(session_id) {
            Some(active) => {
                active.token.cancel();
                debug!(session_id, "Request cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancel every in-flight request and close every tool server.
    pub async fn shutdown(&self) {
        let drained: Vec<_> = self.active.lock().await.drain().collect();
        for (_, active) in drained {
            active.token.cancel();
        }
        self.tool_servers.close_all().await;
        info!("Agent shut down");
    }

    async fn session(&self, session_id: &str) -> Result<Arc<SessionStore>, AgentError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| {
                AgentError::session(
                    ErrorCode::SessionNotFound,
                    format!("session '{session_id}' not found"),
                )
            })
    }

    /// The stored history ending in `user`, with the prompt and the user turn
    /// restored if the log had to evict them.
    async fn outbound_history(&self, store: &SessionStore, user: Message) -> Vec<Message> {
        let mut messages = store.get_messages().await;
        if !messages.iter().any(|m| m.id == user.id) {
            messages.push(user);
        }
        let has_system = messages.iter().any(|m| m.role == Role::System);
        if !self.config.prompt.is_empty() && !has_system {
            messages.insert(0, Message::system(self.config.prompt.clone()));
        }
        messages
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("provider", &self.client.provider_name())
            .field("tool_servers", &self.tool_servers)
            .finish_non_exhaustive()
    }
}

/// Pump one request's stream into the session until it ends or is cancelled.
async fn drive_request(
    mut stream: LlmStream,
    store: Arc<SessionStore>,
    assistant_id: String,
    token: CancellationToken,
    tx: mpsc::UnboundedSender<Result<LlmChunk, AgentError>>,
    active: ActiveMap,
    request_id: u64,
) {
    let session_id = store.id().to_string();
    loop {
        let item = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            item = stream.next() => item,
        };
        match item {
            Some(Ok(chunk)) => {
                let cancelled = &token;
                store
                    .update_message(&assistant_id, |current| {
                        // Checked under the store lock so nothing lands after cancel.
                        if cancelled.is_cancelled() {
                            current.clone()
                        } else {
                            accumulate(current, &chunk.content)
                        }
                    })
                    .await;
                if !token.is_cancelled() {
                    let _ = tx.send(Ok(chunk));
                }
            }
            Some(Err(e)) => {
                if !token.is_cancelled() {
                    warn!(session_id = %session_id, error = %e, "Chat request failed");
                    let _ = tx.send(Err(e));
                }
                break;
            }
            None => break,
        }
    }
    // Dropping the stream here aborts the HTTP request if it is still open.
    drop(stream);

    let mut active = active.lock().await;
    if active.get(&session_id).is_some_and(|a| a.id == request_id) {
        active.remove(&session_id);
    }
}
