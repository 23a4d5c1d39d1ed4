//! LLM client trait, provider adapters, and the client factory.

pub mod http;
pub mod sse;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "anthropic")]
pub mod anthropic;

use std::sync::{Arc, Mutex};

use tracing::info;

use crate::config::{AgentOptions, ApiType, LlmConfig};
use crate::error::{AgentError, ErrorCode};
use crate::types::{ContentItem, GenerationSettings, LlmStream, Message};
use crate::util::ResilientClient;

/// A provider-agnostic request.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub session_id: String,
    /// Full outbound history, system prompt first when present.
    pub messages: Vec<Message>,
    /// Per-request model override; `None` uses the configured model.
    pub model: Option<String>,
    pub settings: GenerationSettings,
    /// Where a tool decorator reports the exchanges it added to the
    /// conversation, so the decorator that issued this request can keep them.
    pub(crate) transcript: Option<Transcript>,
}

/// Messages recorded by a tool decorator for the one above it.
pub(crate) type Transcript = Arc<Mutex<Vec<Message>>>;

impl LlmRequest {
    pub fn new(session_id: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            session_id: session_id.into(),
            messages,
            model: None,
            settings: GenerationSettings::default(),
            transcript: None,
        }
    }
}

/// Capability interface implemented by every provider adapter and decorator.
///
/// `send_request` is lazy: no I/O happens until the stream is polled, and
/// every failure is reported as the stream's single terminal error.
pub trait LlmClient: Send + Sync {
    /// Provider name (e.g. "openai").
    fn provider_name(&self) -> &str;

    fn send_request(&self, request: LlmRequest) -> LlmStream;
}

/// Create the client for `config`, wrapped in the timeout/retry policy layer.
///
/// Fails eagerly: unknown `api_type`, missing key, or missing model are
/// configuration errors, checked in that order.
pub fn create_client(
    config: &LlmConfig,
    options: &AgentOptions,
) -> Result<Arc<dyn LlmClient>, AgentError> {
    let api_type = ApiType::parse(&config.api_type)?;
    let adapter: Arc<dyn LlmClient> = match api_type {
        #[cfg(feature = "openai")]
        ApiType::OpenAi => Arc::new(openai::OpenAiClient::new(config)?),
        #[cfg(feature = "anthropic")]
        ApiType::Anthropic => Arc::new(anthropic::AnthropicClient::new(config)?),
        #[allow(unreachable_patterns)]
        other => {
            return Err(AgentError::config(
                ErrorCode::UnsupportedLlmType,
                format!("provider '{other}' not enabled via feature flags"),
            ))
        }
    };

    info!(provider = adapter.provider_name(), model = %config.model, "LLM client created");
    Ok(Arc::new(ResilientClient::new(
        adapter,
        options.request_timeout,
        options.retry.clone(),
    )))
}

/// Text sent in place of content a provider cannot accept.
pub(crate) fn placeholder_text(item: &ContentItem) -> String {
    format!("[{}]", item.kind)
}
