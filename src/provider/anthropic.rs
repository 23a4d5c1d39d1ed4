//! Anthropic Messages API adapter.

use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use base64::Engine;

use crate::config::LlmConfig;
use crate::error::{AgentError, ErrorCode};
use crate::types::*;

use super::http::{anthropic_headers, endpoint, post_streaming};
use super::{placeholder_text, sse, LlmClient, LlmRequest};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicClient {
    model: String,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(config: &LlmConfig) -> Result<Self, AgentError> {
        let api_key = config.require_api_key()?;
        let model = config.require_model()?;
        Ok(Self {
            model,
            api_key,
            base_url: config
                .api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    fn model_for<'a>(&'a self, request: &'a LlmRequest) -> &'a str {
        request.model.as_deref().unwrap_or(&self.model)
    }

    fn build_request_body(&self, request: &LlmRequest) -> Value {
        let system = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(Message::text)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        let messages: Vec<Value> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .filter(|m| !(m.role == Role::Assistant && m.content.is_empty_text()))
            .map(message_to_anthropic)
            .collect();

        let settings = &request.settings;
        let mut body = json!({
            "model": self.model_for(request),
            "messages": messages,
            "max_tokens": settings.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "stream": true,
        });

        if let Some(obj) = body.as_object_mut() {
            if !system.is_empty() {
                obj.insert("system".into(), system.into());
            }
            if let Some(temp) = settings.temperature {
                obj.insert("temperature".into(), temp.into());
            }
            if let Some(top_p) = settings.top_p {
                obj.insert("top_p".into(), top_p.into());
            }
            if let Some(ref stops) = settings.stop_sequences {
                obj.insert("stop_sequences".into(), json!(stops));
            }
        }

        body
    }
}

impl LlmClient for AnthropicClient {
    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn send_request(&self, request: LlmRequest) -> LlmStream {
        let body = self.build_request_body(&request);
        let url = endpoint(&self.base_url, "messages");
        let headers = anthropic_headers(&self.api_key, API_VERSION);

        debug!(
            session_id = %request.session_id,
            model = self.model_for(&request),
            messages = request.messages.len(),
            "Anthropic messages request"
        );

        Box::pin(async_stream::try_stream! {
            let response = post_streaming(&url, headers, &body).await?;
            let mut events = sse::data_stream(response.bytes_stream());
            while let Some(payload) = events.next().await {
                let payload = payload?;
                match parse_stream_event(&payload)? {
                    StreamStep::Text(text) => yield LlmChunk::text(text),
                    StreamStep::Continue => {}
                    StreamStep::Stop => break,
                }
            }
        })
    }
}

#[derive(Debug, PartialEq)]
enum StreamStep {
    Text(String),
    Continue,
    Stop,
}

fn parse_stream_event(payload: &str) -> Result<StreamStep, AgentError> {
    let event: AnthropicStreamEvent = sse::parse_json(payload)?;
    match event {
        AnthropicStreamEvent::ContentBlockDelta { delta } => match delta {
            AnthropicDelta::TextDelta { text } if !text.is_empty() => Ok(StreamStep::Text(text)),
            _ => Ok(StreamStep::Continue),
        },
        AnthropicStreamEvent::MessageStop => Ok(StreamStep::Stop),
        AnthropicStreamEvent::Error { error } => Err(AgentError::llm_service(
            ErrorCode::LlmApiError,
            format!("{}: {}", error.error_type, error.message),
        )),
        AnthropicStreamEvent::Other => Ok(StreamStep::Continue),
    }
}

fn message_to_anthropic(msg: &Message) -> Value {
    let role = msg.role.to_string();
    if let Some(text) = msg.content.as_text() {
        return json!({ "role": role, "content": text });
    }
    let blocks: Vec<Value> = msg.content.items().iter().map(item_to_anthropic).collect();
    json!({ "role": role, "content": blocks })
}

fn item_to_anthropic(item: &ContentItem) -> Value {
    match (item.kind, &item.value) {
        (ContentKind::Text, ContentValue::Text(text)) => json!({ "type": "text", "text": text }),
        (ContentKind::Image, value) => json!({
            "type": "image",
            "source": image_source(value, item.mime_type.as_deref()),
        }),
        _ => json!({ "type": "text", "text": placeholder_text(item) }),
    }
}

fn image_source(value: &ContentValue, mime_type: Option<&str>) -> Value {
    let mime = mime_type.unwrap_or("image/png");
    match value {
        ContentValue::Bytes(bytes) => json!({
            "type": "base64",
            "media_type": mime,
            "data": base64::engine::general_purpose::STANDARD.encode(bytes),
        }),
        ContentValue::Text(text) if text.starts_with("http://") || text.starts_with("https://") => {
            json!({ "type": "url", "url": text })
        }
        ContentValue::Text(text) => match parse_data_uri(text) {
            Some((media_type, data)) => json!({
                "type": "base64",
                "media_type": media_type,
                "data": data,
            }),
            None => json!({ "type": "base64", "media_type": mime, "data": text }),
        },
    }
}

/// Split `data:<mime>;base64,<data>`.
fn parse_data_uri(text: &str) -> Option<(&str, &str)> {
    text.strip_prefix("data:")?.split_once(";base64,")
}

// Anthropic API stream types (internal)

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicStreamEvent {
    ContentBlockDelta {
        delta: AnthropicDelta,
    },
    MessageStop,
    Error {
        error: AnthropicError,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicDelta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct AnthropicError {
    #[serde(rename = "type", default)]
    error_type: String,
    #[serde(default)]
    message: String,
}
