//! OpenAI Chat Completions adapter.

use base64::Engine;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{AgentError, ErrorCode};
use crate::types::*;

use super::http::{bearer_headers, endpoint, post_streaming};
use super::{placeholder_text, sse, LlmClient, LlmRequest};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiClient {
    model: String,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    /// Validate the key first, then the model.
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
        let messages = request
            .messages
            .iter()
            .filter(|m| !(m.role == Role::Assistant && m.content.is_empty_text()))
            .map(message_to_openai)
            .collect::<Vec<_>>();

        let mut body = json!({
            "model": self.model_for(request),
            "messages": messages,
            "stream": true,
        });

        if let Some(obj) = body.as_object_mut() {
            let settings = &request.settings;
            if let Some(max) = settings.max_tokens {
                obj.insert("max_tokens".into(), max.into());
            }
            if let Some(temp) = settings.temperature {
                obj.insert("temperature".into(), temp.into());
            }
            if let Some(top_p) = settings.top_p {
                obj.insert("top_p".into(), top_p.into());
            }
            if let Some(ref stops) = settings.stop_sequences {
                obj.insert("stop".into(), json!(stops));
            }
        }

        body
    }
}

impl LlmClient for OpenAiClient {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn send_request(&self, request: LlmRequest) -> LlmStream {
        let body = self.build_request_body(&request);
        let url = endpoint(&self.base_url, "chat/completions");
        let headers = bearer_headers(&self.api_key);

        debug!(
            session_id = %request.session_id,
            model = self.model_for(&request),
            messages = request.messages.len(),
            "OpenAI chat request"
        );

        Box::pin(async_stream::try_stream! {
            let response = post_streaming(&url, headers, &body).await?;
            let mut events = sse::data_stream(response.bytes_stream());
            while let Some(payload) = events.next().await {
                let payload = payload?;
                if let Some(text) = parse_stream_payload(&payload)? {
                    yield LlmChunk::text(text);
                }
            }
        })
    }
}

/// Extract the text delta from one stream payload; `None` when it carries none.
fn parse_stream_payload(payload: &str) -> Result<Option<String>, AgentError> {
    let chunk: OpenAiStreamChunk = sse::parse_json(payload)?;
    if let Some(error) = chunk.error {
        return Err(AgentError::llm_service(
            ErrorCode::LlmApiError,
            format!("stream error: {}", error.message),
        ));
    }
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|text| !text.is_empty()))
}

fn message_to_openai(msg: &Message) -> Value {
    let role = msg.role.to_string();

    if let Some(text) = msg.content.as_text() {
        return json!({ "role": role, "content": text });
    }

    // Assistant turns only accept text parts.
    if msg.role == Role::Assistant {
        return json!({ "role": role, "content": msg.text() });
    }

    let parts: Vec<Value> = msg.content.items().iter().map(item_to_openai).collect();
    json!({ "role": role, "content": parts })
}

fn item_to_openai(item: &ContentItem) -> Value {
    match (item.kind, &item.value) {
        (ContentKind::Text, ContentValue::Text(text)) => json!({ "type": "text", "text": text }),
        (ContentKind::Image, value) => json!({
            "type": "image_url",
            "image_url": { "url": image_url(value, item.mime_type.as_deref()) }
        }),
        (ContentKind::Audio, value) => json!({
            "type": "input_audio",
            "input_audio": {
                "data": base64_payload(value),
                "format": audio_format(item.mime_type.as_deref()),
            }
        }),
        _ => json!({ "type": "text", "text": placeholder_text(item) }),
    }
}

fn image_url(value: &ContentValue, mime_type: Option<&str>) -> String {
    let mime = mime_type.unwrap_or("image/png");
    match value {
        ContentValue::Bytes(bytes) => format!(
            "data:{mime};base64,{}",
            base64::engine::general_purpose::STANDARD.encode(bytes)
        ),
        ContentValue::Text(text) if is_url(text) => text.clone(),
        ContentValue::Text(b64) => format!("data:{mime};base64,{b64}"),
    }
}

fn base64_payload(value: &ContentValue) -> String {
    match value {
        ContentValue::Bytes(bytes) => base64::engine::general_purpose::STANDARD.encode(bytes),
        ContentValue::Text(text) => text
            .split_once(";base64,")
            .map(|(_, data)| data.to_string())
            .unwrap_or_else(|| text.clone()),
    }
}

fn audio_format(mime_type: Option<&str>) -> &'static str {
    match mime_type {
        Some("audio/mpeg") | Some("audio/mp3") => "mp3",
        _ => "wav",
    }
}

fn is_url(text: &str) -> bool {
    text.starts_with("http://") || text.starts_with("https://") || text.starts_with("data:")
}

// OpenAI API stream types (internal)

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    error: Option<OpenAiStreamError>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: OpenAiStreamDelta,
}

#[derive(Deserialize, Default)]
struct OpenAiStreamDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiStreamError {
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn client() -> OpenAiClient {
        OpenAiClient::new(&LlmConfig::new("openai", "gpt-4").with_api_key("test-key")).unwrap()
    }

    fn request(messages: Vec<Message>) -> LlmRequest {
        LlmRequest::new("s1", messages)
    }

    #[test]
    fn key_is_checked_before_model() {
        let err = OpenAiClient::new(&LlmConfig::new("openai", "")).err().unwrap();
        assert_eq!(err.code, ErrorCode::MissingApiKey);

        let err = OpenAiClient::new(&LlmConfig::new("openai", "").with_api_key("k"))
            .err()
            .unwrap();
        assert_eq!(err.code, ErrorCode::MissingModelName);
    }

    #[test]
    fn request_body_uses_plain_text_content_and_stream_flag() {
        let body = client().build_request_body(&request(vec![
            Message::system("sys"),
            Message::user("hi"),
        ]));
        assert_eq!(body["stream"], true);
        assert_eq!(body["model"], "gpt-4");
        assert_eq!(
            body["messages"],
            json!([
                {"role": "system", "content": "sys"},
                {"role": "user", "content": "hi"},
            ])
        );
    }

    #[test]
    fn request_body_applies_model_override_and_settings() {
        let mut req = request(vec![Message::user("hi")]);
        req.model = Some("gpt-4o-mini".into());
        req.settings = GenerationSettings::builder()
            .temperature(0.5)
            .max_tokens(64)
            .stop_sequences(vec!["END".into()])
            .build();
        let body = client().build_request_body(&req);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["stop"], json!(["END"]));
        assert!(body.get("top_p").is_none());
    }

    #[test]
    fn multimodal_items_keep_order_and_encode_images_as_data_uri() {
        let content = Content::Multi(vec![
            ContentItem::text("what is this"),
            ContentItem::image_bytes(vec![0xde, 0xad], "image/jpeg"),
            ContentItem::new(ContentKind::Video, ContentValue::Bytes(vec![1]), None),
        ]);
        let body = client().build_request_body(&request(vec![Message::user(content)]));
        let parts = &body["messages"][0]["content"];
        assert_eq!(parts[0], json!({"type": "text", "text": "what is this"}));
        assert_eq!(parts[1]["image_url"]["url"], "data:image/jpeg;base64,3q0=");
        assert_eq!(parts[2], json!({"type": "text", "text": "[video]"}));
    }

    #[test]
    fn empty_assistant_messages_are_skipped() {
        let body = client().build_request_body(&request(vec![
            Message::user("hi"),
            Message::placeholder(),
        ]));
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn stream_payload_extraction() {
        let delta = r#"{"choices":[{"index":0,"delta":{"content":"Hel"}}]}"#;
        assert_eq!(parse_stream_payload(delta).unwrap().as_deref(), Some("Hel"));

        let role_only = r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_stream_payload(role_only).unwrap(), None);

        let finish = r#"{"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_stream_payload(finish).unwrap(), None);

        let err = parse_stream_payload(r#"{"error":{"message":"overloaded"}}"#).unwrap_err();
        assert_eq!(err.code, ErrorCode::LlmApiError);
    }
}
