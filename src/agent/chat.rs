//! Per-request types: options, the caller's chunk stream, and accumulation.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::AgentError;
use crate::types::{Content, GenerationSettings, LlmChunk, Message};

/// Per-request overrides.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Model to use instead of the configured one.
    pub model: Option<String>,
    pub settings: GenerationSettings,
}

impl ChatOptions {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Chunks of one chat request, in arrival order.
///
/// Ends quietly when the request completes or is cancelled, or after a single
/// error. Dropping it does not cancel the request; the session log keeps
/// accumulating. Use [`Agent::cancel`](super::Agent::cancel) to stop it.
pub struct ChatStream {
    session_id: String,
    message_id: String,
    inner: UnboundedReceiverStream<Result<LlmChunk, AgentError>>,
}

impl ChatStream {
    pub(crate) fn new(
        session_id: String,
        message_id: String,
        inner: UnboundedReceiverStream<Result<LlmChunk, AgentError>>,
    ) -> Self {
        Self {
            session_id,
            message_id,
            inner,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Id of the assistant message this request writes into.
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Drain the stream and return the concatenated text.
    pub async fn text(mut self) -> Result<String, AgentError> {
        let mut out = String::new();
        while let Some(chunk) = self.next().await {
            out.push_str(&chunk?.content.joined_text());
        }
        Ok(out)
    }
}

impl Stream for ChatStream {
    type Item = Result<LlmChunk, AgentError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl std::fmt::Debug for ChatStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStream")
            .field("session_id", &self.session_id)
            .field("message_id", &self.message_id)
            .finish_non_exhaustive()
    }
}

/// Fold one chunk into the assistant message.
///
/// The untouched placeholder is replaced; text onto text is concatenated;
/// any other combination replaces the content.
pub(crate) fn accumulate(current: &Message, chunk: &Content) -> Message {
    let content = if current.content.is_empty_text() {
        chunk.clone()
    } else {
        match (current.content.as_text(), chunk.as_text()) {
            (Some(old), Some(new)) => Content::text(format!("{old}{new}")),
            _ => chunk.clone(),
        }
    };
    Message {
        content,
        ..current.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentItem;

    #[test]
    fn text_chunks_concatenate() {
        let placeholder = Message::placeholder().with_id("a");
        let first = accumulate(&placeholder, &Content::text("Hel"));
        let second = accumulate(&first, &Content::text("lo"));
        assert_eq!(second.content.as_text(), Some("Hello"));
        assert_eq!(second.id, "a");
    }

    #[test]
    fn mixed_kinds_replace_wholesale() {
        let text = Message::assistant("caption");
        let image = Content::Single(ContentItem::image_url("https://x/y.png"));
        let replaced = accumulate(&text, &image);
        assert_eq!(replaced.content, image);

        let back = accumulate(&replaced, &Content::text("again"));
        assert_eq!(back.content.as_text(), Some("again"));
    }

    #[test]
    fn placeholder_takes_first_chunk_as_is() {
        let multi = Content::Multi(vec![ContentItem::text("a"), ContentItem::text("b")]);
        let updated = accumulate(&Message::placeholder(), &multi);
        assert_eq!(updated.content, multi);
    }
}
