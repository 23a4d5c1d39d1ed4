//! Streaming types.

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use super::content::Content;
use crate::error::AgentError;

/// One provider-neutral piece of streamed model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmChunk {
    pub content: Content,
}

impl LlmChunk {
    pub fn new(content: Content) -> Self {
        Self { content }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: Content::text(text),
        }
    }
}

/// Output of an LLM request. Ends normally on end-of-response, or after
/// yielding exactly one error. Dropping it aborts the underlying request.
pub type LlmStream = BoxStream<'static, Result<LlmChunk, AgentError>>;
