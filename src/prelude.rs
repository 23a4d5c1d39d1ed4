//! Convenience re-exports for common use.

pub use crate::agent::{Agent, AgentBuilder, ChatOptions, ChatStream};
pub use crate::config::{AgentConfig, AgentOptions, LlmConfig, ToolServerConfig};
pub use crate::error::{AgentError, ErrorCode, ErrorKind, Result};
pub use crate::provider::{LlmClient, LlmRequest};
pub use crate::session::{Mutation, SessionUpdate};
pub use crate::types::{
    ChatInput, Content, ContentItem, ContentKind, GenerationSettings, LlmChunk, Message, Role,
};
