//! Colloquy: streaming conversational agents
//!
//! Turns an [`AgentConfig`](config::AgentConfig) (model endpoint, system
//! prompt, tool servers) into a live agent with cancellable, streaming chat
//! sessions. Replies stream from OpenAI- or Anthropic-style endpoints and are
//! accumulated into a per-session message log; tool servers reached over MCP
//! can be called by the model mid-reply.
//!
//! # Quick Start
//!
//! ```no_run
//! use colloquy::prelude::*;
//! use futures::StreamExt;
//!
//! # async fn example() -> colloquy::error::Result<()> {
//! let llm = LlmConfig::new("openai", "gpt-4o").with_env_defaults();
//! let agent = Agent::new(AgentConfig::new(llm, "You are terse.")).await?;
//! let session = agent.create_session().await;
//!
//! let mut reply = agent.chat(&session, "Hello!").await?;
//! while let Some(chunk) = reply.next().await {
//!     print!("{}", chunk?.content.joined_text());
//! }
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod mcp;
pub mod prelude;
pub mod provider;
pub mod session;
pub mod types;
pub mod util;
