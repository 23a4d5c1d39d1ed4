//! Agent orchestrator: owns sessions and streams model replies into them.

pub mod chat;
pub mod runtime;

pub use chat::{ChatOptions, ChatStream};
pub use runtime::{Agent, AgentBuilder};
