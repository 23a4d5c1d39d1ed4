//! Core types for colloquy.

pub mod content;
pub mod generation;
pub mod message;
pub mod stream;

pub use content::*;
pub use generation::*;
pub use message::*;
pub use stream::*;
