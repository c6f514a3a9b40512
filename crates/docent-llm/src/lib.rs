//! Model capability abstraction: chat generation and text embedding backends.

pub mod any;
pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;
mod retry;

pub use error::LlmError;
pub use provider::{LlmProvider, Message, Role};
