//! OpenAI chat-completions backend implementation

pub mod backend;
pub mod client;
pub mod types;

pub use backend::OpenAIBackend;
pub use client::OpenAIClient;
