//! Anthropic (Claude) backend implementation

pub mod backend;
pub mod client;
pub mod types;

pub use backend::AnthropicBackend;
pub use client::AnthropicClient;
