//! chat-relay: streaming relay between a chat client and LLM providers.
//!
//! Prompts are forwarded to OpenAI-compatible chat completion endpoints or
//! to Google Gemini, and the provider's token stream is relayed back to the
//! client fragment by fragment, as chunked text or server-sent events.
//! Stateful Gemini conversations are kept in an in-memory session registry.

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod provider;
pub mod relay;
pub mod server;
pub mod session;
