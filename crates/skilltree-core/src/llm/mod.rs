//! LLM integration - OpenAI-compatible chat completions
//!
//! This module provides:
//! - An HTTP client for JSON-mode chat completions
//! - Request/response types matching the OpenAI-compatible API
//! - Retry with backoff on rate limits

mod client;
mod types;

pub use client::LlmClient;
pub use types::{
    ChatRequest, ChatResponse, Choice, FinishReason, LlmResponse, Message, MessageRole,
    ResponseFormat, Usage,
};
