//! LLM Abstraction Layer
//!
//! This module provides the streaming interface the chat relay talks to, plus a
//! client for Groq's OpenAI-compatible chat completions API.

pub mod core;
pub mod groq;

// Re-export commonly used types
pub use core::{
    config::GenerationConfig,
    error::LlmError,
    provider::{EventStream, LlmProvider},
    types::{FinishReason, GenerateRequest, Message, MessageRole, StreamEvent, UsageMetadata},
};

pub use groq::{GroqClient, GroqModel};
