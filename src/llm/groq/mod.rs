//! Groq provider implementation
//!
//! This module provides a client for Groq's OpenAI-compatible chat
//! completions API in streaming mode.

pub mod client;
pub mod mapper;
pub mod sse;
pub mod types;

// Re-export commonly used types
pub use client::{GroqClient, GroqModel, DEFAULT_BASE_URL};
