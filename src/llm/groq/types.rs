//! Groq-specific request and response types
//!
//! These types map directly to Groq's OpenAI-compatible chat completions schema.

use serde::{Deserialize, Serialize};

/// Request body for `POST /chat/completions`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// Model identifier
    pub model: String,
    /// Conversation, system message first
    pub messages: Vec<GroqMessage>,
    /// Maximum number of tokens to generate
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Always true for the relay
    pub stream: bool,
}

/// A single message in the Groq conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroqMessage {
    /// "system", "user" or "assistant"
    pub role: String,
    pub content: String,
}

/// One `data:` payload of the streaming response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// Groq reports usage in its own extension object on the final chunk
    #[serde(default)]
    pub x_groq: Option<GroqExtension>,
    #[serde(default)]
    pub usage: Option<GroqUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroqExtension {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub usage: Option<GroqUsage>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GroqUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Error envelope returned by Groq, both as an HTTP body and mid-stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroqErrorResponse {
    pub error: GroqErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroqErrorBody {
    pub message: String,
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl GroqErrorBody {
    /// Most specific machine-readable code available
    pub fn code(&self) -> String {
        self.code
            .clone()
            .or_else(|| self.error_type.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// A parsed SSE message from the Groq stream
#[derive(Debug, Clone)]
pub enum GroqSseEvent {
    /// A completion chunk
    Chunk(ChatCompletionChunk),
    /// An error reported inside the stream
    Error(GroqErrorBody),
    /// The `[DONE]` terminator
    Done,
}
