//! Mapping between abstraction types and Groq-specific types

use crate::llm::core::types::{
    FinishReason, GenerateRequest, Message, MessageRole, StreamEvent, UsageMetadata,
};

use super::types::{ChatCompletionChunk, ChatCompletionRequest, GroqMessage, GroqUsage};

/// Convert our abstraction request to Groq's request format
///
/// The system prompt becomes the first message of the conversation.
pub fn to_groq_request(request: GenerateRequest, model: &str) -> ChatCompletionRequest {
    let system = request.system.map(Message::system);

    ChatCompletionRequest {
        model: model.to_string(),
        messages: system
            .into_iter()
            .chain(request.messages)
            .map(to_groq_message)
            .collect(),
        max_tokens: request.config.max_tokens,
        temperature: request.config.temperature,
        top_p: request.config.top_p,
        stop: request.config.stop_sequences,
        stream: true,
    }
}

fn to_groq_message(message: Message) -> GroqMessage {
    let role = match message.role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    };

    GroqMessage {
        role: role.to_string(),
        content: message.content,
    }
}

/// Tracks what has already been reported for one response
#[derive(Debug, Default)]
pub struct ChunkState {
    started: bool,
    finished: bool,
}

impl ChunkState {
    /// Whether a finish reason has been seen
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Convert one Groq chunk to our abstraction's stream events
///
/// Returns a vector because a single chunk can start the message, carry text
/// and finish it at the same time.
pub fn from_groq_chunk(chunk: ChatCompletionChunk, state: &mut ChunkState) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    if !state.started {
        state.started = true;
        events.push(StreamEvent::MessageStart {
            id: chunk.id.clone(),
        });
    }

    let usage = chunk
        .x_groq
        .and_then(|ext| ext.usage)
        .or(chunk.usage)
        .map(to_usage);

    // The relay only ever asks for one choice
    if let Some(choice) = chunk.choices.into_iter().next() {
        if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
            events.push(StreamEvent::TextDelta { text });
        }

        if let Some(reason) = choice.finish_reason {
            state.finished = true;
            events.push(StreamEvent::MessageEnd {
                finish_reason: FinishReason::from_wire(&reason),
                usage,
            });
        }
    }

    events
}

fn to_usage(usage: GroqUsage) -> UsageMetadata {
    UsageMetadata::new(usage.prompt_tokens, usage.completion_tokens)
}
