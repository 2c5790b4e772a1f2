//! Server-Sent Events (SSE) parser for Groq responses

use bytes::Bytes;
use futures::stream::Stream;
use futures::StreamExt;
use std::pin::Pin;

use crate::llm::core::error::LlmError;
use crate::sse::{SseBuffer, SseFrame, DONE_SENTINEL};

use super::types::{ChatCompletionChunk, GroqErrorResponse, GroqSseEvent};

/// Parse a stream of bytes as Groq SSE events
///
/// Groq follows the OpenAI streaming format:
/// ```text
/// data: {"id":"chatcmpl-1","choices":[{"index":0,"delta":{"content":"Hel"}}]}
///
/// data: [DONE]
/// ```
///
/// Frames are only parsed once their blank-line delimiter has arrived, so a
/// chunk boundary may fall anywhere in the byte stream.
pub fn parse_sse_stream(
    byte_stream: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
) -> Pin<Box<dyn Stream<Item = Result<GroqSseEvent, LlmError>> + Send>> {
    let mut buffer = SseBuffer::new();

    let event_stream = byte_stream.flat_map(move |chunk_result| {
        let chunk = match chunk_result {
            Ok(bytes) => bytes,
            Err(e) => {
                return futures::stream::iter(vec![Err(LlmError::StreamError(e.to_string()))]);
            }
        };

        let events: Vec<_> = buffer.push(&chunk).iter().map(parse_frame).collect();
        futures::stream::iter(events)
    });

    Box::pin(event_stream)
}

fn parse_frame(frame: &SseFrame) -> Result<GroqSseEvent, LlmError> {
    let data = frame.data.trim();

    if data == DONE_SENTINEL {
        return Ok(GroqSseEvent::Done);
    }

    if let Ok(envelope) = serde_json::from_str::<GroqErrorResponse>(data) {
        return Ok(GroqSseEvent::Error(envelope.error));
    }

    serde_json::from_str::<ChatCompletionChunk>(data)
        .map(GroqSseEvent::Chunk)
        .map_err(|e| {
            LlmError::SerializationError(format!(
                "Failed to parse Groq SSE event: {}. Data: {}",
                e, data
            ))
        })
}
