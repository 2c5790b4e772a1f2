//! Provider trait for LLM implementations

use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;

use super::{
    error::LlmError,
    types::{GenerateRequest, StreamEvent},
};

/// Incremental response from a provider
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

/// Main interface that all LLM provider implementations must satisfy
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stream generate content from the LLM
    ///
    /// This method sends a request to the LLM and returns a stream of events
    /// representing the incremental response. Errors returned directly happen
    /// before any content was produced; errors yielded by the stream happen
    /// mid-generation.
    async fn stream_generate(&self, request: GenerateRequest) -> Result<EventStream, LlmError>;
}
