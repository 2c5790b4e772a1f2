//! Groq client implementation

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use crate::llm::core::{
    error::LlmError,
    provider::{EventStream, LlmProvider},
    types::GenerateRequest,
};

use super::mapper::{from_groq_chunk, to_groq_request, ChunkState};
use super::sse::parse_sse_stream;
use super::types::{GroqErrorResponse, GroqSseEvent};

/// Public Groq API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Groq model identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GroqModel {
    /// Llama 3.3 70B, the default for visitor chat
    #[default]
    Llama33Versatile,
    /// Llama 3.1 8B, faster and cheaper
    Llama31Instant,
    /// Any other model id Groq serves
    Custom(String),
}

impl GroqModel {
    /// Get the model identifier string
    pub fn as_str(&self) -> &str {
        match self {
            GroqModel::Llama33Versatile => "llama-3.3-70b-versatile",
            GroqModel::Llama31Instant => "llama-3.1-8b-instant",
            GroqModel::Custom(id) => id,
        }
    }

    /// Resolve a model id, keeping unknown ids as `Custom`
    pub fn from_id(id: &str) -> Self {
        match id {
            "llama-3.3-70b-versatile" => GroqModel::Llama33Versatile,
            "llama-3.1-8b-instant" => GroqModel::Llama31Instant,
            other => GroqModel::Custom(other.to_string()),
        }
    }
}

/// Client for streaming chat completions from Groq
pub struct GroqClient {
    /// HTTP client for making requests
    http_client: Client,
    /// Bearer token
    api_key: String,
    /// API root, without the trailing `/chat/completions`
    base_url: String,
    /// Model to use
    model: GroqModel,
}

impl GroqClient {
    /// Create a new Groq client
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is blank or the HTTP client cannot be built.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: GroqModel,
    ) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::AuthenticationError(
                "Groq API key is empty".to_string(),
            ));
        }

        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| LlmError::HttpError {
                status: 0,
                body: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            api_key,
            base_url: base_url.into(),
            model,
        })
    }

    /// Model this client talks to
    pub fn model(&self) -> &GroqModel {
        &self.model
    }

    /// Build the endpoint URL for streaming
    fn build_endpoint_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Make a streaming request to Groq
    async fn make_streaming_request(&self, request: GenerateRequest) -> Result<EventStream, LlmError> {
        let groq_request = to_groq_request(request, self.model.as_str());

        let url = self.build_endpoint_url();
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&groq_request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status, retry_after, body));
        }

        let mut sse_stream = parse_sse_stream(Box::pin(response.bytes_stream()));

        let event_stream = async_stream::stream! {
            let mut state = ChunkState::default();

            while let Some(result) = sse_stream.next().await {
                match result {
                    Ok(GroqSseEvent::Chunk(chunk)) => {
                        for event in from_groq_chunk(chunk, &mut state) {
                            yield Ok(event);
                        }
                    }
                    Ok(GroqSseEvent::Done) => {
                        debug!("Groq stream completed");
                        return;
                    }
                    Ok(GroqSseEvent::Error(body)) => {
                        yield Err(LlmError::ProviderError {
                            code: body.code(),
                            message: body.message,
                        });
                        return;
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }

            // A finish reason without [DONE] is still a complete answer
            if !state.is_finished() {
                yield Err(LlmError::StreamError(
                    "Upstream closed the stream before completion".to_string(),
                ));
            }
        };

        Ok(Box::pin(event_stream))
    }
}

#[async_trait]
impl LlmProvider for GroqClient {
    async fn stream_generate(&self, request: GenerateRequest) -> Result<EventStream, LlmError> {
        self.make_streaming_request(request).await
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Map a non-success response onto the error taxonomy
fn classify_error(status: StatusCode, retry_after: Option<Duration>, body: String) -> LlmError {
    let parsed = serde_json::from_str::<GroqErrorResponse>(&body).ok();

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::AuthenticationError(
            parsed.map(|p| p.error.message).unwrap_or(body),
        ),
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimitExceeded { retry_after },
        _ => match parsed {
            Some(envelope) if envelope.error.code() == "invalid_api_key" => {
                LlmError::AuthenticationError(envelope.error.message)
            }
            Some(envelope) if envelope.error.code() == "rate_limit_exceeded" => {
                LlmError::RateLimitExceeded { retry_after }
            }
            Some(envelope) => LlmError::ProviderError {
                code: envelope.error.code(),
                message: envelope.error.message,
            },
            None => LlmError::HttpError {
                status: status.as_u16(),
                body,
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groq_model_as_str() {
        assert_eq!(GroqModel::Llama33Versatile.as_str(), "llama-3.3-70b-versatile");
        assert_eq!(GroqModel::Llama31Instant.as_str(), "llama-3.1-8b-instant");
        assert_eq!(GroqModel::Custom("mixtral-8x7b-32768".into()).as_str(), "mixtral-8x7b-32768");
    }

    #[test]
    fn test_groq_model_from_id() {
        assert_eq!(GroqModel::from_id("llama-3.1-8b-instant"), GroqModel::Llama31Instant);
        assert_eq!(
            GroqModel::from_id("gemma2-9b-it"),
            GroqModel::Custom("gemma2-9b-it".to_string())
        );
    }

    #[test]
    fn test_endpoint_url_format() {
        let client = GroqClient::new("key", "https://api.groq.com/openai/v1/", GroqModel::default())
            .unwrap();
        assert_eq!(
            client.build_endpoint_url(),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }

    #[test]
    fn test_blank_api_key_rejected() {
        let result = GroqClient::new("  ", DEFAULT_BASE_URL, GroqModel::default());
        assert!(matches!(result, Err(LlmError::AuthenticationError(_))));
    }

    #[test]
    fn test_classify_unauthorized() {
        let body = r#"{"error":{"message":"Invalid API Key","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        let err = classify_error(StatusCode::UNAUTHORIZED, None, body.to_string());
        match err {
            LlmError::AuthenticationError(message) => assert_eq!(message, "Invalid API Key"),
            other => panic!("Expected authentication error, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_rate_limited() {
        let err = classify_error(
            StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(7)),
            String::new(),
        );
        assert!(matches!(
            err,
            LlmError::RateLimitExceeded { retry_after: Some(d) } if d == Duration::from_secs(7)
        ));
    }

    #[test]
    fn test_classify_unparseable_body() {
        let err = classify_error(StatusCode::BAD_GATEWAY, None, "<html>".to_string());
        assert!(matches!(err, LlmError::HttpError { status: 502, .. }));
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, "12".parse().unwrap());
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(12)));
        assert_eq!(retry_after(&HeaderMap::new()), None);
    }
}
