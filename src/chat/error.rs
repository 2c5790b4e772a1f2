//! Error categories surfaced by the chat endpoint

use std::time::Duration;
use thiserror::Error;
use warp::http::StatusCode;

use crate::llm::LlmError;

/// Every way a chat request can fail, as the caller sees it
///
/// Each variant is a distinct category so the widget can decide whether to
/// offer a retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// Malformed or missing input; fixable by the caller
    #[error("{0}")]
    BadRequest(String),

    /// The caller exhausted its quota for the current window
    #[error("Rate limit exceeded. Please try again in {} seconds.", retry_after_secs(.retry_after))]
    RateLimited { retry_after: Duration },

    /// The upstream rejected our credentials or configuration
    #[error("Service configuration error. Please contact support.")]
    Misconfigured,

    /// The upstream provider is throttling us
    #[error("API rate limit exceeded. Please try again later.")]
    UpstreamRateLimited { retry_after: Option<Duration> },

    /// Any other upstream failure, including the deadline
    #[error("An error occurred while processing your request.")]
    ProcessingFailed,
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::RateLimited { .. } | RelayError::UpstreamRateLimited { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            RelayError::Misconfigured | RelayError::ProcessingFailed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable category name
    pub fn category(&self) -> &'static str {
        match self {
            RelayError::BadRequest(_) => "bad_request",
            RelayError::RateLimited { .. } => "rate_limited",
            RelayError::Misconfigured => "misconfigured",
            RelayError::UpstreamRateLimited { .. } => "upstream_rate_limited",
            RelayError::ProcessingFailed => "processing_failed",
        }
    }

    /// Whole seconds the caller should wait, when known
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            RelayError::RateLimited { retry_after } => Some(retry_after_secs(retry_after)),
            RelayError::UpstreamRateLimited { retry_after } => {
                retry_after.as_ref().map(retry_after_secs)
            }
            _ => None,
        }
    }
}

/// Round up so a client never retries a moment too early
fn retry_after_secs(duration: &Duration) -> u64 {
    let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    secs.max(1)
}

impl From<LlmError> for RelayError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::AuthenticationError(_) => RelayError::Misconfigured,
            LlmError::HttpError {
                status: 401 | 403, ..
            } => RelayError::Misconfigured,
            LlmError::RateLimitExceeded { retry_after } => {
                RelayError::UpstreamRateLimited { retry_after }
            }
            LlmError::HttpError { status: 429, .. } => {
                RelayError::UpstreamRateLimited { retry_after: None }
            }
            LlmError::ProviderError { ref code, .. } if code.contains("rate_limit") => {
                RelayError::UpstreamRateLimited { retry_after: None }
            }
            LlmError::ProviderError { ref code, .. } if code == "invalid_api_key" => {
                RelayError::Misconfigured
            }
            _ => RelayError::ProcessingFailed,
        }
    }
}
