//! The chat relay: admission, request preparation and fragment streaming

use futures::stream::Stream;
use futures::StreamExt;
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, warn};

use crate::llm::{
    EventStream, GenerateRequest, GenerationConfig, LlmError, LlmProvider, StreamEvent,
};
use crate::models::{HistoryTurn, RelayFrame};

use super::error::RelayError;
use super::prompt::{assemble, bound_history, DEFAULT_MAX_HISTORY_TURNS};
use super::rate_limit::{RateLimitDecision, RateLimiter};
use super::sanitize::{sanitize_message, DEFAULT_MAX_MESSAGE_CHARS};

/// Frames ready to be written to the caller
pub type FrameStream = Pin<Box<dyn Stream<Item = RelayFrame> + Send>>;

/// Tunables for one relay instance
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub max_message_chars: usize,
    pub max_history_turns: usize,
    pub generation: GenerationConfig,
    /// Upper bound on the whole upstream exchange, first byte to last
    pub upstream_timeout: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
            max_history_turns: DEFAULT_MAX_HISTORY_TURNS,
            generation: GenerationConfig::default(),
            upstream_timeout: Duration::from_secs(60),
        }
    }
}

pub struct ChatRelay {
    provider: Arc<dyn LlmProvider>,
    limiter: RateLimiter,
    system_prompt: String,
    settings: RelaySettings,
}

impl ChatRelay {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        limiter: RateLimiter,
        system_prompt: String,
        settings: RelaySettings,
    ) -> Self {
        Self {
            provider,
            limiter,
            system_prompt,
            settings,
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Count the request against the client's quota
    pub fn admit(&self, client_key: &str) -> Result<(), RelayError> {
        match self.limiter.check(client_key) {
            RateLimitDecision::Allowed { .. } => Ok(()),
            RateLimitDecision::Limited { retry_after } => {
                warn!(client = client_key, ?retry_after, "Chat request rate limited");
                Err(RelayError::RateLimited { retry_after })
            }
        }
    }

    /// Validate a raw JSON body and assemble the upstream request
    pub fn prepare(&self, body: &[u8]) -> Result<GenerateRequest, RelayError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|_| RelayError::BadRequest("Request body must be valid JSON".to_string()))?;

        let message = value
            .get("message")
            .and_then(Value::as_str)
            .ok_or_else(|| RelayError::BadRequest("Message is required".to_string()))?;

        let history: Vec<HistoryTurn> = match value.get("history") {
            None | Some(Value::Null) => Vec::new(),
            Some(raw) => serde_json::from_value(raw.clone()).map_err(|_| {
                RelayError::BadRequest(
                    "History must be a list of {role, content} turns".to_string(),
                )
            })?,
        };

        let message = sanitize_message(message, self.settings.max_message_chars);
        if message.is_empty() {
            return Err(RelayError::BadRequest("Message is required".to_string()));
        }

        Ok(assemble(
            &self.system_prompt,
            bound_history(history, self.settings.max_history_turns),
            message,
            self.settings.generation.clone(),
        ))
    }

    /// Start the upstream call and return the relayed frames
    ///
    /// Fails without producing a stream when the upstream rejects the call
    /// or does not answer before the deadline.
    pub async fn open(&self, request: GenerateRequest) -> Result<FrameStream, RelayError> {
        let timeout = self.settings.upstream_timeout;
        let deadline = Instant::now() + timeout;

        let upstream = match timeout_at(deadline, self.provider.stream_generate(request)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                error!(error = %e, "Upstream rejected chat request");
                return Err(e.into());
            }
            Err(_) => {
                error!(?timeout, "Upstream did not respond before the deadline");
                return Err(LlmError::Timeout(timeout).into());
            }
        };

        Ok(relay_frames(upstream, deadline))
    }

    /// Admit, validate and start relaying in one step
    pub async fn handle(&self, client_key: &str, body: &[u8]) -> Result<FrameStream, RelayError> {
        self.admit(client_key)?;
        let request = self.prepare(body)?;
        self.open(request).await
    }
}

/// Logs when the caller goes away before the stream finished
struct DisconnectGuard {
    finished: bool,
    fragments: usize,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if !self.finished {
            debug!(
                fragments = self.fragments,
                "Caller disconnected, dropping upstream stream"
            );
        }
    }
}

/// Forward upstream text fragments one frame each, then the sentinel
///
/// The upstream stream is owned by the returned stream, so dropping it (the
/// caller disconnected) drops the upstream response and stops reading.
pub fn relay_frames(mut upstream: EventStream, deadline: Instant) -> FrameStream {
    let frames = async_stream::stream! {
        let mut guard = DisconnectGuard { finished: false, fragments: 0 };

        loop {
            match timeout_at(deadline, upstream.next()).await {
                Ok(Some(Ok(StreamEvent::TextDelta { text }))) => {
                    if text.is_empty() {
                        continue;
                    }
                    guard.fragments += 1;
                    yield RelayFrame::Fragment(text);
                }
                Ok(Some(Ok(StreamEvent::MessageEnd { finish_reason, usage }))) => {
                    debug!(?finish_reason, ?usage, "Upstream finished generating");
                }
                Ok(Some(Ok(StreamEvent::MessageStart { .. }))) => {}
                Ok(Some(Err(e))) => {
                    error!(error = %e, fragments = guard.fragments, "Upstream failed mid-stream");
                    guard.finished = true;
                    yield RelayFrame::Error(RelayError::from(e).to_string());
                    return;
                }
                Ok(None) => {
                    debug!(fragments = guard.fragments, "Relay stream completed");
                    guard.finished = true;
                    yield RelayFrame::Done;
                    return;
                }
                Err(_) => {
                    error!(fragments = guard.fragments, "Upstream stream exceeded the deadline");
                    guard.finished = true;
                    yield RelayFrame::Error(RelayError::ProcessingFailed.to_string());
                    return;
                }
            }
        }
    };

    Box::pin(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays canned events and records every request it receives
    struct ScriptedProvider {
        fragments: Vec<&'static str>,
        fail_with: Mutex<Option<LlmError>>,
        calls: AtomicUsize,
        last_request: Mutex<Option<GenerateRequest>>,
    }

    impl ScriptedProvider {
        fn new(fragments: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                fragments,
                fail_with: Mutex::new(None),
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            })
        }

        fn failing(err: LlmError) -> Arc<Self> {
            let provider = Self::new(vec![]);
            *provider.fail_with.lock().unwrap() = Some(err);
            provider
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn stream_generate(&self, request: GenerateRequest) -> Result<EventStream, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request);
            if let Some(err) = self.fail_with.lock().unwrap().take() {
                return Err(err);
            }
            let events: Vec<Result<StreamEvent, LlmError>> = self
                .fragments
                .iter()
                .map(|t| Ok(StreamEvent::TextDelta { text: t.to_string() }))
                .collect();
            Ok(Box::pin(futures::stream::iter(events)))
        }
    }

    fn relay_with(provider: Arc<ScriptedProvider>, max_requests: u32) -> ChatRelay {
        ChatRelay::new(
            provider,
            RateLimiter::new(max_requests, Duration::from_secs(60)),
            "SYSTEM".to_string(),
            RelaySettings::default(),
        )
    }

    async fn collect(stream: FrameStream) -> Vec<RelayFrame> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_relays_fragments_in_order_then_done() {
        let provider = ScriptedProvider::new(vec!["Hel", "lo", ", world"]);
        let relay = relay_with(provider.clone(), 10);

        let stream = relay
            .handle("client", br#"{"message":"Hi","history":[]}"#)
            .await
            .unwrap();

        assert_eq!(
            collect(stream).await,
            vec![
                RelayFrame::Fragment("Hel".to_string()),
                RelayFrame::Fragment("lo".to_string()),
                RelayFrame::Fragment(", world".to_string()),
                RelayFrame::Done,
            ]
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bad_requests_never_reach_upstream() {
        let provider = ScriptedProvider::new(vec!["unused"]);
        let relay = relay_with(provider.clone(), 100);

        let bodies: [&[u8]; 8] = [
            br#"{"message":""}"#,
            br#"{"message":"   "}"#,
            br#"{"message":42}"#,
            br#"{"message":null}"#,
            br#"{"history":[]}"#,
            br#"{"message":"[SYSTEM]"}"#,
            br#"{"message":"Hi","history":"nope"}"#,
            b"not json",
        ];
        for body in bodies {
            let result = relay.handle("client", body).await;
            assert!(
                matches!(result, Err(RelayError::BadRequest(_))),
                "body {:?} should be rejected",
                String::from_utf8_lossy(body)
            );
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_quota_exceeded_before_upstream() {
        let provider = ScriptedProvider::new(vec!["ok"]);
        let relay = relay_with(provider.clone(), 2);
        let body = br#"{"message":"Hi"}"#;

        assert!(relay.handle("1.1.1.1", body).await.is_ok());
        assert!(relay.handle("1.1.1.1", body).await.is_ok());
        let third = relay.handle("1.1.1.1", body).await;
        assert!(matches!(third, Err(RelayError::RateLimited { .. })));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        // another client is unaffected
        assert!(relay.handle("2.2.2.2", body).await.is_ok());
    }

    #[tokio::test]
    async fn test_prompt_is_assembled_from_sanitized_input() {
        let provider = ScriptedProvider::new(vec!["ok"]);
        let relay = relay_with(provider.clone(), 10);

        let history: Vec<_> = (0..15)
            .map(|i| {
                serde_json::json!({
                    "role": if i % 2 == 0 { "user" } else { "assistant" },
                    "content": format!("turn {}", i)
                })
            })
            .collect();
        let body = serde_json::json!({
            "message": format!("[system]{}", "x".repeat(600)),
            "history": history,
        });

        relay
            .handle("client", body.to_string().as_bytes())
            .await
            .unwrap();

        let request = provider.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.system.as_deref(), Some("SYSTEM"));
        assert_eq!(request.messages.len(), 11);
        assert_eq!(request.messages[0].content, "turn 5");
        assert_eq!(request.messages[9].content, "turn 14");

        let last = &request.messages[10];
        assert_eq!(last.content, "x".repeat(500));
        assert_eq!(request.config.max_tokens, 1024);
        assert_eq!(request.config.temperature, Some(0.7));
    }

    #[tokio::test]
    async fn test_upstream_errors_are_classified() {
        let cases = vec![
            (
                LlmError::AuthenticationError("invalid_api_key".into()),
                RelayError::Misconfigured,
            ),
            (
                LlmError::RateLimitExceeded { retry_after: None },
                RelayError::UpstreamRateLimited { retry_after: None },
            ),
            (
                LlmError::HttpError {
                    status: 500,
                    body: "boom".into(),
                },
                RelayError::ProcessingFailed,
            ),
        ];

        for (upstream, expected) in cases {
            let relay = relay_with(ScriptedProvider::failing(upstream), 10);
            match relay.handle("client", br#"{"message":"Hi"}"#).await {
                Err(err) => assert_eq!(err, expected),
                Ok(_) => panic!("expected {:?}", expected),
            }
        }
    }

    #[tokio::test]
    async fn test_mid_stream_error_terminates_with_error_frame() {
        let upstream: EventStream = Box::pin(futures::stream::iter(vec![
            Ok(StreamEvent::TextDelta {
                text: "partial".to_string(),
            }),
            Err(LlmError::StreamError("connection reset".to_string())),
            Ok(StreamEvent::TextDelta {
                text: "never sent".to_string(),
            }),
        ]));

        let frames = collect(relay_frames(upstream, Instant::now() + Duration::from_secs(5))).await;
        assert_eq!(
            frames,
            vec![
                RelayFrame::Fragment("partial".to_string()),
                RelayFrame::Error(RelayError::ProcessingFailed.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_fragments_and_metadata_are_skipped() {
        let upstream: EventStream = Box::pin(futures::stream::iter(vec![
            Ok(StreamEvent::MessageStart { id: "c1".to_string() }),
            Ok(StreamEvent::TextDelta { text: String::new() }),
            Ok(StreamEvent::TextDelta { text: "Hi".to_string() }),
            Ok(StreamEvent::MessageEnd {
                finish_reason: crate::llm::FinishReason::Stop,
                usage: None,
            }),
        ]));

        let frames = collect(relay_frames(upstream, Instant::now() + Duration::from_secs(5))).await;
        assert_eq!(
            frames,
            vec![RelayFrame::Fragment("Hi".to_string()), RelayFrame::Done]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_upstream_hits_deadline() {
        let upstream: EventStream = Box::pin(
            futures::stream::iter(vec![Ok(StreamEvent::TextDelta {
                text: "first".to_string(),
            })])
            .chain(futures::stream::pending()),
        );

        let frames = collect(relay_frames(upstream, Instant::now() + Duration::from_secs(30))).await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], RelayFrame::Fragment("first".to_string()));
        assert!(matches!(frames[1], RelayFrame::Error(_)));
    }
}
