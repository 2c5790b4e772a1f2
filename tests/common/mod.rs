#![allow(dead_code)]

use async_trait::async_trait;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use portfolio_relay::chat::rate_limit::DEFAULT_WINDOW;
use portfolio_relay::chat::{ChatRelay, RateLimiter, RelaySettings};
use portfolio_relay::llm::{
    EventStream, FinishReason, GenerateRequest, LlmError, LlmProvider, StreamEvent,
};
use portfolio_relay::profile::{system_prompt, Profile};
use portfolio_relay::routes::configure_routes;
use portfolio_relay::state::{AppState, ResumeAsset};
use portfolio_relay::store::InMemoryCounterStore;

pub type UpstreamItem = Result<StreamEvent, LlmError>;

enum Script {
    Fragments(Vec<String>),
    Fail(fn() -> LlmError),
    FailAfter(Vec<String>, fn() -> LlmError),
    Channel(Mutex<Option<mpsc::Receiver<UpstreamItem>>>),
}

/// Stand-in upstream that replays a script and records what it was asked
pub struct ScriptedProvider {
    script: Script,
    calls: AtomicUsize,
    last_request: Mutex<Option<GenerateRequest>>,
}

impl ScriptedProvider {
    fn with_script(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    pub fn fragments(fragments: &[&str]) -> Arc<Self> {
        Self::with_script(Script::Fragments(
            fragments.iter().map(|s| s.to_string()).collect(),
        ))
    }

    pub fn failing(err: fn() -> LlmError) -> Arc<Self> {
        Self::with_script(Script::Fail(err))
    }

    pub fn fails_after(fragments: &[&str], err: fn() -> LlmError) -> Arc<Self> {
        Self::with_script(Script::FailAfter(
            fragments.iter().map(|s| s.to_string()).collect(),
            err,
        ))
    }

    /// Upstream fed by the test through the returned sender; usable once
    pub fn channel() -> (Arc<Self>, mpsc::Sender<UpstreamItem>) {
        let (tx, rx) = mpsc::channel(16);
        (Self::with_script(Script::Channel(Mutex::new(Some(rx)))), tx)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<GenerateRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

pub fn text(fragment: &str) -> UpstreamItem {
    Ok(StreamEvent::TextDelta {
        text: fragment.to_string(),
    })
}

fn finished(fragments: &[String]) -> Vec<UpstreamItem> {
    let mut events = vec![Ok(StreamEvent::MessageStart {
        id: "chatcmpl-test".to_string(),
    })];
    events.extend(fragments.iter().map(|f| text(f)));
    events
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn stream_generate(&self, request: GenerateRequest) -> Result<EventStream, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);

        match &self.script {
            Script::Fragments(fragments) => {
                let mut events = finished(fragments);
                events.push(Ok(StreamEvent::MessageEnd {
                    finish_reason: FinishReason::Stop,
                    usage: None,
                }));
                Ok(Box::pin(futures::stream::iter(events)))
            }
            Script::Fail(err) => Err(err()),
            Script::FailAfter(fragments, err) => {
                let mut events = finished(fragments);
                events.push(Err(err()));
                Ok(Box::pin(futures::stream::iter(events)))
            }
            Script::Channel(rx) => {
                let rx = rx
                    .lock()
                    .unwrap()
                    .take()
                    .ok_or_else(|| LlmError::InvalidRequest("channel already used".to_string()))?;
                Ok(Box::pin(ReceiverStream::new(rx)))
            }
        }
    }
}

/// State around `provider` with the built-in profile and a resume at `resume_path`
pub fn test_state(
    provider: Arc<dyn LlmProvider>,
    max_requests: u32,
    resume_path: PathBuf,
) -> AppState {
    let profile = Profile::builtin().expect("built-in profile parses");
    let relay = ChatRelay::new(
        provider,
        RateLimiter::new(max_requests, DEFAULT_WINDOW),
        system_prompt(&profile),
        RelaySettings {
            upstream_timeout: Duration::from_secs(5),
            ..RelaySettings::default()
        },
    );
    let views = Arc::new(InMemoryCounterStore::seeded(profile.view_counts.clone()));
    AppState::new(relay, views, ResumeAsset::pdf(resume_path))
}

/// A path in the temp dir that does not exist yet
pub fn scratch_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{}-{}", uuid::Uuid::new_v4(), name))
}

/// Serve `state` on an ephemeral port and return the base URL
pub async fn spawn_server(state: AppState) -> String {
    let addr: SocketAddr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        listener.local_addr().expect("local addr")
    };

    tokio::spawn(warp::serve(configure_routes(state)).run(addr));

    for _ in 0..100 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return format!("http://{}", addr);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("server on {} did not start", addr);
}
