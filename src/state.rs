use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::chat::rate_limit::DEFAULT_WINDOW;
use crate::chat::{ChatRelay, RateLimiter, RelaySettings};
use crate::config::AppConfig;
use crate::llm::core::config::DEFAULT_TEMPERATURE;
use crate::llm::{GenerationConfig, LlmProvider};
use crate::profile::{system_prompt, Profile, ProfileError};
use crate::store::{CounterStore, DownloadTracker, InMemoryCounterStore};

/// File served by the resume download endpoint
#[derive(Debug, Clone)]
pub struct ResumeAsset {
    pub path: PathBuf,
    /// Filename offered in `Content-Disposition`
    pub download_name: String,
    pub content_type: String,
}

impl ResumeAsset {
    pub fn pdf(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let download_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "resume.pdf".to_string());
        Self {
            path,
            download_name,
            content_type: "application/pdf".to_string(),
        }
    }
}

/// Everything the handlers share, cloned into each route
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<ChatRelay>,
    pub views: Arc<dyn CounterStore>,
    pub downloads: Arc<DownloadTracker>,
    pub resume: Arc<ResumeAsset>,
}

impl AppState {
    pub fn new(relay: ChatRelay, views: Arc<dyn CounterStore>, resume: ResumeAsset) -> Self {
        Self {
            relay: Arc::new(relay),
            views,
            downloads: Arc::new(DownloadTracker::new()),
            resume: Arc::new(resume),
        }
    }

    /// Wire the relay and stores from configuration around `provider`
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn LlmProvider>,
    ) -> Result<Self, ProfileError> {
        let profile = Profile::load(config.profile_path.as_deref())?;
        info!(
            name = %profile.personal.name,
            projects = profile.projects.len(),
            "Loaded profile"
        );

        let settings = RelaySettings {
            generation: GenerationConfig::new(config.max_tokens).with_temperature(DEFAULT_TEMPERATURE),
            upstream_timeout: config.upstream_timeout,
            ..RelaySettings::default()
        };
        let relay = ChatRelay::new(
            provider,
            RateLimiter::new(config.max_requests_per_minute, DEFAULT_WINDOW),
            system_prompt(&profile),
            settings,
        );

        let views = Arc::new(InMemoryCounterStore::seeded(profile.view_counts.clone()));

        Ok(Self::new(relay, views, ResumeAsset::pdf(&config.resume_path)))
    }
}
