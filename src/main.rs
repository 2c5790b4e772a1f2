use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use portfolio_relay::config::{AppConfig, ConfigError};
use portfolio_relay::llm::{GroqClient, LlmError};
use portfolio_relay::logging::init_tracing;
use portfolio_relay::profile::ProfileError;
use portfolio_relay::routes::configure_routes;
use portfolio_relay::state::AppState;

#[derive(Debug, Error)]
enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("upstream client error: {0}")]
    Llm(#[from] LlmError),
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; variables may come from the environment
    let _ = dotenvy::dotenv();
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Startup failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    let config = AppConfig::from_env()?;

    let provider = GroqClient::new(
        config.groq_api_key.clone(),
        config.groq_base_url.clone(),
        config.groq_model.clone(),
    )?;
    info!(model = provider.model().as_str(), "Using Groq upstream");

    let state = AppState::from_config(&config, Arc::new(provider))?;
    let routes = configure_routes(state);

    info!("Starting server on http://{}", config.bind_addr);
    warp::serve(routes).run(config.bind_addr).await;
    Ok(())
}
