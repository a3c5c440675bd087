mod config;
mod errors;
mod generation;
mod llm_client;
mod models;
mod routes;
mod state;
mod templates;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::templates::{PromptTemplates, REQUIRED_TEMPLATES};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tailor API v{}", env!("CARGO_PKG_VERSION"));

    // Load prompt templates; a missing key is a startup error, not a request error
    let templates = PromptTemplates::load(&config.prompts_path)
        .with_context(|| format!("Failed to load prompt templates from {}", config.prompts_path))?;
    templates.ensure_keys(REQUIRED_TEMPLATES)?;
    info!("Prompt templates loaded from {}", config.prompts_path);

    // Initialize LLM client
    let llm = LlmClient::new(&config)?;
    info!("LLM client initialized (model: {})", config.llm_model);

    let loop_config = config.loop_config();
    info!(
        threshold = loop_config.score_threshold,
        max_attempts = loop_config.max_attempts,
        key_points = loop_config.extract_key_points,
        deadline = ?loop_config.deadline,
        "Résumé loop configured"
    );

    // Build app state
    let state = AppState {
        llm: Arc::new(llm),
        templates: Arc::new(templates),
        loop_config,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
