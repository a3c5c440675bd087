use std::sync::Arc;

use crate::generation::pipeline::LoopConfig;
use crate::llm_client::CompletionBackend;
use crate::templates::PromptTemplates;

/// Shared application state injected into all route handlers via Axum extractors.
/// Everything here is fixed at startup and read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    /// Model backend. `LlmClient` in production, swappable for tests.
    pub llm: Arc<dyn CompletionBackend>,
    pub templates: Arc<PromptTemplates>,
    pub loop_config: LoopConfig,
}
