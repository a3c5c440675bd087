//! Axum route handlers for the Résumé API.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::evaluator::EvaluationScore;
use crate::generation::generator::GenerationMode;
use crate::generation::pipeline::{run_loop, LoopOutcome};
use crate::generation::schema::validate;
use crate::models::resume::{CandidateResume, ResumeDocument};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

// Documents arrive as raw JSON and go through the résumé contract, so a bad date
// or an unknown field is reported with its path like any model output would be.

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub profile: Value,
    pub job_description: String,
}

#[derive(Debug, Deserialize)]
pub struct OptimizeRequest {
    pub resume: Value,
    pub job_description: String,
}

#[derive(Debug, Serialize)]
pub struct ResumeResponse {
    pub run_id: Uuid,
    pub resume: CandidateResume,
    pub score: EvaluationScore,
    pub attempts: u32,
    pub model_calls: u32,
    pub score_history: Vec<EvaluationScore>,
}

impl From<LoopOutcome> for ResumeResponse {
    fn from(outcome: LoopOutcome) -> Self {
        Self {
            run_id: outcome.run_id,
            resume: outcome.resume,
            score: outcome.score,
            attempts: outcome.attempts,
            model_calls: outcome.model_calls,
            score_history: outcome.score_history,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/resumes/generate
///
/// Builds a résumé tailored to the job description from the candidate's full profile.
pub async fn handle_generate(
    State(state): State<AppState>,
    request: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<ResumeResponse>, AppError> {
    let Json(request) = request?;
    let profile = parse_document("profile", &request.profile)?;
    run(state, GenerationMode::Tailor, profile, request.job_description).await
}

/// POST /api/v1/resumes/optimize
///
/// Reworks an existing résumé for a new job description. Same loop, different template.
pub async fn handle_optimize(
    State(state): State<AppState>,
    request: Result<Json<OptimizeRequest>, JsonRejection>,
) -> Result<Json<ResumeResponse>, AppError> {
    let Json(request) = request?;
    let resume = parse_document("resume", &request.resume)?;
    run(state, GenerationMode::Optimize, resume, request.job_description).await
}

async fn run(
    state: AppState,
    mode: GenerationMode,
    document: ResumeDocument,
    job_description: String,
) -> Result<Json<ResumeResponse>, AppError> {
    if job_description.trim().is_empty() {
        return Err(AppError::Validation(
            "job_description cannot be empty".to_string(),
        ));
    }

    let outcome = run_loop(
        state.llm.as_ref(),
        &state.templates,
        &state.loop_config,
        mode,
        document,
        job_description,
    )
    .await?;

    // Output is re-checked against the contract before it leaves the service.
    revalidate(&outcome.resume).map_err(|e| {
        AppError::Internal(anyhow::anyhow!("Loop returned a résumé failing validation: {e}"))
    })?;

    info!(
        run_id = %outcome.run_id,
        ?mode,
        score = outcome.score,
        attempts = outcome.attempts,
        "Résumé request completed"
    );
    Ok(Json(outcome.into()))
}

/// Checks an incoming document against the résumé contract.
fn parse_document(field: &str, raw: &Value) -> Result<ResumeDocument, AppError> {
    validate(raw).map_err(|e| AppError::Validation(format!("Invalid {field}: {e}")))
}

fn revalidate(document: &ResumeDocument) -> anyhow::Result<()> {
    let value = serde_json::to_value(document)?;
    validate(&value)?;
    Ok(())
}
