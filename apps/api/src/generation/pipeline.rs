//! Résumé Loop: the generate → evaluate → rewrite state machine.
//!
//! # States
//! `ExtractKeyPoints` (optional) → `Generate` → `Evaluate` → { `Terminate` | `Rewrite` → `Evaluate` }
//!
//! # Routing
//! After every evaluation: terminate if `score >= threshold` or `attempts >= max_attempts`,
//! otherwise bump `attempts` and regenerate from the original inputs.
//!
//! Model calls per invocation are therefore bounded by
//! `1 (key points, optional) + 1 (generate) + 1 (evaluate) + 2 × max_attempts`.
//!
//! Any stage failure aborts the invocation immediately; nothing is retried and no
//! partial résumé is returned.

use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::generation::evaluator::{evaluate, EvaluationScore};
use crate::generation::generator::{generate, GenerationMode};
use crate::generation::key_points::{extract_key_points, KeyPoints};
use crate::generation::stage::{PipelineError, Stage, StageContext};
use crate::llm_client::{CompletionBackend, Deadline};
use crate::models::resume::{CandidateProfile, CandidateResume};
use crate::templates::PromptTemplates;

/// Default pass mark for the key-point-aware loop.
pub const DEFAULT_SCORE_THRESHOLD: u32 = 70;
/// Pass mark used by the direct (no key points) loop.
pub const DIRECT_SCORE_THRESHOLD: u32 = 80;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Fixed settings for every loop invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    pub score_threshold: EvaluationScore,
    /// Maximum number of rewrites after the first draft.
    pub max_attempts: u32,
    pub extract_key_points: bool,
    /// Wall-clock budget for one whole invocation.
    pub deadline: Option<Duration>,
}

impl LoopConfig {
    /// Key points first, pass mark 70.
    pub fn with_key_points() -> Self {
        Self {
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            extract_key_points: true,
            deadline: None,
        }
    }

    /// Straight to generation from the job description, pass mark 80.
    pub fn direct() -> Self {
        Self {
            score_threshold: DIRECT_SCORE_THRESHOLD,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            extract_key_points: false,
            deadline: None,
        }
    }

    /// The variant matching `extract_key_points`.
    pub fn preset(extract_key_points: bool) -> Self {
        if extract_key_points {
            Self::with_key_points()
        } else {
            Self::direct()
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::with_key_points()
    }
}

/// Routing decision taken after each evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Terminate,
    /// Regenerate; `attempts` is the counter value for the next pass.
    Rewrite { attempts: u32 },
}

/// Decides what follows an evaluation. Pure and deterministic.
pub fn route(score: EvaluationScore, attempts: u32, config: &LoopConfig) -> Transition {
    if score >= config.score_threshold || attempts >= config.max_attempts {
        Transition::Terminate
    } else {
        Transition::Rewrite {
            attempts: attempts + 1,
        }
    }
}

/// Loop states. The résumé under evaluation travels inside `Evaluate`.
#[derive(Debug)]
enum Step {
    ExtractKeyPoints,
    Generate(Stage),
    Evaluate(CandidateResume),
}

/// Invocation-local state. Created at loop entry, dropped when the loop returns.
#[derive(Debug)]
pub struct LoopState {
    pub run_id: Uuid,
    pub profile: CandidateProfile,
    pub job_description: String,
    pub key_points: Option<KeyPoints>,
    pub attempts: u32,
    pub score_history: Vec<EvaluationScore>,
    pub model_calls: u32,
}

impl LoopState {
    pub fn new(profile: CandidateProfile, job_description: String) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            profile,
            job_description,
            key_points: None,
            attempts: 0,
            score_history: Vec::new(),
            model_calls: 0,
        }
    }
}

/// Final résumé plus how the loop got there.
#[derive(Debug, Clone, Serialize)]
pub struct LoopOutcome {
    pub run_id: Uuid,
    pub resume: CandidateResume,
    pub score: EvaluationScore,
    pub attempts: u32,
    pub model_calls: u32,
    pub score_history: Vec<EvaluationScore>,
    pub key_points: Option<KeyPoints>,
}

/// Runs one loop invocation to completion or first failure.
pub async fn run_loop(
    backend: &dyn CompletionBackend,
    templates: &PromptTemplates,
    config: &LoopConfig,
    mode: GenerationMode,
    profile: CandidateProfile,
    job_description: String,
) -> Result<LoopOutcome, PipelineError> {
    let ctx = StageContext {
        backend,
        templates,
        deadline: config.deadline.map_or_else(Deadline::none, Deadline::after),
    };
    let mut state = LoopState::new(profile, job_description);

    info!(
        run_id = %state.run_id,
        ?mode,
        model = backend.model(),
        threshold = config.score_threshold,
        max_attempts = config.max_attempts,
        key_points = config.extract_key_points,
        "Résumé loop started"
    );

    let mut step = if config.extract_key_points {
        Step::ExtractKeyPoints
    } else {
        Step::Generate(Stage::Generate)
    };

    let (resume, score) = loop {
        step = match step {
            Step::ExtractKeyPoints => {
                state.model_calls += 1;
                let key_points = extract_key_points(&ctx, &state.job_description).await?;
                state.key_points = Some(key_points);
                Step::Generate(Stage::Generate)
            }

            Step::Generate(stage) => {
                state.model_calls += 1;
                let resume = generate(
                    &ctx,
                    stage,
                    mode,
                    &state.profile,
                    &state.job_description,
                    state.key_points.as_ref(),
                )
                .await?;
                Step::Evaluate(resume)
            }

            Step::Evaluate(resume) => {
                state.model_calls += 1;
                let score = evaluate(&ctx, &resume, &state.job_description).await?;
                state.score_history.push(score);

                match route(score, state.attempts, config) {
                    Transition::Terminate => break (resume, score),
                    Transition::Rewrite { attempts } => {
                        warn!(
                            run_id = %state.run_id,
                            score,
                            threshold = config.score_threshold,
                            attempt = attempts,
                            max_attempts = config.max_attempts,
                            "Score below threshold, rewriting résumé"
                        );
                        state.attempts = attempts;
                        Step::Generate(Stage::Rewrite)
                    }
                }
            }
        };
    };

    if score < config.score_threshold {
        warn!(
            run_id = %state.run_id,
            score,
            attempts = state.attempts,
            "Attempt budget exhausted; returning best-effort résumé below threshold"
        );
    }

    info!(
        run_id = %state.run_id,
        score,
        attempts = state.attempts,
        model_calls = state.model_calls,
        "Résumé loop finished"
    );

    Ok(LoopOutcome {
        run_id: state.run_id,
        resume,
        score,
        attempts: state.attempts,
        model_calls: state.model_calls,
        score_history: state.score_history,
        key_points: state.key_points,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
