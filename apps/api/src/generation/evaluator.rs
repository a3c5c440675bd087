//! Résumé evaluation: asks the model for an ATS / job-alignment score.
//!
//! Only the `score` field of the reply is read. A reply without `score` counts as
//! the worst case (0) rather than an error; anything else that is not a score in
//! 0..=100 is rejected.

use serde_json::Value;
use tracing::{info, warn};

use crate::generation::schema::SchemaViolation;
use crate::generation::stage::{prompt_error, PipelineError, Stage, StageContext};
use crate::models::resume::CandidateResume;
use crate::templates::PromptVars;

/// Alignment score in 0..=100.
pub type EvaluationScore = u32;

pub const MAX_SCORE: EvaluationScore = 100;

/// Scores `resume` against `job_description`.
pub async fn evaluate(
    ctx: &StageContext<'_>,
    resume: &CandidateResume,
    job_description: &str,
) -> Result<EvaluationScore, PipelineError> {
    let stage = Stage::Evaluate;
    let vars = PromptVars::new()
        .text("job_description", job_description)
        .json("resume", resume)
        .map_err(prompt_error(stage))?;

    let record = ctx.ask_json(stage, "evaluate", &vars).await?;
    let score = read_score(&record).map_err(|source| PipelineError::SchemaViolation { stage, source })?;

    info!(score, "Résumé evaluated");
    Ok(score)
}

/// Pulls the score out of an evaluator reply.
pub(crate) fn read_score(record: &Value) -> Result<EvaluationScore, SchemaViolation> {
    let object = record.as_object().ok_or_else(|| SchemaViolation {
        path: "$".to_string(),
        expected: "object".to_string(),
        actual: record.to_string(),
    })?;

    let Some(raw) = object.get("score") else {
        warn!("Evaluator reply has no score; counting it as 0");
        return Ok(0);
    };

    let out_of_contract = || SchemaViolation {
        path: "score".to_string(),
        expected: format!("number between 0 and {MAX_SCORE}"),
        actual: raw.to_string(),
    };

    let value = raw.as_f64().ok_or_else(out_of_contract)?;
    if !(0.0..=MAX_SCORE as f64).contains(&value) {
        return Err(out_of_contract());
    }
    Ok(value.round() as EvaluationScore)
}
