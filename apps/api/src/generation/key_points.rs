//! Key-point extraction: distills a job description into recruiter priorities.
//!
//! Runs at most once per loop invocation; the result is reused by every
//! generation and rewrite in that invocation.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::generation::schema::SchemaViolation;
use crate::generation::stage::{PipelineError, Stage, StageContext};
use crate::templates::PromptVars;

/// Prioritized requirements derived from a job description.
///
/// Every field is optional and unknown keys are ignored: only a reply that is not
/// a JSON object of this rough shape aborts the invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyPoints {
    #[serde(default)]
    pub must_have: Vec<String>,
    #[serde(default)]
    pub nice_to_have: Vec<String>,
    #[serde(default)]
    pub responsibilities: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub seniority: Option<String>,
}

/// Asks the model for the key points of `job_description`.
///
/// There is no fallback: unparseable or mis-shaped output aborts the invocation.
pub async fn extract_key_points(
    ctx: &StageContext<'_>,
    job_description: &str,
) -> Result<KeyPoints, PipelineError> {
    let stage = Stage::KeyPoints;
    let vars = PromptVars::new().text("job_description", job_description);
    let record = ctx.ask_json(stage, "key_points", &vars).await?;

    let key_points: KeyPoints =
        serde_json::from_value(record).map_err(|e| PipelineError::SchemaViolation {
            stage,
            source: SchemaViolation {
                path: "$".to_string(),
                expected: "key points object".to_string(),
                actual: e.to_string(),
            },
        })?;

    info!(
        must_have = key_points.must_have.len(),
        keywords = key_points.keywords.len(),
        seniority = ?key_points.seniority,
        "Key points extracted"
    );
    Ok(key_points)
}
