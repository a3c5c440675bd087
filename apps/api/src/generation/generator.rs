//! Résumé generation: one full model-written résumé per call.
//!
//! Used for the first draft and for every rewrite. A rewrite is NOT an edit of the
//! previous draft: it re-sends the same inputs and relies on the model's own
//! variability. No evaluator feedback is passed back into the prompt.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::generation::key_points::KeyPoints;
use crate::generation::schema::{schema_description, validate};
use crate::generation::stage::{prompt_error, PipelineError, Stage, StageContext};
use crate::models::resume::{CandidateProfile, CandidateResume};
use crate::templates::PromptVars;

/// What the loop is producing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Build a tailored résumé from the candidate's full profile.
    #[default]
    Tailor,
    /// Rework an existing résumé for a new job description.
    Optimize,
}

/// Picks the template for this call and fills its variables.
fn build_prompt_vars(
    stage: Stage,
    mode: GenerationMode,
    profile: &CandidateProfile,
    job_description: &str,
    key_points: Option<&KeyPoints>,
) -> Result<(&'static str, PromptVars), PipelineError> {
    let schema = schema_description();
    let vars = PromptVars::new()
        .text("job_description", job_description)
        .json("schema", &schema)
        .map_err(prompt_error(stage))?;

    match (mode, key_points) {
        (GenerationMode::Optimize, _) => {
            let vars = vars.json("resume", profile).map_err(prompt_error(stage))?;
            Ok(("optimize", vars))
        }
        (GenerationMode::Tailor, Some(key_points)) => {
            let vars = vars
                .json("profile", profile)
                .and_then(|v| v.json("key_points", key_points))
                .map_err(prompt_error(stage))?;
            Ok(("generate_with_key_points", vars))
        }
        (GenerationMode::Tailor, None) => {
            let vars = vars.json("profile", profile).map_err(prompt_error(stage))?;
            Ok(("generate_direct", vars))
        }
    }
}

/// Generates a résumé for `job_description` from `profile`.
///
/// Output must pass the résumé contract AND carry the profile's `personal_info`
/// unchanged; anything else is a fatal error for the invocation.
pub async fn generate(
    ctx: &StageContext<'_>,
    stage: Stage,
    mode: GenerationMode,
    profile: &CandidateProfile,
    job_description: &str,
    key_points: Option<&KeyPoints>,
) -> Result<CandidateResume, PipelineError> {
    let (template, vars) = build_prompt_vars(stage, mode, profile, job_description, key_points)?;
    let record = ctx.ask_json(stage, template, &vars).await?;

    let resume =
        validate(&record).map_err(|source| PipelineError::InvalidResumeJson { stage, source })?;

    if let Some(field) = profile.personal_info.first_difference(&resume.personal_info) {
        return Err(PipelineError::IdentityAltered { stage, field });
    }

    info!(
        %stage,
        template,
        experiences = resume.experiences.len(),
        skills = resume.skills.len(),
        projects = resume.projects.len(),
        "Résumé generated"
    );
    Ok(resume)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedBackend;
    use crate::llm_client::Deadline;
    use crate::models::resume::fixtures::sample_profile;
    use crate::templates::fixtures::shipped_templates;
    use serde_json::json;

    const JD: &str = "Backend engineer, Rust and PostgreSQL, on-call rotation.";

    fn tailored_reply() -> String {
        let mut resume = serde_json::to_value(sample_profile()).unwrap();
        resume["experiences"] = json!([resume["experiences"][0].clone()]);
        resume["projects"] = json!([]);
        format!("```json\n{}\n```", serde_json::to_string_pretty(&resume).unwrap())
    }

    #[tokio::test]
    async fn test_generate_direct_returns_validated_resume() {
        let backend = ScriptedBackend::ok([tailored_reply()]);
        let templates = shipped_templates();
        let ctx = StageContext {
            backend: &backend,
            templates: &templates,
            deadline: Deadline::none(),
        };
        let profile = sample_profile();

        let resume = generate(&ctx, Stage::Generate, GenerationMode::Tailor, &profile, JD, None)
            .await
            .unwrap();

        assert_eq!(resume.personal_info, profile.personal_info);
        assert_eq!(resume.experiences.len(), 1);
        assert!(resume.projects.is_empty());

        let prompt = &backend.prompts()[0];
        assert!(prompt.contains(JD), "direct prompt embeds the job description");
        assert!(prompt.contains("\"full_name\": \"Ada Moreau\""));
        assert!(prompt.contains("\"additionalProperties\": false"), "schema is advertised");
    }

    #[tokio::test]
    async fn test_generate_with_key_points_embeds_them() {
        let backend = ScriptedBackend::ok([tailored_reply()]);
        let templates = shipped_templates();
        let ctx = StageContext {
            backend: &backend,
            templates: &templates,
            deadline: Deadline::none(),
        };
        let key_points = KeyPoints {
            must_have: vec!["On-call experience".to_string()],
            keywords: vec!["PostgreSQL".to_string()],
            ..KeyPoints::default()
        };

        generate(
            &ctx,
            Stage::Generate,
            GenerationMode::Tailor,
            &sample_profile(),
            JD,
            Some(&key_points),
        )
        .await
        .unwrap();

        let prompt = &backend.prompts()[0];
        assert!(prompt.contains("RECRUITER KEY POINTS"));
        assert!(prompt.contains("On-call experience"));
    }

    #[tokio::test]
    async fn test_optimize_mode_uses_optimize_template() {
        let backend = ScriptedBackend::ok([tailored_reply()]);
        let templates = shipped_templates();
        let ctx = StageContext {
            backend: &backend,
            templates: &templates,
            deadline: Deadline::none(),
        };

        generate(&ctx, Stage::Generate, GenerationMode::Optimize, &sample_profile(), JD, None)
            .await
            .unwrap();

        assert!(backend.prompts()[0].contains("ORIGINAL RÉSUMÉ"));
    }

    #[tokio::test]
    async fn test_altered_identity_is_rejected() {
        let mut resume = serde_json::to_value(sample_profile()).unwrap();
        resume["personal_info"]["email"] = json!("ada@moreau.dev");
        let backend = ScriptedBackend::ok([resume.to_string()]);
        let templates = shipped_templates();
        let ctx = StageContext {
            backend: &backend,
            templates: &templates,
            deadline: Deadline::none(),
        };

        let err = generate(&ctx, Stage::Rewrite, GenerationMode::Tailor, &sample_profile(), JD, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::IdentityAltered {
                stage: Stage::Rewrite,
                field: "email"
            }
        ));
    }

    #[tokio::test]
    async fn test_invented_optional_identity_field_is_rejected() {
        let mut resume = serde_json::to_value(sample_profile()).unwrap();
        resume["personal_info"]["x"] = json!("@ada");
        let backend = ScriptedBackend::ok([resume.to_string()]);
        let templates = shipped_templates();
        let ctx = StageContext {
            backend: &backend,
            templates: &templates,
            deadline: Deadline::none(),
        };

        let err = generate(&ctx, Stage::Generate, GenerationMode::Tailor, &sample_profile(), JD, None)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::IdentityAltered { field: "x", .. }));
    }

    #[tokio::test]
    async fn test_schema_violation_is_invalid_resume_json() {
        let backend = ScriptedBackend::ok([r#"{"experiences": []}"#]);
        let templates = shipped_templates();
        let ctx = StageContext {
            backend: &backend,
            templates: &templates,
            deadline: Deadline::none(),
        };

        let err = generate(&ctx, Stage::Generate, GenerationMode::Tailor, &sample_profile(), JD, None)
            .await
            .unwrap_err();

        match err {
            PipelineError::InvalidResumeJson { stage, source } => {
                assert_eq!(stage, Stage::Generate);
                assert_eq!(source.path, "personal_info");
            }
            other => panic!("expected InvalidResumeJson, got {other:?}"),
        }
    }
}
