//! Shared plumbing for pipeline stages: stage identity, the pipeline error type,
//! and the render → complete → extract sequence every stage performs.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::generation::schema::SchemaViolation;
use crate::llm_client::extract::{extract_json, MalformedModelOutput};
use crate::llm_client::{CompletionBackend, Deadline, LlmError};
use crate::templates::{PromptError, PromptTemplates, PromptVars};

/// Which step of the loop a model call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    KeyPoints,
    Generate,
    Rewrite,
    Evaluate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::KeyPoints => "key-point extraction",
            Stage::Generate => "generation",
            Stage::Rewrite => "rewrite",
            Stage::Evaluate => "evaluation",
        };
        f.write_str(name)
    }
}

/// Every way a loop invocation can fail. None of these are retried: the first
/// failure aborts the invocation and reaches the caller unchanged.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Prompt rendering failed during {stage}: {source}")]
    Prompt {
        stage: Stage,
        #[source]
        source: PromptError,
    },

    #[error("Model backend unavailable during {stage}: {source}")]
    BackendUnavailable {
        stage: Stage,
        #[source]
        source: LlmError,
    },

    #[error("Malformed model output during {stage}: {source}")]
    MalformedModelOutput {
        stage: Stage,
        #[source]
        source: MalformedModelOutput,
    },

    #[error("Invalid résumé JSON during {stage}: {source}")]
    InvalidResumeJson {
        stage: Stage,
        #[source]
        source: SchemaViolation,
    },

    #[error("Unexpected {stage} output: {source}")]
    SchemaViolation {
        stage: Stage,
        #[source]
        source: SchemaViolation,
    },

    #[error("Model altered personal_info.{field} during {stage}")]
    IdentityAltered { stage: Stage, field: &'static str },

    #[error("Deadline exceeded during {stage}")]
    DeadlineExceeded { stage: Stage },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Prompt { stage, .. }
            | PipelineError::BackendUnavailable { stage, .. }
            | PipelineError::MalformedModelOutput { stage, .. }
            | PipelineError::InvalidResumeJson { stage, .. }
            | PipelineError::SchemaViolation { stage, .. }
            | PipelineError::IdentityAltered { stage, .. }
            | PipelineError::DeadlineExceeded { stage } => *stage,
        }
    }

    fn backend(stage: Stage, source: LlmError) -> Self {
        match source {
            LlmError::DeadlineExceeded => PipelineError::DeadlineExceeded { stage },
            source => PipelineError::BackendUnavailable { stage, source },
        }
    }
}

/// What a stage needs to talk to the model. Borrowed for one invocation.
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub backend: &'a dyn CompletionBackend,
    pub templates: &'a PromptTemplates,
    pub deadline: Deadline,
}

impl<'a> StageContext<'a> {
    /// Renders `template`, sends it, and extracts the reply as JSON.
    pub async fn ask_json(
        &self,
        stage: Stage,
        template: &str,
        vars: &PromptVars,
    ) -> Result<Value, PipelineError> {
        let prompt = self
            .templates
            .render(template, vars)
            .map_err(|source| PipelineError::Prompt { stage, source })?;

        if self.deadline.is_expired() {
            return Err(PipelineError::DeadlineExceeded { stage });
        }

        debug!(%stage, template, prompt_chars = prompt.len(), "Sending prompt");
        let raw = self
            .backend
            .complete(&prompt, self.deadline)
            .await
            .map_err(|e| PipelineError::backend(stage, e))?;

        extract_json(&raw).map_err(|source| PipelineError::MalformedModelOutput { stage, source })
    }
}

/// Wraps a prompt-variable serialization failure with its stage.
pub fn prompt_error(stage: Stage) -> impl FnOnce(PromptError) -> PipelineError {
    move |source| PipelineError::Prompt { stage, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedBackend;

    fn templates() -> PromptTemplates {
        PromptTemplates::from_yaml_str("ask: \"Question: {q}\"").unwrap()
    }

    #[tokio::test]
    async fn test_ask_json_renders_sends_and_extracts() {
        let backend = ScriptedBackend::ok(["```json\n{\"ok\": true}\n```"]);
        let templates = templates();
        let ctx = StageContext {
            backend: &backend,
            templates: &templates,
            deadline: Deadline::none(),
        };

        let value = ctx
            .ask_json(Stage::Evaluate, "ask", &PromptVars::new().text("q", "why"))
            .await
            .unwrap();

        assert_eq!(value, serde_json::json!({"ok": true}));
        assert_eq!(backend.prompts(), vec!["Question: why".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_variable_fails_before_calling_backend() {
        let backend = ScriptedBackend::ok(["{}"]);
        let templates = templates();
        let ctx = StageContext {
            backend: &backend,
            templates: &templates,
            deadline: Deadline::none(),
        };

        let err = ctx
            .ask_json(Stage::Generate, "ask", &PromptVars::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Prompt {
                stage: Stage::Generate,
                source: PromptError::MissingVariable { .. }
            }
        ));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_becomes_backend_unavailable() {
        let backend = ScriptedBackend::new(vec![Err(LlmError::Api {
            status: 529,
            message: "overloaded".to_string(),
        })]);
        let templates = templates();
        let ctx = StageContext {
            backend: &backend,
            templates: &templates,
            deadline: Deadline::none(),
        };

        let err = ctx
            .ask_json(Stage::KeyPoints, "ask", &PromptVars::new().text("q", "x"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::BackendUnavailable {
                stage: Stage::KeyPoints,
                source: LlmError::Api { status: 529, .. }
            }
        ));
    }

    #[tokio::test]
    async fn test_prose_reply_is_malformed_output_with_raw_text() {
        let backend = ScriptedBackend::ok(["Sure! Here is the JSON you asked for."]);
        let templates = templates();
        let ctx = StageContext {
            backend: &backend,
            templates: &templates,
            deadline: Deadline::none(),
        };

        let err = ctx
            .ask_json(Stage::Evaluate, "ask", &PromptVars::new().text("q", "x"))
            .await
            .unwrap_err();

        match err {
            PipelineError::MalformedModelOutput { stage, source } => {
                assert_eq!(stage, Stage::Evaluate);
                assert_eq!(source.raw, "Sure! Here is the JSON you asked for.");
            }
            other => panic!("expected MalformedModelOutput, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_deadline_skips_the_call() {
        let backend = ScriptedBackend::ok(["{}"]);
        let templates = templates();
        let deadline = Deadline::after(std::time::Duration::from_secs(1));
        tokio::time::advance(std::time::Duration::from_secs(2)).await;
        let ctx = StageContext {
            backend: &backend,
            templates: &templates,
            deadline,
        };

        let err = ctx
            .ask_json(Stage::Rewrite, "ask", &PromptVars::new().text("q", "x"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::DeadlineExceeded {
                stage: Stage::Rewrite
            }
        ));
        assert_eq!(backend.calls(), 0);
    }

    #[test]
    fn test_stage_display_names() {
        assert_eq!(Stage::KeyPoints.to_string(), "key-point extraction");
        assert_eq!(Stage::Rewrite.to_string(), "rewrite");
    }
}
