use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::generation::stage::PipelineError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Malformed or mistyped request bodies are client errors like any other validation failure.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Pipeline(e) => match e {
                PipelineError::BackendUnavailable { .. } => (StatusCode::BAD_GATEWAY, "LLM_ERROR"),
                PipelineError::MalformedModelOutput { .. }
                | PipelineError::InvalidResumeJson { .. }
                | PipelineError::SchemaViolation { .. }
                | PipelineError::IdentityAltered { .. } => {
                    (StatusCode::BAD_GATEWAY, "MODEL_OUTPUT_ERROR")
                }
                PipelineError::Prompt { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "PROMPT_ERROR"),
                PipelineError::DeadlineExceeded { .. } => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
            },
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Validation(msg) => msg.clone(),
            AppError::Pipeline(e) => {
                tracing::error!(stage = %e.stage(), "Résumé loop failed: {e}");
                e.to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                "An internal server error occurred".to_string()
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::stage::Stage;
    use crate::llm_client::LlmError;

    #[test]
    fn test_pipeline_errors_map_to_distinct_codes() {
        let backend = AppError::from(PipelineError::BackendUnavailable {
            stage: Stage::Generate,
            source: LlmError::EmptyContent,
        });
        assert_eq!(backend.status_and_code(), (StatusCode::BAD_GATEWAY, "LLM_ERROR"));

        let identity = AppError::from(PipelineError::IdentityAltered {
            stage: Stage::Rewrite,
            field: "email",
        });
        assert_eq!(identity.status_and_code().1, "MODEL_OUTPUT_ERROR");

        let timeout = AppError::from(PipelineError::DeadlineExceeded {
            stage: Stage::Evaluate,
        });
        assert_eq!(
            timeout.status_and_code(),
            (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT")
        );
    }

    #[test]
    fn test_validation_is_a_client_error() {
        let err = AppError::Validation("job_description cannot be empty".to_string());
        assert_eq!(
            err.status_and_code(),
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
        );
    }
}
