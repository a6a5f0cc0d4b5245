//! Mapping of workflow and application errors onto HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use procura_core::WorkflowError;
use procura_shared::AppError;

/// Error returned by every handler.
#[derive(Debug)]
pub enum ApiError {
    /// A workflow rule rejected the request.
    Workflow(WorkflowError),
    /// Infrastructure or authentication failure.
    App(AppError),
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        Self::Workflow(err)
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self::App(err)
    }
}

impl ApiError {
    /// HTTP status for the error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        let code = match self {
            Self::Workflow(err) => err.status_code(),
            Self::App(err) => err.status_code(),
        };
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// JSON body: `{success: false, error, message, details?}`.
    #[must_use]
    pub fn body(&self) -> Value {
        match self {
            Self::Workflow(WorkflowError::Internal(detail)) => {
                tracing::error!(error = %detail, "internal workflow error");
                json!({
                    "success": false,
                    "error": "INTERNAL_ERROR",
                    "message": "An internal error occurred"
                })
            }
            Self::Workflow(err) => {
                let mut body = json!({
                    "success": false,
                    "error": err.error_code(),
                    "message": err.to_string(),
                });
                if !err.field_errors().is_empty() {
                    body["details"] = json!(err.field_errors());
                }
                body
            }
            Self::App(err) if err.is_client_error() => json!({
                "success": false,
                "error": err.error_code(),
                "message": err.to_string(),
            }),
            Self::App(err) => {
                tracing::error!(error = %err, "internal application error");
                json!({
                    "success": false,
                    "error": err.error_code(),
                    "message": "An internal error occurred"
                })
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
