//! The `{success, message, data}` envelope used by every endpoint.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use procura_core::Outcome;

use crate::error::ApiError;

/// Result type for handlers.
pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

/// Successful response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Always true.
    pub success: bool,
    /// Human readable summary.
    pub message: String,
    /// Payload.
    pub data: T,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    /// A 200 response.
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            status: StatusCode::OK,
        }
    }

    /// A 201 response.
    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self::ok(message, data).with_status(StatusCode::CREATED)
    }

    /// Overrides the HTTP status.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

/// Payload of an entity-returning operation.
#[derive(Debug, Serialize)]
pub struct EntityData<T: Serialize> {
    /// The entity after the operation.
    pub entity: T,
    /// Statuses the caller may move it to next.
    pub available_transitions: Vec<String>,
}

impl<T: Serialize> From<Outcome<T>> for ApiResponse<EntityData<T>> {
    fn from(outcome: Outcome<T>) -> Self {
        Self::ok(
            outcome.message,
            EntityData {
                entity: outcome.entity,
                available_transitions: outcome.available_transitions,
            },
        )
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}
