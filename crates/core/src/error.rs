//! Workflow error types shared by every procurement component.
//!
//! Each variant maps onto a single HTTP status so the API layer can render
//! any failure without inspecting its message.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::machine::EntityKind;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field path, e.g. `items[0].quantity`.
    pub field: String,
    /// Human readable message.
    pub message: String,
}

impl FieldError {
    /// Creates a field error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors that can occur during workflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Input failed validation.
    #[error("Validation failed: {}", summarize(.0))]
    Validation(Vec<FieldError>),

    /// Actor lacks the role or company ownership for the operation.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The target status is not reachable from the current one.
    #[error("Invalid {entity} status transition from {from} to {to}")]
    InvalidTransition {
        /// Entity whose status was being changed.
        entity: EntityKind,
        /// The current status.
        from: String,
        /// The attempted target status.
        to: String,
    },

    /// A business precondition does not hold.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// Entity not found.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind that was looked up.
        entity: EntityKind,
        /// The identifier that was looked up.
        id: Uuid,
    },

    /// Concurrent update, duplicate, or stale data.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage or other unexpected failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl WorkflowError {
    /// Shorthand for a validation error on one field.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    /// Shorthand for an unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Shorthand for a failed precondition.
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::PreconditionFailed(message.into())
    }

    /// Shorthand for a conflict.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Shorthand for a missing entity.
    #[must_use]
    pub const fn not_found(entity: EntityKind, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Unauthorized(_) => 403,
            Self::NotFound { .. } => 404,
            Self::InvalidTransition { .. } | Self::Conflict(_) => 409,
            Self::PreconditionFailed(_) => 422,
            Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::PreconditionFailed(_) => "PRECONDITION_FAILED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Field errors carried by a validation failure.
    #[must_use]
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Validation(errors) => errors,
            _ => &[],
        }
    }
}

impl From<WorkflowError> for procura_shared::AppError {
    fn from(err: WorkflowError) -> Self {
        let message = err.to_string();
        match err {
            WorkflowError::Validation(_) | WorkflowError::PreconditionFailed(_) => {
                Self::Validation(message)
            }
            WorkflowError::Unauthorized(_) => Self::Forbidden(message),
            WorkflowError::NotFound { .. } => Self::NotFound(message),
            WorkflowError::InvalidTransition { .. } | WorkflowError::Conflict(_) => {
                Self::Conflict(message)
            }
            WorkflowError::Internal(_) => Self::Internal(message),
        }
    }
}
