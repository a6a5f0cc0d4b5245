//! Application-wide error types.
//!
//! Workflow rule violations live in `procura_core::WorkflowError`; this type
//! covers infrastructure concerns (configuration, auth tokens, transports)
//! and is what the HTTP layer falls back to when no richer error exists.

use thiserror::Error;

use crate::email::EmailError;
use crate::jwt::JwtError;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication failed (missing, expired or malformed token).
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Authenticated, but the actor may not perform the action.
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Conflict (e.g., duplicate entry or concurrent update).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// External service error (SMTP, notification service, broadcast).
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::Conflict(_) => 409,
            Self::Config(_) | Self::Database(_) | Self::ExternalService(_) | Self::Internal(_) => {
                500
            }
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the message is safe to show to API clients verbatim.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<JwtError> for AppError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => Self::Unauthorized("token has expired".to_string()),
            JwtError::EncodingError(msg) => Self::Internal(msg),
            JwtError::DecodingError(_) | JwtError::Invalid => {
                Self::Unauthorized("invalid or malformed token".to_string())
            }
        }
    }
}

impl From<EmailError> for AppError {
    fn from(err: EmailError) -> Self {
        Self::ExternalService(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::Config(String::new()), 500, "CONFIG_ERROR")]
    #[case(AppError::Unauthorized(String::new()), 401, "UNAUTHORIZED")]
    #[case(AppError::Forbidden(String::new()), 403, "FORBIDDEN")]
    #[case(AppError::NotFound(String::new()), 404, "NOT_FOUND")]
    #[case(AppError::Validation(String::new()), 400, "VALIDATION_ERROR")]
    #[case(AppError::Conflict(String::new()), 409, "CONFLICT")]
    #[case(AppError::Database(String::new()), 500, "DATABASE_ERROR")]
    #[case(AppError::ExternalService(String::new()), 500, "EXTERNAL_SERVICE_ERROR")]
    #[case(AppError::Internal(String::new()), 500, "INTERNAL_ERROR")]
    fn test_status_and_code(#[case] err: AppError, #[case] status: u16, #[case] code: &str) {
        assert_eq!(err.status_code(), status);
        assert_eq!(err.error_code(), code);
    }

    #[test]
    fn test_client_error_flag() {
        assert!(AppError::Conflict("dup".into()).is_client_error());
        assert!(!AppError::Database("down".into()).is_client_error());
    }

    #[test]
    fn test_expired_jwt_maps_to_unauthorized() {
        let err: AppError = JwtError::Expired.into();
        assert_eq!(err.status_code(), 401);
        assert!(err.to_string().contains("expired"));
    }

    #[test]
    fn test_malformed_jwt_maps_to_unauthorized() {
        let err: AppError = JwtError::DecodingError("bad segment".into()).into();
        assert_eq!(err.error_code(), "UNAUTHORIZED");
        assert!(!err.to_string().contains("bad segment"));
    }

    #[test]
    fn test_email_error_maps_to_external_service() {
        let err: AppError = EmailError::SendError("smtp down".into()).into();
        assert_eq!(err.error_code(), "EXTERNAL_SERVICE_ERROR");
        assert_eq!(err.to_string(), "External service error: Failed to send email: smtp down");
    }
}
