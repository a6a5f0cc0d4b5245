//! Shared errors, configuration and auth primitives for Procura.
//!
//! This crate provides common building blocks used across all other crates:
//! - Application-wide error types
//! - Configuration management (files + `PROCURA__*` environment)
//! - JWT claims and token validation
//! - SMTP email transport

pub mod auth;
pub mod config;
pub mod email;
pub mod error;
pub mod jwt;

pub use auth::Claims;
pub use config::{AppConfig, EmailConfig, LateSubmission, WorkflowConfig};
pub use email::{EmailError, EmailService};
pub use error::{AppError, AppResult};
pub use jwt::{JwtConfig, JwtError, JwtService};
