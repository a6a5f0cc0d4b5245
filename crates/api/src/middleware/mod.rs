//! Request middleware.

pub mod auth;

pub use auth::{CurrentActor, actor_from_claims, auth_middleware};
