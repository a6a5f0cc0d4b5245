//! API route definitions.

use axum::{
    Router,
    body::Bytes,
    extract::{FromRequest, Request},
    middleware,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use procura_shared::AppError;

use crate::{AppState, error::ApiError, middleware::auth_middleware};

pub mod bids;
pub mod health;
pub mod negotiations;
pub mod purchase_orders;
pub mod rfqs;

/// Creates the API router with protected routes that need state for middleware.
#[allow(clippy::needless_pass_by_value)]
pub fn api_routes_with_state(state: AppState) -> Router<AppState> {
    let protected_routes = Router::new()
        .merge(rfqs::routes())
        .merge(bids::routes())
        .merge(negotiations::routes())
        .merge(purchase_orders::routes())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(health::routes())
        .merge(protected_routes)
}

/// JSON body that may be omitted entirely.
#[derive(Debug)]
pub struct OptionalJson<T>(pub Option<T>);

impl<S, T> FromRequest<S> for OptionalJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(None));
        }
        serde_json::from_slice(&bytes)
            .map(|value| Self(Some(value)))
            .map_err(|e| AppError::Validation(format!("invalid JSON body: {e}")).into())
    }
}

/// Transition metadata for convenience endpoints; `null` when no body is sent.
pub type Metadata = OptionalJson<Value>;

impl OptionalJson<Value> {
    /// The metadata object, or `null`.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0.unwrap_or(Value::Null)
    }
}
