//! Authentication middleware for protected routes.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

use procura_core::machine::{Actor, ActorRole};
use procura_shared::{AppError, Claims};

use crate::AppState;
use crate::error::ApiError;

/// Extracts the bearer token from the Authorization header.
fn extract_bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
}

/// Builds the workflow actor a token speaks for.
///
/// # Errors
///
/// Returns `AppError::Unauthorized` for an unknown role, or for a buyer or
/// supplier token without a company.
pub fn actor_from_claims(claims: &Claims) -> Result<Actor, AppError> {
    let role = ActorRole::parse(&claims.role)
        .ok_or_else(|| AppError::Unauthorized(format!("unknown role '{}'", claims.role)))?;
    if role != ActorRole::Admin && claims.company_id.is_none() {
        return Err(AppError::Unauthorized(format!(
            "{role} token carries no company"
        )));
    }
    Ok(Actor::new(claims.user_id(), claims.company_id(), role))
}

/// Authentication middleware that validates JWT tokens.
///
/// Stores the resolved [`Actor`] in request extensions for handlers.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let Some(token) = auth_header.and_then(extract_bearer_token) else {
        return ApiError::from(AppError::Unauthorized(
            "Authorization header with Bearer token is required".to_string(),
        ))
        .into_response();
    };

    let actor = state
        .jwt_service
        .validate_token(token)
        .map_err(AppError::from)
        .and_then(|claims| actor_from_claims(&claims));

    match actor {
        Ok(actor) => {
            request.extensions_mut().insert(actor);
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(error = %e, "rejected bearer token");
            ApiError::from(e).into_response()
        }
    }
}

/// Extractor for the authenticated actor.
#[derive(Debug, Clone, Copy)]
pub struct CurrentActor(pub Actor);

impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Actor>()
            .copied()
            .map(CurrentActor)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rstest::rstest;
    use uuid::Uuid;

    fn claims(role: &str, company: Option<Uuid>) -> Claims {
        Claims::new(Uuid::new_v4(), company, role, Utc::now() + Duration::minutes(5))
    }

    #[rstest]
    #[case("Bearer abc", Some("abc"))]
    #[case("bearer abc", Some("abc"))]
    #[case("Basic abc", None)]
    fn test_extract_bearer_token(#[case] header: &str, #[case] expected: Option<&str>) {
        assert_eq!(extract_bearer_token(header), expected);
    }

    #[test]
    fn test_buyer_claims_become_buyer_actor() {
        let company = Uuid::new_v4();
        let c = claims("buyer", Some(company));
        let actor = actor_from_claims(&c).unwrap();
        assert_eq!(actor.role, ActorRole::Buyer);
        assert_eq!(actor.company_id, Some(company));
        assert_eq!(actor.user_id, c.sub);
    }

    #[test]
    fn test_admin_needs_no_company() {
        let actor = actor_from_claims(&claims("admin", None)).unwrap();
        assert!(actor.is_admin());
    }

    #[rstest]
    #[case("supplier", None)]
    #[case("auditor", Some(Uuid::nil()))]
    fn test_rejected_claims(#[case] role: &str, #[case] company: Option<Uuid>) {
        let err = actor_from_claims(&claims(role, company)).unwrap_err();
        assert_eq!(err.status_code(), 401);
    }
}
