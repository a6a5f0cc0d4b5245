//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST routes for RFQs, bids, negotiations and purchase orders
//! - Authentication middleware turning bearer tokens into workflow actors
//! - The uniform response envelope and error mapping
//! - Live negotiation events over server-sent events
//! - Email and broadcast adapters for the core notification ports

pub mod error;
pub mod middleware;
pub mod notify;
pub mod response;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use procura_core::ProcurementService;
use procura_db::PgStore;
use procura_shared::JwtService;

use crate::notify::SseBroadcaster;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Workflow service over the Postgres store.
    pub service: ProcurementService<PgStore>,
    /// JWT service for token validation.
    pub jwt_service: Arc<JwtService>,
    /// Live negotiation channels.
    pub broadcaster: Arc<SseBroadcaster>,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes_with_state(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
