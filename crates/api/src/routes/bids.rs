//! Bid routes: the status surface, evaluation, and the entry points into
//! negotiation and ordering.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde_json::Value;
use uuid::Uuid;

use procura_core::bid::{Bid, EvaluationInput};
use procura_core::negotiation::{MessageInput, Negotiation};
use procura_core::{TransitionRequest, TransitionView};

use super::purchase_orders::{OrderCreated, creation_response};
use super::{Metadata, OptionalJson};
use crate::AppState;
use crate::middleware::CurrentActor;
use crate::response::{ApiResponse, ApiResult, EntityData};

/// Creates the bid routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bids/{id}", get(get_bid))
        .route("/bids/{id}/transitions", get(bid_transitions))
        .route("/bids/{id}/transition", post(transition_bid))
        .route("/bids/{id}/submit", post(submit))
        .route("/bids/{id}/review", post(review))
        .route("/bids/{id}/award", post(award))
        .route("/bids/{id}/reject", post(reject))
        .route("/bids/{id}/withdraw", post(withdraw))
        .route("/bids/{id}/evaluation", post(evaluate))
        .route(
            "/bids/{id}/negotiation",
            get(negotiation_for_bid).post(start_negotiation),
        )
        .route("/bids/{id}/purchase-order", post(create_purchase_order))
}

async fn get_bid(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> ApiResult<EntityData<Bid>> {
    Ok(state.service.get_bid(id, &actor).await?.into())
}

async fn bid_transitions(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> ApiResult<TransitionView> {
    let view = state.service.bid_transitions(id, &actor).await?;
    Ok(ApiResponse::ok("Available transitions", view))
}

async fn transition_bid(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> ApiResult<EntityData<Bid>> {
    Ok(state.service.transition_bid(id, request, &actor).await?.into())
}

async fn move_bid(
    state: &AppState,
    actor: CurrentActor,
    id: Uuid,
    target: &str,
    metadata: Value,
) -> ApiResult<EntityData<Bid>> {
    let request = TransitionRequest::to(target, metadata);
    Ok(state.service.transition_bid(id, request, &actor.0).await?.into())
}

async fn submit(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<Uuid>,
    metadata: Metadata,
) -> ApiResult<EntityData<Bid>> {
    move_bid(&state, actor, id, "submitted", metadata.into_value()).await
}

async fn review(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<Uuid>,
    metadata: Metadata,
) -> ApiResult<EntityData<Bid>> {
    move_bid(&state, actor, id, "under_review", metadata.into_value()).await
}

async fn award(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<Uuid>,
    metadata: Metadata,
) -> ApiResult<EntityData<Bid>> {
    move_bid(&state, actor, id, "awarded", metadata.into_value()).await
}

/// Accepts `{"rejection_reason": ...}`.
async fn reject(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<Uuid>,
    metadata: Metadata,
) -> ApiResult<EntityData<Bid>> {
    move_bid(&state, actor, id, "rejected", metadata.into_value()).await
}

async fn withdraw(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<Uuid>,
    metadata: Metadata,
) -> ApiResult<EntityData<Bid>> {
    move_bid(&state, actor, id, "withdrawn", metadata.into_value()).await
}

async fn evaluate(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    Json(input): Json<EvaluationInput>,
) -> ApiResult<EntityData<Bid>> {
    Ok(state.service.evaluate_bid(id, input, &actor).await?.into())
}

async fn negotiation_for_bid(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Option<Negotiation>> {
    let negotiation = state.service.negotiation_for_bid(id, &actor).await?;
    let message = if negotiation.is_some() {
        "Negotiation found"
    } else {
        "No negotiation for this bid"
    };
    Ok(ApiResponse::ok(message, negotiation))
}

/// Opens a negotiation, optionally with a first message as the body.
async fn start_negotiation(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    OptionalJson(opening): OptionalJson<MessageInput>,
) -> ApiResult<EntityData<Negotiation>> {
    let outcome = state.service.start_negotiation(id, opening, &actor).await?;
    Ok(ApiResponse::from(outcome).with_status(StatusCode::CREATED))
}

async fn create_purchase_order(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderCreated> {
    let creation = state
        .service
        .create_purchase_order_from_bid(id, &actor)
        .await?;
    Ok(creation_response(creation))
}
