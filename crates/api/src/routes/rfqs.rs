//! RFQ routes: drafting, the status surface and the bids placed on an RFQ.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use procura_core::bid::{Bid, BidInput};
use procura_core::machine::StatusHistoryEntry;
use procura_core::rfq::{Rfq, RfqInput};
use procura_core::{TransitionRequest, TransitionView};

use super::Metadata;
use crate::AppState;
use crate::middleware::CurrentActor;
use crate::response::{ApiResponse, ApiResult, EntityData};

/// Creates the RFQ routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rfqs", post(create_rfq))
        .route("/rfqs/{id}", get(get_rfq).patch(update_rfq))
        .route("/rfqs/{id}/transitions", get(rfq_transitions))
        .route("/rfqs/{id}/transition", post(transition_rfq))
        .route("/rfqs/{id}/publish", post(publish))
        .route("/rfqs/{id}/open-bidding", post(open_bidding))
        .route("/rfqs/{id}/close-bidding", post(close_bidding))
        .route("/rfqs/{id}/award", post(award))
        .route("/rfqs/{id}/cancel", post(cancel))
        .route("/rfqs/{id}/history", get(rfq_history))
        .route("/rfqs/{id}/bids", get(list_bids).post(save_bid))
}

/// Request body for saving a supplier's bid.
#[derive(Debug, Deserialize)]
pub struct SaveBidRequest {
    /// Bid content.
    #[serde(flatten)]
    pub bid: BidInput,
    /// Submit right away instead of keeping a draft.
    #[serde(default)]
    pub submit: bool,
}

async fn create_rfq(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(input): Json<RfqInput>,
) -> ApiResult<EntityData<Rfq>> {
    let outcome = state.service.create_rfq(input, &actor).await?;
    Ok(ApiResponse::from(outcome).with_status(StatusCode::CREATED))
}

async fn get_rfq(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> ApiResult<EntityData<Rfq>> {
    Ok(state.service.get_rfq(id, &actor).await?.into())
}

async fn update_rfq(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    Json(input): Json<RfqInput>,
) -> ApiResult<EntityData<Rfq>> {
    Ok(state.service.update_rfq(id, input, &actor).await?.into())
}

async fn rfq_transitions(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> ApiResult<TransitionView> {
    let view = state.service.rfq_transitions(id, &actor).await?;
    Ok(ApiResponse::ok("Available transitions", view))
}

async fn transition_rfq(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> ApiResult<EntityData<Rfq>> {
    Ok(state.service.transition_rfq(id, request, &actor).await?.into())
}

async fn move_rfq(
    state: &AppState,
    actor: CurrentActor,
    id: Uuid,
    target: &str,
    metadata: Value,
) -> ApiResult<EntityData<Rfq>> {
    let request = TransitionRequest::to(target, metadata);
    Ok(state.service.transition_rfq(id, request, &actor.0).await?.into())
}

async fn publish(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<Uuid>,
    metadata: Metadata,
) -> ApiResult<EntityData<Rfq>> {
    move_rfq(&state, actor, id, "published", metadata.into_value()).await
}

async fn open_bidding(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<Uuid>,
    metadata: Metadata,
) -> ApiResult<EntityData<Rfq>> {
    move_rfq(&state, actor, id, "bidding_open", metadata.into_value()).await
}

async fn close_bidding(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<Uuid>,
    metadata: Metadata,
) -> ApiResult<EntityData<Rfq>> {
    move_rfq(&state, actor, id, "bidding_closed", metadata.into_value()).await
}

/// Expects `{"awarded_supplier_id": ...}`.
async fn award(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<Uuid>,
    metadata: Metadata,
) -> ApiResult<EntityData<Rfq>> {
    move_rfq(&state, actor, id, "awarded", metadata.into_value()).await
}

async fn cancel(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<Uuid>,
    metadata: Metadata,
) -> ApiResult<EntityData<Rfq>> {
    move_rfq(&state, actor, id, "cancelled", metadata.into_value()).await
}

async fn rfq_history(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<StatusHistoryEntry>> {
    let history = state.service.rfq_history(id, &actor).await?;
    Ok(ApiResponse::ok(format!("{} status changes", history.len()), history))
}

async fn list_bids(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<Bid>> {
    let bids = state.service.list_bids(id, &actor).await?;
    Ok(ApiResponse::ok(format!("{} bids", bids.len()), bids))
}

async fn save_bid(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    Json(request): Json<SaveBidRequest>,
) -> ApiResult<EntityData<Bid>> {
    Ok(state
        .service
        .save_bid(id, request.bid, request.submit, &actor)
        .await?
        .into())
}
