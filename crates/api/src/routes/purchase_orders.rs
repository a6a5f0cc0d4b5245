//! Purchase order routes: the fulfilment surface and modification requests.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use procura_core::machine::StatusHistoryEntry;
use procura_core::purchase_order::{ModificationInput, PurchaseOrder, PurchaseOrderModification};
use procura_core::service::PurchaseOrderCreation;
use procura_core::{TransitionRequest, TransitionView};

use super::{Metadata, OptionalJson};
use crate::AppState;
use crate::middleware::CurrentActor;
use crate::response::{ApiResponse, ApiResult, EntityData};

/// Creates the purchase order routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/purchase-orders/{id}", get(get_purchase_order))
        .route("/purchase-orders/{id}/transitions", get(purchase_order_transitions))
        .route("/purchase-orders/{id}/transition", post(transition_purchase_order))
        .route("/purchase-orders/{id}/approve", post(approve))
        .route("/purchase-orders/{id}/reject", post(reject))
        .route("/purchase-orders/{id}/send", post(send))
        .route("/purchase-orders/{id}/acknowledge", post(acknowledge))
        .route("/purchase-orders/{id}/start", post(start))
        .route("/purchase-orders/{id}/confirm-delivery", post(confirm_delivery))
        .route("/purchase-orders/{id}/complete", post(complete))
        .route("/purchase-orders/{id}/cancel", post(cancel))
        .route("/purchase-orders/{id}/history", get(purchase_order_history))
        .route(
            "/purchase-orders/{id}/modifications",
            get(list_modifications).post(request_modification),
        )
        .route(
            "/purchase-orders/{id}/modifications/{modification_id}/approve",
            post(approve_modification),
        )
        .route(
            "/purchase-orders/{id}/modifications/{modification_id}/reject",
            post(reject_modification),
        )
}

/// Payload returned when an order is derived from a bid or negotiation.
#[derive(Debug, Serialize)]
pub struct OrderCreated {
    /// The order.
    pub entity: PurchaseOrder,
    /// Statuses the caller may move it to next.
    pub available_transitions: Vec<String>,
    /// False when the order already existed.
    pub created: bool,
}

/// 201 for a new order, 200 when an existing one is returned.
pub(crate) fn creation_response(creation: PurchaseOrderCreation) -> ApiResponse<OrderCreated> {
    let PurchaseOrderCreation { outcome, created } = creation;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    ApiResponse::ok(
        outcome.message,
        OrderCreated {
            entity: outcome.entity,
            available_transitions: outcome.available_transitions,
            created,
        },
    )
    .with_status(status)
}

/// Body for reviewing a modification.
#[derive(Debug, Default, Deserialize)]
pub struct ReviewRequest {
    /// Reviewer notes.
    #[serde(default)]
    pub notes: Option<String>,
}

async fn get_purchase_order(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> ApiResult<EntityData<PurchaseOrder>> {
    Ok(state.service.get_purchase_order(id, &actor).await?.into())
}

async fn purchase_order_transitions(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> ApiResult<TransitionView> {
    let view = state.service.purchase_order_transitions(id, &actor).await?;
    Ok(ApiResponse::ok("Available transitions", view))
}

async fn transition_purchase_order(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> ApiResult<EntityData<PurchaseOrder>> {
    Ok(state
        .service
        .transition_purchase_order(id, request, &actor)
        .await?
        .into())
}

async fn move_order(
    state: &AppState,
    actor: CurrentActor,
    id: Uuid,
    target: &str,
    metadata: Value,
) -> ApiResult<EntityData<PurchaseOrder>> {
    let request = TransitionRequest::to(target, metadata);
    Ok(state
        .service
        .transition_purchase_order(id, request, &actor.0)
        .await?
        .into())
}

/// Accepts `{"approved_amount": ...}`.
async fn approve(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<Uuid>,
    metadata: Metadata,
) -> ApiResult<EntityData<PurchaseOrder>> {
    move_order(&state, actor, id, "approved", metadata.into_value()).await
}

async fn reject(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<Uuid>,
    metadata: Metadata,
) -> ApiResult<EntityData<PurchaseOrder>> {
    move_order(&state, actor, id, "rejected", metadata.into_value()).await
}

async fn send(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<Uuid>,
    metadata: Metadata,
) -> ApiResult<EntityData<PurchaseOrder>> {
    move_order(&state, actor, id, "sent_to_supplier", metadata.into_value()).await
}

async fn acknowledge(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<Uuid>,
    metadata: Metadata,
) -> ApiResult<EntityData<PurchaseOrder>> {
    move_order(&state, actor, id, "acknowledged", metadata.into_value()).await
}

async fn start(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<Uuid>,
    metadata: Metadata,
) -> ApiResult<EntityData<PurchaseOrder>> {
    move_order(&state, actor, id, "in_progress", metadata.into_value()).await
}

/// Accepts delivery evidence: `photos`, `documents` and `notes`.
async fn confirm_delivery(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<Uuid>,
    metadata: Metadata,
) -> ApiResult<EntityData<PurchaseOrder>> {
    move_order(&state, actor, id, "delivered", metadata.into_value()).await
}

async fn complete(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<Uuid>,
    metadata: Metadata,
) -> ApiResult<EntityData<PurchaseOrder>> {
    move_order(&state, actor, id, "completed", metadata.into_value()).await
}

async fn cancel(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<Uuid>,
    metadata: Metadata,
) -> ApiResult<EntityData<PurchaseOrder>> {
    move_order(&state, actor, id, "cancelled", metadata.into_value()).await
}

async fn purchase_order_history(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<StatusHistoryEntry>> {
    let history = state.service.purchase_order_history(id, &actor).await?;
    Ok(ApiResponse::ok(format!("{} status changes", history.len()), history))
}

async fn list_modifications(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<PurchaseOrderModification>> {
    let modifications = state.service.list_modifications(id, &actor).await?;
    Ok(ApiResponse::ok(
        format!("{} modifications", modifications.len()),
        modifications,
    ))
}

async fn request_modification(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    Json(input): Json<ModificationInput>,
) -> ApiResult<PurchaseOrderModification> {
    let modification = state.service.request_modification(id, input, &actor).await?;
    let message = format!(
        "Modification of {} is {}",
        modification.field,
        modification.status.as_str()
    );
    Ok(ApiResponse::created(message, modification))
}

async fn approve_modification(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path((id, modification_id)): Path<(Uuid, Uuid)>,
    OptionalJson(review): OptionalJson<ReviewRequest>,
) -> ApiResult<PurchaseOrderModification> {
    let notes = review.unwrap_or_default().notes;
    let modification = state
        .service
        .approve_modification(id, modification_id, notes, &actor)
        .await?;
    Ok(ApiResponse::ok("Modification approved", modification))
}

async fn reject_modification(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path((id, modification_id)): Path<(Uuid, Uuid)>,
    OptionalJson(review): OptionalJson<ReviewRequest>,
) -> ApiResult<PurchaseOrderModification> {
    let notes = review.unwrap_or_default().notes;
    let modification = state
        .service
        .reject_modification(id, modification_id, notes, &actor)
        .await?;
    Ok(ApiResponse::ok("Modification rejected", modification))
}
