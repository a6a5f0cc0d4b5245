//! Negotiation routes: the message thread, its live event stream, and the
//! order derived from an accepted offer.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
};
use futures::stream::Stream;
use serde::Deserialize;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use procura_core::negotiation::{MessageInput, Negotiation, NegotiationMessage};
use procura_core::notify::BroadcastMessage;
use procura_core::service::PostedMessage;
use procura_core::{TransitionRequest, TransitionView};

use super::OptionalJson;
use super::purchase_orders::{OrderCreated, creation_response};
use crate::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentActor;
use crate::response::{ApiResponse, ApiResult, EntityData};

/// Creates the negotiation routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/negotiations/{id}", get(get_negotiation))
        .route(
            "/negotiations/{id}/messages",
            get(list_messages).post(send_message),
        )
        .route("/negotiations/{id}/accept", post(accept_offer))
        .route("/negotiations/{id}/cancel", post(cancel_negotiation))
        .route("/negotiations/{id}/transitions", get(negotiation_transitions))
        .route("/negotiations/{id}/transition", post(transition_negotiation))
        .route("/negotiations/{id}/events", get(negotiation_events))
        .route("/negotiations/{id}/purchase-order", post(create_purchase_order))
}

/// Body for accepting the pending offer.
#[derive(Debug, Default, Deserialize)]
pub struct AcceptRequest {
    /// Optional note sent with the acceptance.
    #[serde(default)]
    pub content: Option<String>,
}

/// Body for cancelling a negotiation.
#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    /// Why the negotiation is abandoned.
    #[serde(default)]
    pub reason: Option<String>,
}

async fn get_negotiation(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> ApiResult<EntityData<Negotiation>> {
    Ok(state.service.get_negotiation(id, &actor).await?.into())
}

async fn list_messages(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<NegotiationMessage>> {
    let messages = state.service.list_messages(id, &actor).await?;
    Ok(ApiResponse::ok(format!("{} messages", messages.len()), messages))
}

async fn send_message(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    Json(input): Json<MessageInput>,
) -> ApiResult<EntityData<PostedMessage>> {
    let outcome = state.service.send_message(id, input, &actor).await?;
    Ok(ApiResponse::from(outcome).with_status(StatusCode::CREATED))
}

async fn accept_offer(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    OptionalJson(body): OptionalJson<AcceptRequest>,
) -> ApiResult<EntityData<PostedMessage>> {
    let content = body.unwrap_or_default().content;
    Ok(state.service.accept_offer(id, content, &actor).await?.into())
}

async fn cancel_negotiation(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    OptionalJson(body): OptionalJson<CancelRequest>,
) -> ApiResult<EntityData<Negotiation>> {
    let reason = body.unwrap_or_default().reason;
    Ok(state
        .service
        .cancel_negotiation(id, reason, &actor)
        .await?
        .into())
}

async fn negotiation_transitions(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> ApiResult<TransitionView> {
    let view = state.service.negotiation_transitions(id, &actor).await?;
    Ok(ApiResponse::ok("Available transitions", view))
}

async fn transition_negotiation(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> ApiResult<EntityData<Negotiation>> {
    Ok(state
        .service
        .transition_negotiation(id, request, &actor)
        .await?
        .into())
}

fn to_event(message: &BroadcastMessage) -> Option<Event> {
    match serde_json::to_string(&message.payload) {
        Ok(data) => Some(Event::default().event(&message.event).data(data)),
        Err(e) => {
            tracing::warn!(error = %e, event = %message.event, "dropping unserializable event");
            None
        }
    }
}

/// Live stream of messages and status changes for one negotiation.
async fn negotiation_events(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    // Participants only.
    state.service.get_negotiation(id, &actor).await?;

    let channel = BroadcastMessage::negotiation_channel(id);
    let rx = state.broadcaster.subscribe(&channel).await;
    tracing::info!(negotiation_id = %id, user_id = %actor.user_id, "negotiation stream opened");

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(message) => to_event(&message).map(Ok),
        Err(e) => {
            tracing::debug!(error = %e, "subscriber lagged");
            None
        }
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}

async fn create_purchase_order(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderCreated> {
    let creation = state
        .service
        .create_purchase_order_from_negotiation(id, &actor)
        .await?;
    Ok(creation_response(creation))
}
