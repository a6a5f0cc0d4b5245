//! Negotiation operations.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::{
    Change, ChangeSet, Outcome, ProcurementService, TransitionRequest, TransitionView, WorkflowStore,
    found, names, parse_target, view,
};
use crate::bid::BidLifecycle;
use crate::error::WorkflowError;
use crate::machine::{Actor, EntityKind, StatusMachine};
use crate::negotiation::{
    MessageInput, MessageOutcome, MessageType, Negotiation, NegotiationChange, NegotiationMessage,
    NegotiationProtocol, NegotiationStatus,
};

/// A message together with the negotiation it changed.
#[derive(Debug, Clone, Serialize)]
pub struct PostedMessage {
    /// Negotiation after the message.
    pub negotiation: Negotiation,
    /// The recorded message.
    pub message: NegotiationMessage,
}

impl<S: WorkflowStore> ProcurementService<S> {
    pub(super) async fn load_negotiation(&self, id: Uuid) -> Result<Negotiation, WorkflowError> {
        found(EntityKind::Negotiation, id, self.store.find_negotiation(id).await?)
    }

    fn negotiation_outcome<T>(
        entity: T,
        negotiation: &Negotiation,
        actor: &Actor,
        message: String,
    ) -> Outcome<T> {
        Outcome {
            entity,
            available_transitions: names(NegotiationProtocol::available_transitions(negotiation, actor)),
            message,
        }
    }

    /// Opens a negotiation on a bid, optionally with a first message.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` unless the actor is a buyer of the RFQ owner.
    /// - `PreconditionFailed` when the bid cannot be negotiated.
    /// - `Conflict` when the bid already has a negotiation.
    pub async fn start_negotiation(
        &self,
        bid_id: Uuid,
        opening: Option<MessageInput>,
        actor: &Actor,
    ) -> Result<Outcome<Negotiation>, WorkflowError> {
        let bid = self.load_bid(bid_id).await?;
        let rfq = self.load_rfq(bid.rfq_id).await?;
        let now = Utc::now();
        let negotiation = NegotiationProtocol::start(&bid, &rfq, actor, now)?;
        NegotiationProtocol::ensure_not_started(
            self.store.find_negotiation_by_bid(bid.id).await?.as_ref(),
        )?;

        let mut changes = ChangeSet::default();
        let (negotiation, events) = match opening {
            Some(input) => {
                let outcome = NegotiationProtocol::send_message(&negotiation, None, input, actor, now)?;
                changes.messages.push(outcome.message);
                (outcome.negotiation, outcome.events)
            }
            None => (negotiation, Vec::new()),
        };
        // The negotiation row must exist before its messages.
        changes.negotiations.push(Change::Insert(negotiation.clone()));
        self.commit(changes, events).await?;

        tracing::info!(negotiation_id = %negotiation.id, bid_id = %bid.id, "negotiation started");
        let message = format!("Negotiation started on bid {}", bid.bid_number);
        Ok(Self::negotiation_outcome(
            negotiation.clone(),
            &negotiation,
            actor,
            message,
        ))
    }

    /// Loads a negotiation the actor takes part in.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Unauthorized`.
    pub async fn get_negotiation(
        &self,
        id: Uuid,
        actor: &Actor,
    ) -> Result<Outcome<Negotiation>, WorkflowError> {
        let negotiation = self.load_negotiation(id).await?;
        NegotiationProtocol::ensure_participant(&negotiation, actor)?;
        let message = format!("Negotiation is {}", negotiation.status);
        Ok(Self::negotiation_outcome(
            negotiation.clone(),
            &negotiation,
            actor,
            message,
        ))
    }

    /// Messages of a negotiation, oldest first.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Unauthorized`.
    pub async fn list_messages(
        &self,
        id: Uuid,
        actor: &Actor,
    ) -> Result<Vec<NegotiationMessage>, WorkflowError> {
        let negotiation = self.load_negotiation(id).await?;
        NegotiationProtocol::ensure_participant(&negotiation, actor)?;
        self.store.list_messages(negotiation.id).await
    }

    /// Posts a message and settles the pending offer it answers.
    ///
    /// # Errors
    ///
    /// See [`NegotiationProtocol::send_message`]; `Conflict` on a concurrent
    /// message.
    pub async fn send_message(
        &self,
        id: Uuid,
        input: MessageInput,
        actor: &Actor,
    ) -> Result<Outcome<PostedMessage>, WorkflowError> {
        let negotiation = self.load_negotiation(id).await?;
        let pending = match negotiation.pending_offer_message_id {
            Some(message_id) => self.store.find_message(message_id).await?,
            None => None,
        };

        let MessageOutcome {
            negotiation: updated,
            message,
            resolution,
            transition,
            events,
        } = NegotiationProtocol::send_message(&negotiation, pending.as_ref(), input, actor, Utc::now())?;

        let mut changes = ChangeSet::default();
        let updated = changes.update_negotiation(updated);
        changes.messages.push(message.clone());
        changes.offer_resolutions.extend(resolution);
        self.commit(changes, events).await?;

        if let Some(transition) = transition {
            tracing::info!(
                negotiation_id = %updated.id,
                from = %transition.from,
                to = %transition.to,
                "negotiation transitioned"
            );
        }
        let summary = format!("{} sent", message.message_type.as_str().replace('_', " "));
        Ok(Self::negotiation_outcome(
            PostedMessage {
                negotiation: updated.clone(),
                message,
            },
            &updated,
            actor,
            summary,
        ))
    }

    /// Accepts the pending offer with an acceptance message.
    ///
    /// # Errors
    ///
    /// See [`ProcurementService::send_message`].
    pub async fn accept_offer(
        &self,
        id: Uuid,
        content: Option<String>,
        actor: &Actor,
    ) -> Result<Outcome<PostedMessage>, WorkflowError> {
        let input = MessageInput {
            message_type: MessageType::Acceptance,
            content: content.unwrap_or_else(|| "Offer accepted".to_string()),
            offer_data: None,
            offer_status: None,
        };
        self.send_message(id, input, actor).await
    }

    /// Cancels a negotiation, withdrawing any pending offer.
    ///
    /// # Errors
    ///
    /// See [`NegotiationProtocol::cancel`].
    pub async fn cancel_negotiation(
        &self,
        id: Uuid,
        reason: Option<String>,
        actor: &Actor,
    ) -> Result<Outcome<Negotiation>, WorkflowError> {
        let negotiation = self.load_negotiation(id).await?;
        let change = NegotiationProtocol::cancel(&negotiation, reason.as_deref(), actor, Utc::now())?;
        self.apply_negotiation_change(change, actor).await
    }

    /// Current negotiation status and the statuses the actor may move it to.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Unauthorized`.
    pub async fn negotiation_transitions(
        &self,
        id: Uuid,
        actor: &Actor,
    ) -> Result<TransitionView, WorkflowError> {
        let negotiation = self.load_negotiation(id).await?;
        NegotiationProtocol::ensure_participant(&negotiation, actor)?;
        Ok(view(
            negotiation.status,
            NegotiationProtocol::available_transitions(&negotiation, actor),
        ))
    }

    /// Generic transition surface for negotiations. Closing and reopening
    /// happen through messages, so only cancellation and admin overrides
    /// are accepted here.
    ///
    /// # Errors
    ///
    /// `PreconditionFailed` for targets reached through messages, otherwise
    /// as [`ProcurementService::cancel_negotiation`].
    pub async fn transition_negotiation(
        &self,
        id: Uuid,
        request: TransitionRequest,
        actor: &Actor,
    ) -> Result<Outcome<Negotiation>, WorkflowError> {
        let target: NegotiationStatus = parse_target(&request.target_status)?;
        let negotiation = self.load_negotiation(id).await?;
        let now = Utc::now();

        let change = if request.force {
            let transition = StatusMachine::force_transition(
                negotiation.status,
                target,
                actor,
                request.metadata.clone(),
                now,
            )?;
            let mut updated = negotiation.clone();
            updated.status = target;
            updated.last_activity_at = now;
            if target == NegotiationStatus::Closed {
                updated.closed_at.get_or_insert(now);
            }
            NegotiationChange {
                negotiation: updated,
                transition,
                resolution: None,
                events: Vec::new(),
            }
        } else if target == NegotiationStatus::Cancelled {
            let reason = request
                .metadata
                .get("reason")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string);
            NegotiationProtocol::cancel(&negotiation, reason.as_deref(), actor, now)?
        } else {
            NegotiationProtocol::ensure_participant(&negotiation, actor)?;
            StatusMachine::check(negotiation.status, target, actor)?;
            return Err(WorkflowError::precondition(format!(
                "negotiations become {target} through messages"
            )));
        };
        self.apply_negotiation_change(change, actor).await
    }

    async fn apply_negotiation_change(
        &self,
        change: NegotiationChange,
        actor: &Actor,
    ) -> Result<Outcome<Negotiation>, WorkflowError> {
        let NegotiationChange {
            negotiation,
            transition,
            resolution,
            events,
        } = change;
        let mut changes = ChangeSet::default();
        let negotiation = changes.update_negotiation(negotiation);
        changes.offer_resolutions.extend(resolution);
        self.commit(changes, events).await?;

        tracing::info!(
            negotiation_id = %negotiation.id,
            from = %transition.from,
            to = %transition.to,
            forced = transition.forced,
            "negotiation transitioned"
        );
        let message = format!("Negotiation moved to {}", negotiation.status);
        Ok(Self::negotiation_outcome(
            negotiation.clone(),
            &negotiation,
            actor,
            message,
        ))
    }

    /// Checks that the actor may read a bid's negotiation, for callers that
    /// only have the bid.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Unauthorized`.
    pub async fn negotiation_for_bid(
        &self,
        bid_id: Uuid,
        actor: &Actor,
    ) -> Result<Option<Negotiation>, WorkflowError> {
        let bid = self.load_bid(bid_id).await?;
        let rfq = self.load_rfq(bid.rfq_id).await?;
        BidLifecycle::ensure_visible(&bid, &rfq, actor)?;
        let negotiation = self.store.find_negotiation_by_bid(bid.id).await?;
        Ok(negotiation.filter(|n| NegotiationProtocol::ensure_participant(n, actor).is_ok()))
    }
}
