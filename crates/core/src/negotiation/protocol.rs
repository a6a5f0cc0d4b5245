//! Negotiation message protocol.
//!
//! Every message may resolve the pending counter-offer and move the
//! negotiation between `active` and `closed`. The pending offer pointer on
//! the negotiation is maintained here, never recomputed from the log.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use uuid::Uuid;

use super::types::{
    MessageInput, MessageType, Negotiation, NegotiationMessage, NegotiationStatus, OfferResolution,
    OfferStatus,
};
use crate::bid::Bid;
use crate::error::WorkflowError;
use crate::events::{DomainEvent, Recipient, StatusChanged};
use crate::machine::{Actor, ActorRole, StatusMachine, Transition, WorkflowState, non_blank};
use crate::rfq::Rfq;

type Machine = StatusMachine<NegotiationStatus>;

/// Result of posting a message.
#[derive(Debug, Clone)]
pub struct MessageOutcome {
    /// Negotiation after the message.
    pub negotiation: Negotiation,
    /// The recorded message.
    pub message: NegotiationMessage,
    /// Counter-offer settled by the message, if any.
    pub resolution: Option<OfferResolution>,
    /// Status change caused by the message, if any.
    pub transition: Option<Transition<NegotiationStatus>>,
    /// Notifications to send after commit.
    pub events: Vec<DomainEvent>,
}

/// Result of cancelling a negotiation.
#[derive(Debug, Clone)]
pub struct NegotiationChange {
    /// Negotiation after the change.
    pub negotiation: Negotiation,
    /// The applied transition.
    pub transition: Transition<NegotiationStatus>,
    /// Pending offer withdrawn by the cancellation, if any.
    pub resolution: Option<OfferResolution>,
    /// Notifications to send after commit.
    pub events: Vec<DomainEvent>,
}

/// Stateless negotiation protocol.
pub struct NegotiationProtocol;

impl NegotiationProtocol {
    /// Opens a negotiation on a bid.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` unless the actor is a buyer of the RFQ owner.
    /// - `PreconditionFailed` unless the bid is submitted, under review or
    ///   awarded.
    pub fn start(
        bid: &Bid,
        rfq: &Rfq,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Negotiation, WorkflowError> {
        if actor.role != ActorRole::Buyer || !actor.belongs_to(rfq.company_id) {
            return Err(WorkflowError::unauthorized(format!(
                "only buyers of the owning company may negotiate bid {}",
                bid.bid_number
            )));
        }
        if !bid.status.is_negotiable() {
            return Err(WorkflowError::precondition(format!(
                "bid {} is {} and cannot be negotiated",
                bid.bid_number, bid.status
            )));
        }

        Ok(Negotiation {
            id: Uuid::new_v4(),
            bid_id: bid.id,
            rfq_id: rfq.id,
            initiator_id: actor.user_id,
            supplier_user_id: bid.submitted_by,
            status: NegotiationStatus::Active,
            pending_offer_message_id: None,
            accepted_offer_message_id: None,
            last_activity_at: now,
            closed_at: None,
            purchase_order_id: None,
            created_at: now,
            version: 0,
        })
    }

    /// Refuses a second negotiation on the same bid.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` when one already exists.
    pub fn ensure_not_started(existing: Option<&Negotiation>) -> Result<(), WorkflowError> {
        match existing {
            Some(negotiation) => Err(WorkflowError::conflict(format!(
                "bid already has negotiation {}",
                negotiation.id
            ))),
            None => Ok(()),
        }
    }

    /// Checks read access: either participant, or an admin.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` otherwise.
    pub fn ensure_participant(negotiation: &Negotiation, actor: &Actor) -> Result<(), WorkflowError> {
        if actor.is_admin() || negotiation.is_participant(actor.user_id) {
            Ok(())
        } else {
            Err(WorkflowError::unauthorized(
                "only negotiation participants may access it",
            ))
        }
    }

    /// Validates a message payload on its own.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a counter-offer without `offer_data`, a
    /// text message with neither content nor withdrawal, or an
    /// `offer_status` other than `cancelled`.
    pub fn validate(input: &MessageInput) -> Result<(), WorkflowError> {
        match input.message_type {
            MessageType::CounterOffer => match &input.offer_data {
                Some(Value::Object(terms)) if !terms.is_empty() => Ok(()),
                _ => Err(WorkflowError::field(
                    "offer_data",
                    "is required for a counter offer",
                )),
            },
            MessageType::Text => match input.offer_status {
                Some(OfferStatus::Cancelled) => Ok(()),
                Some(_) => Err(WorkflowError::field(
                    "offer_status",
                    "only `cancelled` may be set on a text message",
                )),
                None if input.content.trim().is_empty() => {
                    Err(WorkflowError::field("content", "must not be empty"))
                }
                None => Ok(()),
            },
            MessageType::Acceptance | MessageType::Rejection => Ok(()),
        }
    }

    /// Records a message and applies its effect on the pending offer and the
    /// negotiation status.
    ///
    /// `pending` is the message `negotiation.pending_offer_message_id`
    /// points at, if any.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` for non-participants, for resolving your own offer,
    ///   or withdrawing someone else's.
    /// - `PreconditionFailed` on a cancelled negotiation.
    /// - `Validation` for a malformed payload.
    pub fn send_message(
        negotiation: &Negotiation,
        pending: Option<&NegotiationMessage>,
        input: MessageInput,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<MessageOutcome, WorkflowError> {
        if !negotiation.is_participant(actor.user_id) {
            return Err(WorkflowError::unauthorized(
                "only negotiation participants may send messages",
            ));
        }
        if negotiation.status == NegotiationStatus::Cancelled {
            return Err(WorkflowError::precondition(
                "negotiation is cancelled and accepts no messages",
            ));
        }
        Self::validate(&input)?;

        let pending = pending.filter(|p| Some(p.id) == negotiation.pending_offer_message_id);
        let message = NegotiationMessage {
            id: Uuid::new_v4(),
            negotiation_id: negotiation.id,
            sender_id: actor.user_id,
            message_type: input.message_type,
            content: input.content.trim().to_string(),
            offer_data: match input.message_type {
                MessageType::CounterOffer => input.offer_data,
                _ => None,
            },
            offer_status: None,
            created_at: now,
        };

        let mut updated = negotiation.clone();
        let mut resolution = None;
        let mut target = None;

        match message.message_type {
            MessageType::CounterOffer => {
                resolution = pending.map(|p| OfferResolution {
                    message_id: p.id,
                    status: OfferStatus::Cancelled,
                });
                updated.pending_offer_message_id = Some(message.id);
                if updated.status == NegotiationStatus::Closed {
                    target = Some(NegotiationStatus::Active);
                }
            }
            MessageType::Acceptance => {
                if let Some(offer) = pending {
                    ensure_counterpart(offer, actor)?;
                    resolution = Some(OfferResolution {
                        message_id: offer.id,
                        status: OfferStatus::Accepted,
                    });
                    updated.accepted_offer_message_id = Some(offer.id);
                    updated.pending_offer_message_id = None;
                }
                if updated.status == NegotiationStatus::Active {
                    target = Some(NegotiationStatus::Closed);
                }
            }
            MessageType::Rejection => {
                if let Some(offer) = pending {
                    ensure_counterpart(offer, actor)?;
                    resolution = Some(OfferResolution {
                        message_id: offer.id,
                        status: OfferStatus::Rejected,
                    });
                    updated.pending_offer_message_id = None;
                }
            }
            MessageType::Text => {
                if let (Some(OfferStatus::Cancelled), Some(offer)) = (input.offer_status, pending) {
                    if offer.sender_id != actor.user_id {
                        return Err(WorkflowError::unauthorized(
                            "only the author of an offer may withdraw it",
                        ));
                    }
                    resolution = Some(OfferResolution {
                        message_id: offer.id,
                        status: OfferStatus::Cancelled,
                    });
                    updated.pending_offer_message_id = None;
                }
            }
        }

        let transition = match target {
            Some(to) => {
                let transition = Machine::transition(
                    updated.status,
                    to,
                    actor,
                    json!({ "message_id": message.id }),
                    now,
                )?;
                updated.status = to;
                if to == NegotiationStatus::Closed {
                    updated.closed_at = Some(now);
                }
                Some(transition)
            }
            None => None,
        };
        updated.last_activity_at = now;

        let events = vec![DomainEvent::MessageSent {
            negotiation_id: updated.id,
            message_id: message.id,
            bid_id: updated.bid_id,
            message_type: message.message_type,
            sender_id: actor.user_id,
            recipient_id: updated.counterpart_of(actor.user_id),
            negotiation_status: updated.status.as_str().to_string(),
        }];

        Ok(MessageOutcome {
            negotiation: updated,
            message,
            resolution,
            transition,
            events,
        })
    }

    /// Cancels a negotiation, withdrawing any pending offer.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` for non-participants (admins may cancel).
    /// - `InvalidTransition` if already cancelled.
    pub fn cancel(
        negotiation: &Negotiation,
        reason: Option<&str>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<NegotiationChange, WorkflowError> {
        Self::ensure_participant(negotiation, actor)?;
        let reason = non_blank(reason);
        let metadata = reason
            .as_ref()
            .map_or(Value::Null, |r| json!({ "reason": r }));
        let transition = Machine::transition(
            negotiation.status,
            NegotiationStatus::Cancelled,
            actor,
            metadata,
            now,
        )?;

        let mut updated = negotiation.clone();
        let resolution = updated
            .pending_offer_message_id
            .take()
            .map(|message_id| OfferResolution {
                message_id,
                status: OfferStatus::Cancelled,
            });
        updated.status = NegotiationStatus::Cancelled;
        updated.last_activity_at = now;

        let recipients = if actor.is_admin() {
            vec![
                Recipient::User(updated.initiator_id),
                Recipient::User(updated.supplier_user_id),
            ]
        } else {
            vec![Recipient::User(updated.counterpart_of(actor.user_id))]
        };
        let events = vec![DomainEvent::StatusChanged(StatusChanged::from_transition(
            &transition,
            updated.id,
            &updated.id.to_string(),
            recipients,
        ))];

        Ok(NegotiationChange {
            negotiation: updated,
            transition,
            resolution,
            events,
        })
    }

    /// Available status changes for the actor. Negotiation status moves only
    /// through messages, so this lists at most `cancelled`.
    #[must_use]
    pub fn available_transitions(negotiation: &Negotiation, actor: &Actor) -> Vec<NegotiationStatus> {
        if Self::ensure_participant(negotiation, actor).is_err() {
            return Vec::new();
        }
        Machine::available_transitions(negotiation.status, actor)
            .into_iter()
            .filter(|s| *s == NegotiationStatus::Cancelled)
            .collect()
    }
}

fn ensure_counterpart(offer: &NegotiationMessage, actor: &Actor) -> Result<(), WorkflowError> {
    if offer.sender_id == actor.user_id {
        Err(WorkflowError::unauthorized(
            "an offer must be answered by the other participant",
        ))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bid::BidStatus;
    use crate::fixtures::{bid_on, buyer_of, rfq_in, supplier_of};
    use crate::rfq::RfqStatus;

    struct Thread {
        negotiation: Negotiation,
        buyer: Actor,
        supplier: Actor,
        log: Vec<NegotiationMessage>,
    }

    impl Thread {
        fn open() -> Self {
            let rfq = rfq_in(RfqStatus::BiddingClosed);
            let bid = bid_on(&rfq, Uuid::new_v4(), BidStatus::Submitted);
            let buyer = buyer_of(rfq.company_id);
            let supplier = Actor::supplier(bid.submitted_by, bid.supplier_company_id);
            let negotiation = NegotiationProtocol::start(&bid, &rfq, &buyer, Utc::now()).unwrap();
            Self {
                negotiation,
                buyer,
                supplier,
                log: Vec::new(),
            }
        }

        fn pending(&self) -> Option<&NegotiationMessage> {
            self.negotiation
                .pending_offer_message_id
                .and_then(|id| self.log.iter().find(|m| m.id == id))
        }

        fn send(&mut self, actor: Actor, input: MessageInput) -> Result<MessageOutcome, WorkflowError> {
            let outcome = NegotiationProtocol::send_message(
                &self.negotiation,
                self.pending(),
                input,
                &actor,
                Utc::now(),
            )?;
            if let Some(resolution) = outcome.resolution {
                if let Some(m) = self.log.iter_mut().find(|m| m.id == resolution.message_id) {
                    m.offer_status = Some(resolution.status);
                }
            }
            self.log.push(outcome.message.clone());
            self.negotiation = outcome.negotiation.clone();
            Ok(outcome)
        }
    }

    fn offer(amount: u32) -> MessageInput {
        MessageInput {
            message_type: MessageType::CounterOffer,
            content: "New terms".to_string(),
            offer_data: Some(json!({ "total_amount": amount.to_string() })),
            offer_status: None,
        }
    }

    fn plain(message_type: MessageType) -> MessageInput {
        MessageInput {
            message_type,
            content: String::new(),
            offer_data: None,
            offer_status: None,
        }
    }

    #[test]
    fn test_start_requires_owning_buyer() {
        let rfq = rfq_in(RfqStatus::BiddingClosed);
        let bid = bid_on(&rfq, Uuid::new_v4(), BidStatus::Submitted);
        assert!(matches!(
            NegotiationProtocol::start(&bid, &rfq, &buyer_of(Uuid::new_v4()), Utc::now()),
            Err(WorkflowError::Unauthorized(_))
        ));
        assert!(matches!(
            NegotiationProtocol::start(&bid, &rfq, &supplier_of(bid.supplier_company_id), Utc::now()),
            Err(WorkflowError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_start_requires_negotiable_bid() {
        let rfq = rfq_in(RfqStatus::BiddingOpen);
        let bid = bid_on(&rfq, Uuid::new_v4(), BidStatus::Draft);
        assert!(matches!(
            NegotiationProtocol::start(&bid, &rfq, &buyer_of(rfq.company_id), Utc::now()),
            Err(WorkflowError::PreconditionFailed(_))
        ));
    }

    #[test]
    fn test_second_negotiation_conflicts() {
        let thread = Thread::open();
        assert!(matches!(
            NegotiationProtocol::ensure_not_started(Some(&thread.negotiation)),
            Err(WorkflowError::Conflict(_))
        ));
    }

    #[test]
    fn test_counter_offer_supersedes_pending() {
        let mut t = Thread::open();
        let first = t.send(t.buyer, offer(100)).unwrap();
        let second = t.send(t.supplier, offer(90)).unwrap();

        assert_eq!(
            second.resolution,
            Some(OfferResolution {
                message_id: first.message.id,
                status: OfferStatus::Cancelled
            })
        );
        assert_eq!(t.negotiation.pending_offer_message_id, Some(second.message.id));
        let pending = t.log.iter().filter(|m| {
            m.message_type == MessageType::CounterOffer && m.offer_status.is_none()
        });
        assert_eq!(pending.count(), 1);
    }

    #[test]
    fn test_acceptance_closes_and_records_offer() {
        let mut t = Thread::open();
        let o = t.send(t.buyer, offer(100)).unwrap();
        let accepted = t.send(t.supplier, plain(MessageType::Acceptance)).unwrap();

        assert_eq!(t.negotiation.status, NegotiationStatus::Closed);
        assert_eq!(t.negotiation.accepted_offer_message_id, Some(o.message.id));
        assert!(t.negotiation.pending_offer_message_id.is_none());
        assert!(t.negotiation.closed_at.is_some());
        assert_eq!(accepted.transition.unwrap().to, NegotiationStatus::Closed);
    }

    #[test]
    fn test_acceptance_without_offer_still_closes() {
        let mut t = Thread::open();
        let outcome = t.send(t.supplier, plain(MessageType::Acceptance)).unwrap();
        assert!(outcome.resolution.is_none());
        assert_eq!(t.negotiation.status, NegotiationStatus::Closed);
        assert!(t.negotiation.accepted_offer_message_id.is_none());
    }

    #[test]
    fn test_rejection_keeps_status() {
        let mut t = Thread::open();
        t.send(t.buyer, offer(100)).unwrap();
        let outcome = t.send(t.supplier, plain(MessageType::Rejection)).unwrap();
        assert_eq!(outcome.resolution.unwrap().status, OfferStatus::Rejected);
        assert_eq!(t.negotiation.status, NegotiationStatus::Active);
        assert!(t.negotiation.pending_offer_message_id.is_none());
    }

    #[test]
    fn test_rejection_without_offer_is_noop() {
        let mut t = Thread::open();
        let outcome = t.send(t.buyer, plain(MessageType::Rejection)).unwrap();
        assert!(outcome.resolution.is_none());
        assert!(outcome.transition.is_none());
    }

    #[test]
    fn test_cannot_accept_own_offer() {
        let mut t = Thread::open();
        t.send(t.buyer, offer(100)).unwrap();
        assert!(matches!(
            t.send(t.buyer, plain(MessageType::Acceptance)),
            Err(WorkflowError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_withdrawal_only_by_author() {
        let mut t = Thread::open();
        t.send(t.buyer, offer(100)).unwrap();
        let withdraw = MessageInput {
            message_type: MessageType::Text,
            content: "Withdrawn".to_string(),
            offer_data: None,
            offer_status: Some(OfferStatus::Cancelled),
        };
        assert!(matches!(
            t.send(t.supplier, withdraw.clone()),
            Err(WorkflowError::Unauthorized(_))
        ));
        let outcome = t.send(t.buyer, withdraw).unwrap();
        assert_eq!(outcome.resolution.unwrap().status, OfferStatus::Cancelled);
        assert!(t.negotiation.pending_offer_message_id.is_none());
    }

    #[test]
    fn test_counter_offer_reopens_closed() {
        let mut t = Thread::open();
        t.send(t.buyer, offer(100)).unwrap();
        t.send(t.supplier, plain(MessageType::Acceptance)).unwrap();
        let reopened = t.send(t.supplier, offer(95)).unwrap();
        assert_eq!(t.negotiation.status, NegotiationStatus::Active);
        assert_eq!(reopened.transition.unwrap().from, NegotiationStatus::Closed);
    }

    #[test]
    fn test_counter_offer_requires_terms() {
        let mut t = Thread::open();
        let err = t.send(t.buyer, plain(MessageType::CounterOffer)).unwrap_err();
        assert_eq!(err.field_errors()[0].field, "offer_data");
    }

    #[test]
    fn test_outsider_cannot_send() {
        let mut t = Thread::open();
        let outsider = Actor::buyer(Uuid::new_v4(), Uuid::new_v4());
        assert!(matches!(
            t.send(outsider, offer(1)),
            Err(WorkflowError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_cancelled_refuses_messages() {
        let mut t = Thread::open();
        t.send(t.buyer, offer(100)).unwrap();
        let change =
            NegotiationProtocol::cancel(&t.negotiation, Some("No deal"), &t.supplier, Utc::now())
                .unwrap();
        assert_eq!(change.resolution.unwrap().status, OfferStatus::Cancelled);
        t.negotiation = change.negotiation;

        assert!(matches!(
            t.send(t.buyer, offer(80)),
            Err(WorkflowError::PreconditionFailed(_))
        ));
    }

    #[test]
    fn test_message_event_targets_counterpart() {
        let mut t = Thread::open();
        let outcome = t.send(t.buyer, offer(100)).unwrap();
        let DomainEvent::MessageSent { recipient_id, .. } = &outcome.events[0] else {
            panic!("expected message event");
        };
        assert_eq!(*recipient_id, t.supplier.user_id);
    }
}
