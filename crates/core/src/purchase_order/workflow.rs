//! Purchase order lifecycle rules.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use uuid::Uuid;

use super::types::{
    AttachmentRef, DeliveryEvidence, PurchaseOrder, PurchaseOrderItem, PurchaseOrderStatus,
};
use crate::bid::{Bid, BidStatus, MAX_AMOUNT};
use crate::error::{FieldError, WorkflowError};
use crate::events::{DomainEvent, Recipient, StatusChanged};
use crate::machine::{
    Actor, ActorRole, EntityKind, StatusHistoryEntry, StatusMachine, Transition, WorkflowState,
    non_blank, read_metadata,
};
use crate::negotiation::{Negotiation, NegotiationMessage, NegotiationStatus};
use crate::policy::WorkflowPolicy;
use crate::rfq::Rfq;

type Machine = StatusMachine<PurchaseOrderStatus>;

/// Maximum delivery photos.
pub const MAX_DELIVERY_PHOTOS: usize = 5;
/// Maximum delivery documents.
pub const MAX_DELIVERY_DOCUMENTS: usize = 3;

#[derive(Debug, Default, Deserialize)]
struct PurchaseOrderTransitionMetadata {
    approved_amount: Option<Decimal>,
    notes: Option<String>,
    reason: Option<String>,
    rejection_reason: Option<String>,
    cancellation_reason: Option<String>,
    #[serde(default)]
    photos: Vec<AttachmentRef>,
    #[serde(default)]
    documents: Vec<AttachmentRef>,
}

impl PurchaseOrderTransitionMetadata {
    fn reason_for(&self, specific: Option<&String>) -> Option<String> {
        non_blank(specific.or(self.reason.as_ref()).map(String::as_str))
    }
}

/// Inputs for deriving a purchase order.
#[derive(Debug, Clone, Copy)]
pub struct Derivation<'a> {
    /// Awarded or negotiated bid.
    pub bid: &'a Bid,
    /// RFQ of the bid.
    pub rfq: &'a Rfq,
    /// Negotiation on the bid, if one exists; backfilled with the PO id.
    pub negotiation: Option<&'a Negotiation>,
    /// Accepted counter-offer whose terms override the bid.
    pub accepted_offer: Option<&'a NegotiationMessage>,
}

/// A newly derived purchase order.
#[derive(Debug, Clone)]
pub struct DerivedPurchaseOrder {
    /// The new order.
    pub purchase_order: PurchaseOrder,
    /// Creation history row.
    pub history: StatusHistoryEntry,
    /// Negotiation with `purchase_order_id` backfilled, when it changed.
    pub negotiation: Option<Negotiation>,
    /// Notifications to send after commit.
    pub events: Vec<DomainEvent>,
}

/// Result of a purchase order status change.
#[derive(Debug, Clone)]
pub struct PurchaseOrderChange {
    /// Order after the change.
    pub purchase_order: PurchaseOrder,
    /// The applied transition.
    pub transition: Transition<PurchaseOrderStatus>,
    /// Notifications to send after commit.
    pub events: Vec<DomainEvent>,
}

/// Stateless purchase order workflow.
pub struct PurchaseOrderWorkflow;

impl PurchaseOrderWorkflow {
    /// Checks that a bid may be turned into an order.
    ///
    /// # Errors
    ///
    /// Returns `PreconditionFailed` unless the bid is `awarded`.
    pub fn ensure_bid_accepting(bid: &Bid) -> Result<(), WorkflowError> {
        if bid.status == BidStatus::Awarded {
            Ok(())
        } else {
            Err(WorkflowError::precondition(format!(
                "bid {} is {}; only awarded bids become purchase orders",
                bid.bid_number, bid.status
            )))
        }
    }

    /// Checks that a negotiation may be turned into an order and returns the
    /// accepted offer's message id.
    ///
    /// # Errors
    ///
    /// Returns `PreconditionFailed` unless the negotiation is `closed` with
    /// an accepted offer.
    pub fn ensure_negotiation_accepting(negotiation: &Negotiation) -> Result<Uuid, WorkflowError> {
        match (negotiation.status, negotiation.accepted_offer_message_id) {
            (NegotiationStatus::Closed, Some(message_id)) => Ok(message_id),
            (NegotiationStatus::Closed, None) => Err(WorkflowError::precondition(
                "negotiation closed without an accepted offer",
            )),
            (status, _) => Err(WorkflowError::precondition(format!(
                "negotiation is {status}; only closed negotiations become purchase orders"
            ))),
        }
    }

    /// Derives a purchase order. Items are copied from the bid; the total
    /// comes from the accepted offer's `total_amount` when present.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` unless the actor is a buyer of the RFQ owner.
    pub fn derive(
        source: Derivation<'_>,
        actor: &Actor,
        po_number: String,
        policy: &WorkflowPolicy,
        now: DateTime<Utc>,
    ) -> Result<DerivedPurchaseOrder, WorkflowError> {
        let Derivation {
            bid,
            rfq,
            negotiation,
            accepted_offer,
        } = source;

        if !actor.acts_as(ActorRole::Buyer, rfq.company_id) {
            return Err(WorkflowError::unauthorized(format!(
                "only buyers of the owning company may issue orders for RFQ {}",
                rfq.reference_number
            )));
        }

        let negotiated_terms = accepted_offer.and_then(|m| m.offer_data.clone());
        let total_amount = negotiated_terms
            .as_ref()
            .and_then(offer_total)
            .unwrap_or(bid.total_amount);
        let status = policy.initial_purchase_order_status();
        let expected_delivery_date = negotiated_terms
            .as_ref()
            .and_then(|terms| terms.get("delivery_date"))
            .and_then(Value::as_str)
            .and_then(|raw| chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
            .or_else(|| rfq.delivery_date.map(|d| d.date_naive()));
        let payment_terms = negotiated_terms
            .as_ref()
            .and_then(|terms| terms.get("payment_terms"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let purchase_order = PurchaseOrder {
            id: Uuid::new_v4(),
            po_number,
            bid_id: bid.id,
            rfq_id: rfq.id,
            negotiation_id: negotiation.map(|n| n.id),
            buyer_company_id: rfq.company_id,
            supplier_company_id: bid.supplier_company_id,
            created_by: actor.user_id,
            status,
            total_amount,
            currency: bid.currency.clone(),
            approved_amount: None,
            current_approval_step: 0,
            approved_by: None,
            approved_at: None,
            delivery_address: None,
            payment_terms,
            notes: None,
            internal_notes: None,
            terms_and_conditions: None,
            expected_delivery_date,
            actual_delivery_date: None,
            sent_at: (status == PurchaseOrderStatus::SentToSupplier).then_some(now),
            acknowledged_at: None,
            rejection_reason: None,
            cancellation_reason: None,
            negotiated_terms,
            delivery_evidence: None,
            items: bid
                .items
                .iter()
                .map(|item| PurchaseOrderItem {
                    id: Uuid::new_v4(),
                    bid_item_id: Some(item.id),
                    description: item.description.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    total_price: item.total_price,
                    specifications: item.specifications.clone(),
                })
                .collect(),
            created_at: now,
            updated_at: now,
            version: 0,
        };

        let history = StatusHistoryEntry::created(
            EntityKind::PurchaseOrder,
            purchase_order.id,
            status.as_str(),
            actor.user_id,
            now,
        );

        let negotiation = negotiation.and_then(|n| Self::link_negotiation(n, purchase_order.id));

        let events = vec![DomainEvent::PurchaseOrderCreated {
            purchase_order_id: purchase_order.id,
            po_number: purchase_order.po_number.clone(),
            status: status.as_str().to_string(),
            buyer_company_id: purchase_order.buyer_company_id,
            supplier_company_id: purchase_order.supplier_company_id,
            total_amount,
            currency: purchase_order.currency.clone(),
        }];

        Ok(DerivedPurchaseOrder {
            purchase_order,
            history,
            negotiation,
            events,
        })
    }

    /// The negotiation pointed at `purchase_order_id`, or `None` when it
    /// already points at an order.
    #[must_use]
    pub fn link_negotiation(negotiation: &Negotiation, purchase_order_id: Uuid) -> Option<Negotiation> {
        if negotiation.purchase_order_id.is_some() {
            return None;
        }
        let mut linked = negotiation.clone();
        linked.purchase_order_id = Some(purchase_order_id);
        Some(linked)
    }

    /// Checks read access. Suppliers see an order once it has been sent.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` otherwise.
    pub fn ensure_visible(po: &PurchaseOrder, actor: &Actor) -> Result<(), WorkflowError> {
        let visible = actor.acts_as(ActorRole::Buyer, po.buyer_company_id)
            || (po.sent_at.is_some() && actor.acts_as(ActorRole::Supplier, po.supplier_company_id));
        if visible {
            Ok(())
        } else {
            Err(WorkflowError::unauthorized(format!(
                "purchase order {} is not visible to this actor",
                po.po_number
            )))
        }
    }

    fn ensure_side(po: &PurchaseOrder, actor: &Actor) -> Result<(), WorkflowError> {
        let owns = match actor.role {
            ActorRole::Admin => true,
            ActorRole::Buyer => actor.belongs_to(po.buyer_company_id),
            ActorRole::Supplier => actor.belongs_to(po.supplier_company_id),
        };
        if owns {
            Ok(())
        } else {
            Err(WorkflowError::unauthorized(format!(
                "actor is not a party to purchase order {}",
                po.po_number
            )))
        }
    }

    /// Statuses the actor may move the order to.
    #[must_use]
    pub fn available_transitions(po: &PurchaseOrder, actor: &Actor) -> Vec<PurchaseOrderStatus> {
        if Self::ensure_side(po, actor).is_err() {
            return Vec::new();
        }
        Machine::available_transitions(po.status, actor)
    }

    /// Returns true if the actor may move the order to `target`.
    #[must_use]
    pub fn can_transition(po: &PurchaseOrder, target: PurchaseOrderStatus, actor: &Actor) -> bool {
        Self::ensure_side(po, actor).is_ok() && Machine::can_transition(po.status, target, actor)
    }

    /// Applies a table transition with its preconditions and side effects.
    ///
    /// Metadata keys: `approved_amount` and `notes` (approve), `reason` /
    /// `rejection_reason` (reject), `reason` / `cancellation_reason`
    /// (cancel), `photos`, `documents` and `notes` (delivered).
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if the actor's role or company may not take the edge.
    /// - `InvalidTransition` if the table forbids the edge.
    /// - `Validation` for missing reasons, a non-positive amount, or too
    ///   much delivery evidence.
    pub fn transition(
        po: &PurchaseOrder,
        target: PurchaseOrderStatus,
        actor: &Actor,
        metadata: &Value,
        now: DateTime<Utc>,
    ) -> Result<PurchaseOrderChange, WorkflowError> {
        Machine::check(po.status, target, actor)?;
        Self::ensure_side(po, actor)?;
        let meta: PurchaseOrderTransitionMetadata = read_metadata(metadata)?;

        let mut updated = po.clone();
        let buyer = Recipient::Company(po.buyer_company_id);
        let supplier = Recipient::Company(po.supplier_company_id);

        let recipients = match target {
            PurchaseOrderStatus::PendingApproval => vec![buyer],
            PurchaseOrderStatus::Approved => {
                let amount = meta.approved_amount.unwrap_or(po.total_amount);
                if amount <= Decimal::ZERO {
                    return Err(WorkflowError::field(
                        "approved_amount",
                        "must be greater than zero",
                    ));
                }
                updated.approved_amount = Some(amount);
                updated.current_approval_step += 1;
                updated.approved_by = Some(actor.user_id);
                updated.approved_at = Some(now);
                vec![supplier]
            }
            PurchaseOrderStatus::Rejected => {
                let reason = meta
                    .reason_for(meta.rejection_reason.as_ref())
                    .ok_or_else(|| WorkflowError::field("reason", "is required to reject"))?;
                updated.rejection_reason = Some(reason);
                vec![Recipient::User(po.created_by)]
            }
            PurchaseOrderStatus::SentToSupplier => {
                updated.sent_at = Some(now);
                vec![supplier]
            }
            PurchaseOrderStatus::Acknowledged => {
                updated.acknowledged_at = Some(now);
                vec![buyer]
            }
            PurchaseOrderStatus::InProgress => vec![buyer],
            PurchaseOrderStatus::Delivered => {
                let evidence = DeliveryEvidence {
                    photos: meta.photos,
                    documents: meta.documents,
                    notes: non_blank(meta.notes.as_deref()),
                };
                check_evidence(&evidence)?;
                updated.delivery_evidence = Some(evidence);
                updated.actual_delivery_date = Some(now);
                if actor.role == ActorRole::Supplier {
                    vec![buyer]
                } else {
                    vec![supplier]
                }
            }
            PurchaseOrderStatus::Completed => vec![supplier],
            PurchaseOrderStatus::Cancelled => {
                let reason = meta
                    .reason_for(meta.cancellation_reason.as_ref())
                    .ok_or_else(|| WorkflowError::field("reason", "is required to cancel"))?;
                updated.cancellation_reason = Some(reason);
                if po.sent_at.is_some() {
                    vec![supplier]
                } else {
                    Vec::new()
                }
            }
            PurchaseOrderStatus::Draft => Vec::new(),
        };

        let transition = Machine::transition(po.status, target, actor, metadata.clone(), now)?;
        updated.status = target;
        updated.updated_at = now;

        let events = vec![DomainEvent::StatusChanged(StatusChanged::from_transition(
            &transition,
            updated.id,
            &updated.po_number,
            recipients,
        ))];

        Ok(PurchaseOrderChange {
            purchase_order: updated,
            transition,
            events,
        })
    }

    /// Admin override: sets the status without preconditions or side effects.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for non-admins and `InvalidTransition` when the
    /// target equals the current status.
    pub fn force_transition(
        po: &PurchaseOrder,
        target: PurchaseOrderStatus,
        actor: &Actor,
        metadata: &Value,
        now: DateTime<Utc>,
    ) -> Result<PurchaseOrderChange, WorkflowError> {
        let transition = Machine::force_transition(po.status, target, actor, metadata.clone(), now)?;
        let mut updated = po.clone();
        updated.status = target;
        updated.updated_at = now;
        Ok(PurchaseOrderChange {
            purchase_order: updated,
            transition,
            events: Vec::new(),
        })
    }
}

fn check_evidence(evidence: &DeliveryEvidence) -> Result<(), WorkflowError> {
    let mut errors = Vec::new();
    if evidence.photos.len() > MAX_DELIVERY_PHOTOS {
        errors.push(FieldError::new(
            "photos",
            format!("at most {MAX_DELIVERY_PHOTOS} photos are allowed"),
        ));
    }
    if evidence.documents.len() > MAX_DELIVERY_DOCUMENTS {
        errors.push(FieldError::new(
            "documents",
            format!("at most {MAX_DELIVERY_DOCUMENTS} documents are allowed"),
        ));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(WorkflowError::Validation(errors))
    }
}

fn offer_total(terms: &Value) -> Option<Decimal> {
    let amount = match terms.get("total_amount")? {
        Value::String(raw) => Decimal::from_str(raw.trim()).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    };
    match amount {
        Some(a) if a > Decimal::ZERO && a < MAX_AMOUNT => Some(a),
        _ => {
            tracing::warn!(terms = %terms, "ignoring unusable total_amount in accepted offer");
            None
        }
    }
}
