//! RFQ lifecycle rules.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::types::{Rfq, RfqInput, RfqItem, RfqItemInput, RfqStatus};
use crate::bid::{Bid, award};
use crate::error::{FieldError, WorkflowError};
use crate::events::{DomainEvent, Recipient, StatusChanged};
use crate::machine::{Actor, ActorRole, StatusMachine, Transition, non_blank, read_metadata};
use crate::policy::WorkflowPolicy;

type Machine = StatusMachine<RfqStatus>;

/// Metadata understood by RFQ transitions.
#[derive(Debug, Default, Deserialize)]
struct RfqTransitionMetadata {
    awarded_supplier_id: Option<Uuid>,
    cancellation_reason: Option<String>,
}

/// Result of an RFQ status change.
#[derive(Debug, Clone)]
pub struct RfqChange {
    /// RFQ after the change.
    pub rfq: Rfq,
    /// The applied transition.
    pub transition: Transition<RfqStatus>,
    /// Bids changed as a side effect (award settlement).
    pub bids: Vec<Bid>,
    /// Notifications to send after commit.
    pub events: Vec<DomainEvent>,
}

/// Stateless RFQ workflow.
pub struct RfqWorkflow;

impl RfqWorkflow {
    /// Validates a create/edit payload.
    ///
    /// # Errors
    ///
    /// Returns `Validation` listing every offending field.
    pub fn validate(input: &RfqInput) -> Result<(), WorkflowError> {
        let mut errors = Vec::new();

        if input.title.trim().is_empty() {
            errors.push(FieldError::new("title", "must not be empty"));
        }
        if let (Some(deadline), Some(delivery)) = (input.bid_deadline, input.delivery_date) {
            if deadline >= delivery {
                errors.push(FieldError::new(
                    "bid_deadline",
                    "must be before the delivery date",
                ));
            }
        }
        for (i, item) in input.items.iter().enumerate() {
            if item.name.trim().is_empty() {
                errors.push(FieldError::new(format!("items[{i}].name"), "must not be empty"));
            }
            if item.quantity <= rust_decimal::Decimal::ZERO {
                errors.push(FieldError::new(
                    format!("items[{i}].quantity"),
                    "must be greater than zero",
                ));
            }
            if item.unit.trim().is_empty() {
                errors.push(FieldError::new(format!("items[{i}].unit"), "must not be empty"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(WorkflowError::Validation(errors))
        }
    }

    /// Builds a new draft RFQ owned by the actor's company.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for non-buyers and `Validation` for bad input.
    pub fn create(
        input: RfqInput,
        actor: &Actor,
        reference_number: String,
        now: DateTime<Utc>,
    ) -> Result<Rfq, WorkflowError> {
        if actor.role != ActorRole::Buyer {
            return Err(WorkflowError::unauthorized("only buyers may create RFQs"));
        }
        let company_id = actor.require_company()?;
        Self::validate(&input)?;

        Ok(Rfq {
            id: Uuid::new_v4(),
            reference_number,
            title: input.title.trim().to_string(),
            description: non_blank(input.description.as_deref()),
            company_id,
            created_by: actor.user_id,
            status: RfqStatus::Draft,
            bid_deadline: input.bid_deadline,
            delivery_date: input.delivery_date,
            items: build_items(input.items),
            invited_suppliers: dedup(input.invited_suppliers),
            awarded_supplier_id: None,
            awarded_bid_id: None,
            cancellation_reason: None,
            published_at: None,
            awarded_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// Replaces a draft's editable fields and items.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` unless the actor owns the RFQ.
    /// - `PreconditionFailed` once the RFQ has left `draft`.
    /// - `Validation` for bad input.
    pub fn update_draft(
        rfq: &Rfq,
        input: RfqInput,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Rfq, WorkflowError> {
        Self::ensure_owner(rfq, actor)?;
        if !rfq.status.is_editable() {
            return Err(WorkflowError::precondition(format!(
                "RFQ {} is {} and can no longer be edited",
                rfq.reference_number, rfq.status
            )));
        }
        Self::validate(&input)?;

        let mut updated = rfq.clone();
        updated.title = input.title.trim().to_string();
        updated.description = non_blank(input.description.as_deref());
        updated.bid_deadline = input.bid_deadline;
        updated.delivery_date = input.delivery_date;
        updated.items = build_items(input.items);
        updated.invited_suppliers = dedup(input.invited_suppliers);
        updated.updated_at = now;
        Ok(updated)
    }

    /// Checks that the actor is a buyer of the owning company, or an admin.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` otherwise.
    pub fn ensure_owner(rfq: &Rfq, actor: &Actor) -> Result<(), WorkflowError> {
        if actor.acts_as(ActorRole::Buyer, rfq.company_id) {
            Ok(())
        } else {
            Err(WorkflowError::unauthorized(format!(
                "only buyers of the owning company may manage RFQ {}",
                rfq.reference_number
            )))
        }
    }

    /// Checks read access. Drafts are private to the owner; invited
    /// suppliers see published RFQs and every supplier sees the rest.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` when the actor may not see the RFQ.
    pub fn ensure_visible(rfq: &Rfq, actor: &Actor) -> Result<(), WorkflowError> {
        if actor.acts_as(ActorRole::Buyer, rfq.company_id) {
            return Ok(());
        }
        let visible = match (actor.role, rfq.status) {
            (ActorRole::Supplier, RfqStatus::Draft) => false,
            (ActorRole::Supplier, RfqStatus::Published) => actor
                .company_id
                .is_some_and(|company| rfq.is_invited(company)),
            (ActorRole::Supplier, _) => true,
            _ => false,
        };
        if visible {
            Ok(())
        } else {
            Err(WorkflowError::unauthorized(format!(
                "RFQ {} is not visible to this actor",
                rfq.reference_number
            )))
        }
    }

    /// Statuses the actor may move the RFQ to.
    #[must_use]
    pub fn available_transitions(rfq: &Rfq, actor: &Actor) -> Vec<RfqStatus> {
        if Self::ensure_owner(rfq, actor).is_err() {
            return Vec::new();
        }
        Machine::available_transitions(rfq.status, actor)
    }

    /// Returns true if the actor may move the RFQ to `target`.
    #[must_use]
    pub fn can_transition(rfq: &Rfq, target: RfqStatus, actor: &Actor) -> bool {
        Self::ensure_owner(rfq, actor).is_ok() && Machine::can_transition(rfq.status, target, actor)
    }

    /// Applies a table transition with its preconditions and side effects.
    ///
    /// `bids` must hold every bid on the RFQ; it is consulted for awards and
    /// for notification recipients.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` unless the actor owns the RFQ.
    /// - `InvalidTransition` if the table forbids the edge.
    /// - `PreconditionFailed` / `Validation` when the target's rules fail.
    pub fn transition(
        rfq: &Rfq,
        bids: &[Bid],
        target: RfqStatus,
        actor: &Actor,
        metadata: &Value,
        policy: &WorkflowPolicy,
        now: DateTime<Utc>,
    ) -> Result<RfqChange, WorkflowError> {
        Self::ensure_owner(rfq, actor)?;
        Machine::check(rfq.status, target, actor)?;
        let meta: RfqTransitionMetadata = read_metadata(metadata)?;

        if target == RfqStatus::Awarded {
            return Self::award(rfq, bids, meta.awarded_supplier_id, actor, metadata, now);
        }

        let mut updated = rfq.clone();
        let mut events = Vec::new();
        let mut recipients = award::bidder_recipients(bids);

        match target {
            RfqStatus::Published => {
                if updated.items.is_empty() {
                    return Err(WorkflowError::precondition(
                        "an RFQ needs at least one item to be published",
                    ));
                }
                let deadline = updated
                    .bid_deadline
                    .unwrap_or_else(|| policy.default_bid_deadline(now));
                if let Some(delivery) = updated.delivery_date {
                    if deadline >= delivery {
                        return Err(WorkflowError::precondition(format!(
                            "bid deadline {} must be before delivery date {}",
                            deadline.to_rfc3339(),
                            delivery.to_rfc3339()
                        )));
                    }
                }
                updated.bid_deadline = Some(deadline);
                updated.published_at.get_or_insert(now);
            }
            RfqStatus::BiddingOpen => {
                events.extend(updated.invited_suppliers.iter().map(|supplier| {
                    DomainEvent::SupplierInvited {
                        rfq_id: updated.id,
                        rfq_number: updated.reference_number.clone(),
                        title: updated.title.clone(),
                        supplier_company_id: *supplier,
                        bid_deadline: updated.bid_deadline,
                    }
                }));
            }
            RfqStatus::Cancelled => {
                let reason = non_blank(meta.cancellation_reason.as_deref()).ok_or_else(|| {
                    WorkflowError::field("cancellation_reason", "is required to cancel an RFQ")
                })?;
                updated.cancellation_reason = Some(reason);
                for supplier in &updated.invited_suppliers {
                    let recipient = Recipient::Company(*supplier);
                    if !recipients.contains(&recipient) {
                        recipients.push(recipient);
                    }
                }
            }
            RfqStatus::Draft => {
                updated.cancellation_reason = None;
                updated.awarded_supplier_id = None;
                updated.awarded_bid_id = None;
                updated.awarded_at = None;
            }
            RfqStatus::BiddingClosed
            | RfqStatus::UnderEvaluation
            | RfqStatus::Awarded
            | RfqStatus::Completed => {}
        }

        let transition = Machine::transition(rfq.status, target, actor, metadata.clone(), now)?;
        updated.status = target;
        updated.updated_at = now;

        events.insert(
            0,
            DomainEvent::StatusChanged(StatusChanged::from_transition(
                &transition,
                updated.id,
                &updated.reference_number,
                recipients,
            )),
        );

        Ok(RfqChange {
            rfq: updated,
            transition,
            bids: Vec::new(),
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
        rfq: &Rfq,
        target: RfqStatus,
        actor: &Actor,
        metadata: &Value,
        now: DateTime<Utc>,
    ) -> Result<RfqChange, WorkflowError> {
        let transition = Machine::force_transition(rfq.status, target, actor, metadata.clone(), now)?;
        let mut updated = rfq.clone();
        updated.status = target;
        updated.updated_at = now;
        Ok(RfqChange {
            rfq: updated,
            transition,
            bids: Vec::new(),
            events: Vec::new(),
        })
    }

    fn award(
        rfq: &Rfq,
        bids: &[Bid],
        awarded_supplier_id: Option<Uuid>,
        actor: &Actor,
        metadata: &Value,
        now: DateTime<Utc>,
    ) -> Result<RfqChange, WorkflowError> {
        let supplier = awarded_supplier_id.ok_or_else(|| {
            WorkflowError::precondition(format!(
                "RFQ {} cannot be awarded without an awarded_supplier_id",
                rfq.reference_number
            ))
        })?;
        let winner = bids
            .iter()
            .find(|b| b.supplier_company_id == supplier && b.status.is_awardable())
            .ok_or_else(|| {
                WorkflowError::precondition(format!(
                    "supplier {supplier} has no awardable bid on RFQ {}",
                    rfq.reference_number
                ))
            })?;

        let settlement = award::settle_award(rfq, winner, bids, actor, metadata, now)?;
        let bids = settlement.changed_bids();
        Ok(RfqChange {
            rfq: settlement.rfq,
            transition: settlement.rfq_transition,
            bids,
            events: settlement.events,
        })
    }
}

fn build_items(items: Vec<RfqItemInput>) -> Vec<RfqItem> {
    items
        .into_iter()
        .map(|item| RfqItem {
            id: Uuid::new_v4(),
            name: item.name.trim().to_string(),
            description: non_blank(item.description.as_deref()),
            quantity: item.quantity,
            unit: item.unit.trim().to_string(),
            specifications: item.specifications,
        })
        .collect()
}

fn dedup(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut out: Vec<Uuid> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bid::BidStatus;
    use crate::fixtures::{bid_on, buyer_of, draft_rfq, rfq_in, supplier_of};
    use crate::rfq::RfqItemInput;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn policy() -> WorkflowPolicy {
        WorkflowPolicy::default()
    }

    #[test]
    fn test_create_requires_buyer() {
        let rfq = draft_rfq();
        let supplier = supplier_of(Uuid::new_v4());
        let input = RfqInput {
            title: "Steel".to_string(),
            description: None,
            bid_deadline: None,
            delivery_date: None,
            items: Vec::new(),
            invited_suppliers: Vec::new(),
        };
        assert!(matches!(
            RfqWorkflow::create(input, &supplier, rfq.reference_number, Utc::now()),
            Err(WorkflowError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let now = Utc::now();
        let input = RfqInput {
            title: "  ".to_string(),
            description: None,
            bid_deadline: Some(now + Duration::days(10)),
            delivery_date: Some(now + Duration::days(5)),
            items: vec![RfqItemInput {
                name: "Bolts".to_string(),
                description: None,
                quantity: dec!(0),
                unit: "pcs".to_string(),
                specifications: None,
            }],
            invited_suppliers: Vec::new(),
        };
        let err = RfqWorkflow::validate(&input).unwrap_err();
        let fields: Vec<_> = err.field_errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["title", "bid_deadline", "items[0].quantity"]);
    }

    #[test]
    fn test_publish_defaults_deadline() {
        let rfq = draft_rfq();
        let now = Utc::now();
        let change = RfqWorkflow::transition(
            &rfq,
            &[],
            RfqStatus::Published,
            &buyer_of(rfq.company_id),
            &Value::Null,
            &policy(),
            now,
        )
        .unwrap();
        assert_eq!(change.rfq.status, RfqStatus::Published);
        assert_eq!(change.rfq.bid_deadline, Some(now + Duration::days(14)));
        assert_eq!(change.rfq.published_at, Some(now));
    }

    #[test]
    fn test_publish_requires_items() {
        let mut rfq = draft_rfq();
        rfq.items.clear();
        let err = RfqWorkflow::transition(
            &rfq,
            &[],
            RfqStatus::Published,
            &buyer_of(rfq.company_id),
            &Value::Null,
            &policy(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::PreconditionFailed(_)));
    }

    #[test]
    fn test_publish_rejects_default_deadline_after_delivery() {
        let now = Utc::now();
        let mut rfq = draft_rfq();
        rfq.bid_deadline = None;
        rfq.delivery_date = Some(now + Duration::days(3));
        let err = RfqWorkflow::transition(
            &rfq,
            &[],
            RfqStatus::Published,
            &buyer_of(rfq.company_id),
            &Value::Null,
            &policy(),
            now,
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::PreconditionFailed(_)));
    }

    #[test]
    fn test_other_company_buyer_unauthorized() {
        let rfq = draft_rfq();
        let err = RfqWorkflow::transition(
            &rfq,
            &[],
            RfqStatus::Published,
            &buyer_of(Uuid::new_v4()),
            &Value::Null,
            &policy(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::Unauthorized(_)));
        assert!(RfqWorkflow::available_transitions(&rfq, &buyer_of(Uuid::new_v4())).is_empty());
    }

    #[test]
    fn test_open_bidding_invites_each_supplier() {
        let mut rfq = rfq_in(RfqStatus::Published);
        rfq.invited_suppliers = vec![Uuid::new_v4(), Uuid::new_v4()];
        let change = RfqWorkflow::transition(
            &rfq,
            &[],
            RfqStatus::BiddingOpen,
            &buyer_of(rfq.company_id),
            &Value::Null,
            &policy(),
            Utc::now(),
        )
        .unwrap();
        let invites = change
            .events
            .iter()
            .filter(|e| matches!(e, DomainEvent::SupplierInvited { .. }))
            .count();
        assert_eq!(invites, 2);
    }

    #[test]
    fn test_cancel_requires_reason() {
        let rfq = rfq_in(RfqStatus::BiddingOpen);
        let err = RfqWorkflow::transition(
            &rfq,
            &[],
            RfqStatus::Cancelled,
            &buyer_of(rfq.company_id),
            &json!({"cancellation_reason": "   "}),
            &policy(),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err.field_errors()[0].field, "cancellation_reason");
    }

    #[test]
    fn test_cancel_notifies_invited_and_bidders() {
        let mut rfq = rfq_in(RfqStatus::BiddingOpen);
        let invited = Uuid::new_v4();
        rfq.invited_suppliers = vec![invited];
        let bid = bid_on(&rfq, Uuid::new_v4(), BidStatus::Submitted);

        let change = RfqWorkflow::transition(
            &rfq,
            std::slice::from_ref(&bid),
            RfqStatus::Cancelled,
            &buyer_of(rfq.company_id),
            &json!({"cancellation_reason": "Budget cut"}),
            &policy(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(change.rfq.cancellation_reason.as_deref(), Some("Budget cut"));
        let DomainEvent::StatusChanged(event) = &change.events[0] else {
            panic!("expected status change");
        };
        assert!(event.recipients.contains(&Recipient::Company(invited)));
        assert!(event.recipients.contains(&Recipient::Company(bid.supplier_company_id)));
        assert_eq!(event.reason.as_deref(), Some("Budget cut"));
    }

    #[test]
    fn test_reopen_clears_cancellation_and_award() {
        let mut rfq = rfq_in(RfqStatus::Cancelled);
        rfq.cancellation_reason = Some("x".into());
        rfq.awarded_supplier_id = Some(Uuid::new_v4());
        let change = RfqWorkflow::transition(
            &rfq,
            &[],
            RfqStatus::Draft,
            &buyer_of(rfq.company_id),
            &Value::Null,
            &policy(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(change.rfq.status, RfqStatus::Draft);
        assert!(change.rfq.cancellation_reason.is_none());
        assert!(change.rfq.awarded_supplier_id.is_none());
    }

    #[test]
    fn test_cancelled_is_not_terminal() {
        use crate::machine::WorkflowState;

        let rfq = rfq_in(RfqStatus::Cancelled);
        assert!(!RfqStatus::Cancelled.is_terminal());
        assert!(RfqStatus::Completed.is_terminal());
        assert_eq!(
            RfqWorkflow::available_transitions(&rfq, &buyer_of(rfq.company_id)),
            vec![RfqStatus::Draft]
        );
    }

    #[test]
    fn test_award_without_supplier_is_precondition() {
        let rfq = rfq_in(RfqStatus::BiddingOpen);
        let bid = bid_on(&rfq, Uuid::new_v4(), BidStatus::Submitted);
        let err = RfqWorkflow::transition(
            &rfq,
            &[bid],
            RfqStatus::Awarded,
            &buyer_of(rfq.company_id),
            &Value::Null,
            &policy(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::PreconditionFailed(_)));
    }

    #[test]
    fn test_award_requires_awardable_bid() {
        let rfq = rfq_in(RfqStatus::BiddingClosed);
        let supplier = Uuid::new_v4();
        let withdrawn = bid_on(&rfq, supplier, BidStatus::Withdrawn);
        let err = RfqWorkflow::transition(
            &rfq,
            &[withdrawn],
            RfqStatus::Awarded,
            &buyer_of(rfq.company_id),
            &json!({"awarded_supplier_id": supplier}),
            &policy(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::PreconditionFailed(_)));
    }

    #[test]
    fn test_award_settles_bids() {
        let rfq = rfq_in(RfqStatus::UnderEvaluation);
        let winner = bid_on(&rfq, Uuid::new_v4(), BidStatus::UnderReview);
        let loser = bid_on(&rfq, Uuid::new_v4(), BidStatus::Submitted);
        let withdrawn = bid_on(&rfq, Uuid::new_v4(), BidStatus::Withdrawn);

        let change = RfqWorkflow::transition(
            &rfq,
            &[winner.clone(), loser.clone(), withdrawn],
            RfqStatus::Awarded,
            &buyer_of(rfq.company_id),
            &json!({"awarded_supplier_id": winner.supplier_company_id}),
            &policy(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(change.rfq.status, RfqStatus::Awarded);
        assert_eq!(change.rfq.awarded_bid_id, Some(winner.id));
        assert_eq!(change.bids.len(), 2);
        assert_eq!(change.bids[0].status, BidStatus::Awarded);
        assert_eq!(change.bids[1].id, loser.id);
        assert_eq!(change.bids[1].status, BidStatus::Rejected);
    }

    #[test]
    fn test_force_skips_preconditions() {
        let mut rfq = draft_rfq();
        rfq.items.clear();
        let admin = Actor::admin(Uuid::new_v4());
        let change =
            RfqWorkflow::force_transition(&rfq, RfqStatus::Completed, &admin, &Value::Null, Utc::now())
                .unwrap();
        assert_eq!(change.rfq.status, RfqStatus::Completed);
        assert!(change.transition.forced);
        assert!(change.events.is_empty());
    }

    #[test]
    fn test_update_draft_only_while_draft() {
        let rfq = rfq_in(RfqStatus::Published);
        let input = RfqInput {
            title: "New".to_string(),
            description: None,
            bid_deadline: None,
            delivery_date: None,
            items: Vec::new(),
            invited_suppliers: Vec::new(),
        };
        assert!(matches!(
            RfqWorkflow::update_draft(&rfq, input, &buyer_of(rfq.company_id), Utc::now()),
            Err(WorkflowError::PreconditionFailed(_))
        ));
    }

    #[test]
    fn test_visibility() {
        let mut rfq = rfq_in(RfqStatus::Published);
        let invited = Uuid::new_v4();
        rfq.invited_suppliers = vec![invited];

        assert!(RfqWorkflow::ensure_visible(&rfq, &supplier_of(invited)).is_ok());
        assert!(RfqWorkflow::ensure_visible(&rfq, &supplier_of(Uuid::new_v4())).is_err());

        rfq.status = RfqStatus::BiddingOpen;
        assert!(RfqWorkflow::ensure_visible(&rfq, &supplier_of(Uuid::new_v4())).is_ok());
        assert!(RfqWorkflow::ensure_visible(&rfq, &buyer_of(Uuid::new_v4())).is_err());
    }
}
