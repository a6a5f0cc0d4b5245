//! Bid lifecycle rules.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::award;
use super::types::{Bid, BidInput, BidItem, BidItemInput, BidStatus, MAX_AMOUNT};
use crate::error::{FieldError, WorkflowError};
use crate::events::{DomainEvent, Recipient, StatusChanged};
use crate::machine::{Actor, ActorRole, StatusMachine, Transition, non_blank, read_metadata};
use crate::policy::WorkflowPolicy;
use crate::rfq::{Rfq, RfqStatus};

type Machine = StatusMachine<BidStatus>;

const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Default, Deserialize)]
struct BidTransitionMetadata {
    reason: Option<String>,
    rejection_reason: Option<String>,
}

/// Result of a bid status change.
#[derive(Debug, Clone)]
pub struct BidChange {
    /// Bid after the change.
    pub bid: Bid,
    /// The applied transition.
    pub transition: Transition<BidStatus>,
    /// RFQ changed alongside the bid (award), with its transition.
    pub rfq: Option<(Rfq, Transition<RfqStatus>)>,
    /// Other bids changed as a side effect (rejected competitors).
    pub other_bids: Vec<Bid>,
    /// Notifications to send after commit.
    pub events: Vec<DomainEvent>,
}

/// Stateless bid lifecycle.
pub struct BidLifecycle;

impl BidLifecycle {
    /// Validates a bid payload.
    ///
    /// # Errors
    ///
    /// Returns `Validation` listing every offending field.
    pub fn validate(input: &BidInput) -> Result<(), WorkflowError> {
        let mut errors = Vec::new();

        for (i, item) in input.items.iter().enumerate() {
            if item.description.trim().is_empty() {
                errors.push(FieldError::new(
                    format!("items[{i}].description"),
                    "must not be empty",
                ));
            }
            if item.quantity <= Decimal::ZERO {
                errors.push(FieldError::new(
                    format!("items[{i}].quantity"),
                    "must be greater than zero",
                ));
            }
            if item.unit_price < Decimal::ZERO {
                errors.push(FieldError::new(
                    format!("items[{i}].unit_price"),
                    "must not be negative",
                ));
            }
        }
        if errors.is_empty() {
            if let Err(e) = price_items(&input.items) {
                errors.push(e);
            }
        }
        if let Some(currency) = &input.currency {
            if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
                errors.push(FieldError::new("currency", "must be a 3-letter ISO code"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(WorkflowError::Validation(errors))
        }
    }

    /// Checks that the actor may bid on the RFQ and returns their company.
    ///
    /// A `published` RFQ only admits invited suppliers; `bidding_open`
    /// admits any supplier.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` for non-suppliers and uninvited suppliers.
    /// - `PreconditionFailed` when the RFQ is not accepting bids.
    pub fn ensure_can_bid(rfq: &Rfq, actor: &Actor) -> Result<Uuid, WorkflowError> {
        if actor.role != ActorRole::Supplier {
            return Err(WorkflowError::unauthorized("only suppliers may place bids"));
        }
        let company_id = actor.require_company()?;

        match rfq.status {
            RfqStatus::Published if !rfq.is_invited(company_id) => {
                Err(WorkflowError::unauthorized(format!(
                    "RFQ {} is open to invited suppliers only",
                    rfq.reference_number
                )))
            }
            status if status.accepts_bids() => Ok(company_id),
            status => Err(WorkflowError::precondition(format!(
                "RFQ {} is {status} and not accepting bids",
                rfq.reference_number
            ))),
        }
    }

    /// Returns the draft to overwrite, if any.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` when the supplier already has a non-draft bid.
    pub fn existing_draft(existing: Option<Bid>) -> Result<Option<Bid>, WorkflowError> {
        match existing {
            Some(bid) if bid.status != BidStatus::Draft => Err(WorkflowError::conflict(format!(
                "bid {} is already {}",
                bid.bid_number, bid.status
            ))),
            other => Ok(other),
        }
    }

    /// Builds a new draft bid.
    ///
    /// # Errors
    ///
    /// See [`BidLifecycle::ensure_can_bid`] and [`BidLifecycle::validate`].
    pub fn create_draft(
        rfq: &Rfq,
        input: BidInput,
        actor: &Actor,
        bid_number: String,
        now: DateTime<Utc>,
    ) -> Result<Bid, WorkflowError> {
        let supplier_company_id = Self::ensure_can_bid(rfq, actor)?;
        Self::validate(&input)?;

        let (items, total_amount) = build_items(input.items)?;
        Ok(Bid {
            id: Uuid::new_v4(),
            bid_number,
            rfq_id: rfq.id,
            supplier_company_id,
            submitted_by: actor.user_id,
            status: BidStatus::Draft,
            total_amount,
            items,
            currency: normalize_currency(input.currency.as_deref()),
            notes: non_blank(input.notes.as_deref()),
            submitted_at: None,
            evaluation: None,
            rejection_reason: None,
            awarded_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// Replaces a draft's items, currency and notes.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` unless the actor's company owns the bid.
    /// - `Conflict` if the bid is no longer a draft.
    pub fn replace_draft(
        bid: &Bid,
        rfq: &Rfq,
        input: BidInput,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Bid, WorkflowError> {
        let company_id = Self::ensure_can_bid(rfq, actor)?;
        if bid.supplier_company_id != company_id {
            return Err(WorkflowError::unauthorized("bid belongs to another supplier"));
        }
        if !bid.status.is_editable() {
            return Err(WorkflowError::conflict(format!(
                "bid {} is {} and can no longer be edited",
                bid.bid_number, bid.status
            )));
        }
        Self::validate(&input)?;

        let mut updated = bid.clone();
        let (items, total_amount) = build_items(input.items)?;
        updated.items = items;
        updated.total_amount = total_amount;
        updated.currency = normalize_currency(input.currency.as_deref());
        updated.notes = non_blank(input.notes.as_deref());
        updated.updated_at = now;
        Ok(updated)
    }

    /// Checks read access: the bidding supplier, the RFQ owner once the bid
    /// has been submitted, or an admin.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` otherwise.
    pub fn ensure_visible(bid: &Bid, rfq: &Rfq, actor: &Actor) -> Result<(), WorkflowError> {
        let visible = actor.acts_as(ActorRole::Supplier, bid.supplier_company_id)
            || (bid.status != BidStatus::Draft && actor.acts_as(ActorRole::Buyer, rfq.company_id));
        if visible {
            Ok(())
        } else {
            Err(WorkflowError::unauthorized(format!(
                "bid {} is not visible to this actor",
                bid.bid_number
            )))
        }
    }

    fn ensure_side(bid: &Bid, rfq: &Rfq, actor: &Actor) -> Result<(), WorkflowError> {
        let owns = match actor.role {
            ActorRole::Admin => true,
            ActorRole::Supplier => actor.belongs_to(bid.supplier_company_id),
            ActorRole::Buyer => actor.belongs_to(rfq.company_id),
        };
        if owns {
            Ok(())
        } else {
            Err(WorkflowError::unauthorized(format!(
                "actor is not a party to bid {}",
                bid.bid_number
            )))
        }
    }

    /// Statuses the actor may move the bid to.
    #[must_use]
    pub fn available_transitions(bid: &Bid, rfq: &Rfq, actor: &Actor) -> Vec<BidStatus> {
        if Self::ensure_side(bid, rfq, actor).is_err() {
            return Vec::new();
        }
        Machine::available_transitions(bid.status, actor)
    }

    /// Returns true if the actor may move the bid to `target`.
    #[must_use]
    pub fn can_transition(bid: &Bid, rfq: &Rfq, target: BidStatus, actor: &Actor) -> bool {
        Self::ensure_side(bid, rfq, actor).is_ok() && Machine::can_transition(bid.status, target, actor)
    }

    /// Applies a table transition with its preconditions and side effects.
    ///
    /// `bids` holds every bid on the RFQ and is used to settle awards.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if the actor's role or company may not take the edge.
    /// - `InvalidTransition` if the table forbids the edge.
    /// - `PreconditionFailed` when the target's rules fail.
    #[allow(clippy::too_many_arguments)]
    pub fn transition(
        bid: &Bid,
        rfq: &Rfq,
        bids: &[Bid],
        target: BidStatus,
        actor: &Actor,
        metadata: &Value,
        policy: &WorkflowPolicy,
        now: DateTime<Utc>,
    ) -> Result<BidChange, WorkflowError> {
        Machine::check(bid.status, target, actor)?;
        Self::ensure_side(bid, rfq, actor)?;
        let meta: BidTransitionMetadata = read_metadata(metadata)?;

        if target == BidStatus::Awarded {
            let settlement = award::settle_award(rfq, bid, bids, actor, metadata, now)?;
            return Ok(BidChange {
                bid: settlement.winner,
                transition: settlement.winner_transition,
                rfq: Some((settlement.rfq, settlement.rfq_transition)),
                other_bids: settlement.rejected,
                events: settlement.events,
            });
        }

        let mut updated = bid.clone();
        let recipient = match target {
            BidStatus::Submitted => {
                if updated.items.is_empty() {
                    return Err(WorkflowError::precondition(
                        "a bid needs at least one item to be submitted",
                    ));
                }
                if !rfq.status.accepts_bids() {
                    return Err(WorkflowError::precondition(format!(
                        "RFQ {} is {} and not accepting bids",
                        rfq.reference_number, rfq.status
                    )));
                }
                policy.check_submission_time(rfq.bid_deadline, now)?;
                updated.submitted_at.get_or_insert(now);
                Recipient::Company(rfq.company_id)
            }
            BidStatus::Rejected => {
                updated.rejection_reason = non_blank(
                    meta.rejection_reason
                        .as_deref()
                        .or(meta.reason.as_deref()),
                );
                Recipient::Company(bid.supplier_company_id)
            }
            BidStatus::Withdrawn => Recipient::Company(rfq.company_id),
            BidStatus::UnderReview | BidStatus::Awarded | BidStatus::Draft => {
                Recipient::Company(bid.supplier_company_id)
            }
        };

        let transition = Machine::transition(bid.status, target, actor, metadata.clone(), now)?;
        updated.status = target;
        updated.updated_at = now;

        let recipients = if target == BidStatus::Withdrawn && bid.status == BidStatus::Draft {
            Vec::new()
        } else {
            vec![recipient]
        };
        let events = vec![DomainEvent::StatusChanged(StatusChanged::from_transition(
            &transition,
            updated.id,
            &updated.bid_number,
            recipients,
        ))];

        Ok(BidChange {
            bid: updated,
            transition,
            rfq: None,
            other_bids: Vec::new(),
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
        bid: &Bid,
        target: BidStatus,
        actor: &Actor,
        metadata: &Value,
        now: DateTime<Utc>,
    ) -> Result<BidChange, WorkflowError> {
        let transition = Machine::force_transition(bid.status, target, actor, metadata.clone(), now)?;
        let mut updated = bid.clone();
        updated.status = target;
        updated.updated_at = now;
        Ok(BidChange {
            bid: updated,
            transition,
            rfq: None,
            other_bids: Vec::new(),
            events: Vec::new(),
        })
    }
}

/// Line totals and the document total, or the first amount that does not
/// fit a money column.
fn price_items(items: &[BidItemInput]) -> Result<(Vec<Decimal>, Decimal), FieldError> {
    let mut lines = Vec::with_capacity(items.len());
    let mut total = Decimal::ZERO;
    for (i, item) in items.iter().enumerate() {
        let too_large = || FieldError::new(format!("items[{i}].unit_price"), "amount is too large");
        let line = item
            .quantity
            .checked_mul(item.unit_price)
            .filter(|line| *line < MAX_AMOUNT)
            .ok_or_else(too_large)?;
        total = total
            .checked_add(line)
            .filter(|total| *total < MAX_AMOUNT)
            .ok_or_else(too_large)?;
        lines.push(line);
    }
    Ok((lines, total))
}

fn build_items(items: Vec<BidItemInput>) -> Result<(Vec<BidItem>, Decimal), WorkflowError> {
    let (lines, total) =
        price_items(&items).map_err(|e| WorkflowError::Validation(vec![e]))?;
    let items = items
        .into_iter()
        .zip(lines)
        .map(|(item, total_price)| BidItem {
            id: Uuid::new_v4(),
            rfq_item_id: item.rfq_item_id,
            description: item.description.trim().to_string(),
            total_price,
            quantity: item.quantity,
            unit_price: item.unit_price,
            specifications: item.specifications,
        })
        .collect();
    Ok((items, total))
}

fn normalize_currency(currency: Option<&str>) -> String {
    non_blank(currency).map_or_else(|| DEFAULT_CURRENCY.to_string(), |c| c.to_uppercase())
}
