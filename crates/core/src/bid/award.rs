//! Coupled award of a bid and its RFQ.
//!
//! Awarding is reachable from both sides (an RFQ moving to `awarded`, or a
//! bid moving to `awarded`). Both paths end here so the RFQ, the winning bid
//! and every competing bid change together.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::types::{Bid, BidStatus};
use crate::error::WorkflowError;
use crate::events::{DomainEvent, Recipient, StatusChanged};
use crate::machine::{Actor, StatusMachine, Transition};
use crate::rfq::{Rfq, RfqStatus};

/// Reason recorded on bids that lost an award.
pub const COMPETITOR_REJECTION_REASON: &str = "Another bid was awarded for this RFQ";

/// Everything that changes when a bid wins.
#[derive(Debug, Clone)]
pub struct AwardSettlement {
    /// RFQ after the award.
    pub rfq: Rfq,
    /// RFQ status change, for history.
    pub rfq_transition: Transition<RfqStatus>,
    /// Winning bid after the award.
    pub winner: Bid,
    /// Bid status change.
    pub winner_transition: Transition<BidStatus>,
    /// Competing bids moved to `rejected`.
    pub rejected: Vec<Bid>,
    /// Notifications to send after commit.
    pub events: Vec<DomainEvent>,
}

impl AwardSettlement {
    /// Every bid that changed, winner first.
    #[must_use]
    pub fn changed_bids(&self) -> Vec<Bid> {
        std::iter::once(self.winner.clone())
            .chain(self.rejected.iter().cloned())
            .collect()
    }
}

/// Supplier companies holding a non-draft bid, deduplicated.
pub(crate) fn bidder_recipients(bids: &[Bid]) -> Vec<Recipient> {
    let mut recipients = Vec::new();
    for bid in bids.iter().filter(|b| b.status != BidStatus::Draft) {
        let recipient = Recipient::Company(bid.supplier_company_id);
        if !recipients.contains(&recipient) {
            recipients.push(recipient);
        }
    }
    recipients
}

/// Awards `winner` on `rfq` and rejects the other awardable bids.
///
/// `bids` is every bid on the RFQ; the winner may or may not be among them.
/// The caller has already checked that `actor` owns the RFQ.
///
/// # Errors
///
/// - `PreconditionFailed` if the RFQ is not awaiting an award, or the bid was
///   never submitted.
/// - `InvalidTransition` if the bid is not `submitted` or `under_review`.
pub fn settle_award(
    rfq: &Rfq,
    winner: &Bid,
    bids: &[Bid],
    actor: &Actor,
    metadata: &Value,
    now: DateTime<Utc>,
) -> Result<AwardSettlement, WorkflowError> {
    if winner.rfq_id != rfq.id {
        return Err(WorkflowError::precondition(format!(
            "bid {} does not belong to RFQ {}",
            winner.bid_number, rfq.reference_number
        )));
    }
    if !rfq.status.is_awardable() {
        return Err(WorkflowError::precondition(format!(
            "RFQ {} is {} and cannot be awarded",
            rfq.reference_number, rfq.status
        )));
    }
    if winner.submitted_at.is_none() {
        return Err(WorkflowError::precondition(format!(
            "bid {} was never submitted",
            winner.bid_number
        )));
    }

    let winner_transition = StatusMachine::transition(
        winner.status,
        BidStatus::Awarded,
        actor,
        metadata.clone(),
        now,
    )?;

    let mut rfq_metadata = match metadata {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    rfq_metadata.insert(
        "awarded_supplier_id".to_string(),
        Value::String(winner.supplier_company_id.to_string()),
    );
    rfq_metadata.insert(
        "awarded_bid_id".to_string(),
        Value::String(winner.id.to_string()),
    );
    let rfq_transition = StatusMachine::transition(
        rfq.status,
        RfqStatus::Awarded,
        actor,
        Value::Object(rfq_metadata),
        now,
    )?;

    let mut awarded_rfq = rfq.clone();
    awarded_rfq.status = RfqStatus::Awarded;
    awarded_rfq.awarded_supplier_id = Some(winner.supplier_company_id);
    awarded_rfq.awarded_bid_id = Some(winner.id);
    awarded_rfq.awarded_at = Some(now);
    awarded_rfq.updated_at = now;

    let mut awarded_bid = winner.clone();
    awarded_bid.status = BidStatus::Awarded;
    awarded_bid.awarded_at = Some(now);
    awarded_bid.updated_at = now;

    let mut events = Vec::new();
    let mut rejected = Vec::new();
    for competitor in bids
        .iter()
        .filter(|b| b.id != winner.id && b.status.is_awardable())
    {
        let transition = Transition {
            from: competitor.status,
            to: BidStatus::Rejected,
            actor_id: actor.user_id,
            at: now,
            metadata: serde_json::json!({ "reason": COMPETITOR_REJECTION_REASON }),
            forced: false,
        };
        events.push(DomainEvent::StatusChanged(StatusChanged::from_transition(
            &transition,
            competitor.id,
            &competitor.bid_number,
            vec![Recipient::Company(competitor.supplier_company_id)],
        )));

        let mut lost = competitor.clone();
        lost.status = BidStatus::Rejected;
        lost.rejection_reason = Some(COMPETITOR_REJECTION_REASON.to_string());
        lost.updated_at = now;
        rejected.push(lost);
    }

    events.insert(
        0,
        DomainEvent::StatusChanged(StatusChanged::from_transition(
            &winner_transition,
            awarded_bid.id,
            &awarded_bid.bid_number,
            vec![Recipient::Company(awarded_bid.supplier_company_id)],
        )),
    );
    events.insert(
        0,
        DomainEvent::StatusChanged(StatusChanged::from_transition(
            &rfq_transition,
            awarded_rfq.id,
            &awarded_rfq.reference_number,
            Vec::new(),
        )),
    );

    Ok(AwardSettlement {
        rfq: awarded_rfq,
        rfq_transition,
        winner: awarded_bid,
        winner_transition,
        rejected,
        events,
    })
}
