//! Bid operations.

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use super::{
    Change, ChangeSet, Outcome, ProcurementService, TransitionRequest, TransitionView, WorkflowStore,
    found, names, parse_target, view,
};
use crate::bid::{Bid, BidChange, BidInput, BidLifecycle, BidStatus, EvaluationInput, evaluate};
use crate::error::WorkflowError;
use crate::machine::{Actor, EntityKind};
use crate::numbering::DocumentKind;
use crate::rfq::Rfq;

impl<S: WorkflowStore> ProcurementService<S> {
    pub(super) async fn load_bid(&self, id: Uuid) -> Result<Bid, WorkflowError> {
        found(EntityKind::Bid, id, self.store.find_bid(id).await?)
    }

    fn bid_outcome(bid: Bid, rfq: &Rfq, actor: &Actor, message: String) -> Outcome<Bid> {
        Outcome {
            available_transitions: names(BidLifecycle::available_transitions(&bid, rfq, actor)),
            entity: bid,
            message,
        }
    }

    /// Creates the supplier's draft bid on an RFQ, or replaces the items of
    /// an existing draft. With `submit` the bid is submitted in the same
    /// commit.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` for non-suppliers, or uninvited suppliers on a
    ///   published RFQ.
    /// - `PreconditionFailed` when the RFQ does not accept bids.
    /// - `Conflict` when the supplier already has a non-draft bid.
    /// - `Validation` for bad input.
    pub async fn save_bid(
        &self,
        rfq_id: Uuid,
        input: BidInput,
        submit: bool,
        actor: &Actor,
    ) -> Result<Outcome<Bid>, WorkflowError> {
        let rfq = self.load_rfq(rfq_id).await?;
        let company_id = BidLifecycle::ensure_can_bid(&rfq, actor)?;
        let existing = BidLifecycle::existing_draft(
            self.store.find_bid_for_supplier(rfq.id, company_id).await?,
        )?;
        let now = Utc::now();

        let (bid, is_new) = match existing {
            Some(draft) => (BidLifecycle::replace_draft(&draft, &rfq, input, actor, now)?, false),
            None => {
                BidLifecycle::validate(&input)?;
                let number = self.next_number(DocumentKind::Bid, now).await?;
                (BidLifecycle::create_draft(&rfq, input, actor, number, now)?, true)
            }
        };

        let (bid, events) = if submit {
            let bids = self.store.list_bids_for_rfq(rfq.id).await?;
            let change = BidLifecycle::transition(
                &bid,
                &rfq,
                &bids,
                BidStatus::Submitted,
                actor,
                &Value::Null,
                &self.policy,
                now,
            )?;
            (change.bid, change.events)
        } else {
            (bid, Vec::new())
        };

        let mut changes = ChangeSet::default();
        let bid = if is_new {
            changes.bids.push(Change::Insert(bid.clone()));
            bid
        } else {
            changes.update_bid(bid)
        };
        self.commit(changes, events).await?;

        tracing::info!(bid_id = %bid.id, rfq_id = %rfq.id, status = %bid.status, "bid saved");
        let message = format!("Bid {} saved as {}", bid.bid_number, bid.status);
        Ok(Self::bid_outcome(bid, &rfq, actor, message))
    }

    /// Loads a bid the actor may see.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Unauthorized`.
    pub async fn get_bid(&self, id: Uuid, actor: &Actor) -> Result<Outcome<Bid>, WorkflowError> {
        let bid = self.load_bid(id).await?;
        let rfq = self.load_rfq(bid.rfq_id).await?;
        BidLifecycle::ensure_visible(&bid, &rfq, actor)?;
        let message = format!("Bid {} is {}", bid.bid_number, bid.status);
        Ok(Self::bid_outcome(bid, &rfq, actor, message))
    }

    /// Current bid status and the statuses the actor may move it to.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Unauthorized`.
    pub async fn bid_transitions(&self, id: Uuid, actor: &Actor) -> Result<TransitionView, WorkflowError> {
        let bid = self.load_bid(id).await?;
        let rfq = self.load_rfq(bid.rfq_id).await?;
        BidLifecycle::ensure_visible(&bid, &rfq, actor)?;
        Ok(view(bid.status, BidLifecycle::available_transitions(&bid, &rfq, actor)))
    }

    /// Moves a bid to another status. Awarding also awards the RFQ and
    /// rejects the competing bids in the same commit.
    ///
    /// # Errors
    ///
    /// Any [`WorkflowError`] from the bid lifecycle; `Conflict` on a
    /// concurrent write.
    pub async fn transition_bid(
        &self,
        id: Uuid,
        request: TransitionRequest,
        actor: &Actor,
    ) -> Result<Outcome<Bid>, WorkflowError> {
        let target: BidStatus = parse_target(&request.target_status)?;
        let bid = self.load_bid(id).await?;
        let rfq = self.load_rfq(bid.rfq_id).await?;
        let now = Utc::now();

        let change = if request.force {
            BidLifecycle::force_transition(&bid, target, actor, &request.metadata, now)?
        } else {
            let bids = self.store.list_bids_for_rfq(rfq.id).await?;
            BidLifecycle::transition(
                &bid,
                &rfq,
                &bids,
                target,
                actor,
                &request.metadata,
                &self.policy,
                now,
            )?
        };

        let BidChange {
            bid: updated,
            transition,
            rfq: rfq_change,
            other_bids,
            events,
        } = change;
        let mut changes = ChangeSet::default();
        let updated = changes.update_bid(updated);
        let rfq = match rfq_change {
            Some((awarded, rfq_transition)) => {
                changes.history.push(rfq_transition.into_history(awarded.id));
                changes.update_rfq(awarded)
            }
            None => rfq,
        };
        for other in other_bids {
            changes.update_bid(other);
        }
        self.commit(changes, events).await?;

        tracing::info!(
            bid_id = %updated.id,
            from = %transition.from,
            to = %transition.to,
            forced = transition.forced,
            "bid transitioned"
        );
        let message = format!("Bid {} moved to {}", updated.bid_number, updated.status);
        Ok(Self::bid_outcome(updated, &rfq, actor, message))
    }

    /// Records the buyer's scores on a submitted bid.
    ///
    /// # Errors
    ///
    /// See [`evaluate`]; `Conflict` on a concurrent write.
    pub async fn evaluate_bid(
        &self,
        id: Uuid,
        input: EvaluationInput,
        actor: &Actor,
    ) -> Result<Outcome<Bid>, WorkflowError> {
        let bid = self.load_bid(id).await?;
        let rfq = self.load_rfq(bid.rfq_id).await?;
        let evaluated = evaluate(&bid, &rfq, &input, actor, Utc::now())?;

        let mut changes = ChangeSet::default();
        let evaluated = changes.update_bid(evaluated);
        self.commit(changes, Vec::new()).await?;

        let message = format!("Bid {} evaluated", evaluated.bid_number);
        Ok(Self::bid_outcome(evaluated, &rfq, actor, message))
    }
}
