//! RFQ operations.

use chrono::Utc;
use uuid::Uuid;

use super::{
    Change, ChangeSet, Outcome, ProcurementService, TransitionRequest, TransitionView, WorkflowStore,
    found, names, parse_target, view,
};
use crate::bid::{Bid, BidLifecycle};
use crate::error::WorkflowError;
use crate::machine::{Actor, ActorRole, EntityKind, StatusHistoryEntry, WorkflowState};
use crate::numbering::DocumentKind;
use crate::rfq::{Rfq, RfqChange, RfqInput, RfqStatus, RfqWorkflow};

impl<S: WorkflowStore> ProcurementService<S> {
    pub(super) async fn load_rfq(&self, id: Uuid) -> Result<Rfq, WorkflowError> {
        found(EntityKind::Rfq, id, self.store.find_rfq(id).await?)
    }

    fn rfq_outcome(rfq: Rfq, actor: &Actor, message: String) -> Outcome<Rfq> {
        Outcome {
            available_transitions: names(RfqWorkflow::available_transitions(&rfq, actor)),
            entity: rfq,
            message,
        }
    }

    /// Creates a draft RFQ with the next reference number.
    ///
    /// # Errors
    ///
    /// `Unauthorized` for non-buyers, `Validation` for bad input.
    pub async fn create_rfq(&self, input: RfqInput, actor: &Actor) -> Result<Outcome<Rfq>, WorkflowError> {
        if actor.role != ActorRole::Buyer {
            return Err(WorkflowError::unauthorized("only buyers may create RFQs"));
        }
        actor.require_company()?;
        RfqWorkflow::validate(&input)?;
        let now = Utc::now();
        let reference = self.next_number(DocumentKind::Rfq, now).await?;
        let rfq = RfqWorkflow::create(input, actor, reference, now)?;

        let mut changes = ChangeSet::default();
        changes.history.push(StatusHistoryEntry::created(
            EntityKind::Rfq,
            rfq.id,
            rfq.status.as_str(),
            actor.user_id,
            now,
        ));
        changes.rfqs.push(Change::Insert(rfq.clone()));
        self.commit(changes, Vec::new()).await?;

        tracing::info!(rfq_id = %rfq.id, reference = %rfq.reference_number, "rfq created");
        let message = format!("RFQ {} created", rfq.reference_number);
        Ok(Self::rfq_outcome(rfq, actor, message))
    }

    /// Loads an RFQ the actor may see.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Unauthorized`.
    pub async fn get_rfq(&self, id: Uuid, actor: &Actor) -> Result<Outcome<Rfq>, WorkflowError> {
        let rfq = self.load_rfq(id).await?;
        RfqWorkflow::ensure_visible(&rfq, actor)?;
        let message = format!("RFQ {} is {}", rfq.reference_number, rfq.status);
        Ok(Self::rfq_outcome(rfq, actor, message))
    }

    /// Replaces a draft RFQ's fields and items.
    ///
    /// # Errors
    ///
    /// See [`RfqWorkflow::update_draft`]; `Conflict` on a concurrent write.
    pub async fn update_rfq(
        &self,
        id: Uuid,
        input: RfqInput,
        actor: &Actor,
    ) -> Result<Outcome<Rfq>, WorkflowError> {
        let rfq = self.load_rfq(id).await?;
        let updated = RfqWorkflow::update_draft(&rfq, input, actor, Utc::now())?;

        let mut changes = ChangeSet::default();
        let updated = changes.update_rfq(updated);
        self.commit(changes, Vec::new()).await?;

        let message = format!("RFQ {} updated", updated.reference_number);
        Ok(Self::rfq_outcome(updated, actor, message))
    }

    /// Current RFQ status and the statuses the actor may move it to.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Unauthorized`.
    pub async fn rfq_transitions(&self, id: Uuid, actor: &Actor) -> Result<TransitionView, WorkflowError> {
        let rfq = self.load_rfq(id).await?;
        RfqWorkflow::ensure_visible(&rfq, actor)?;
        Ok(view(rfq.status, RfqWorkflow::available_transitions(&rfq, actor)))
    }

    /// Moves an RFQ to another status. Awarding also settles the bids.
    ///
    /// # Errors
    ///
    /// Any [`WorkflowError`] from the RFQ workflow; `Conflict` on a
    /// concurrent write.
    pub async fn transition_rfq(
        &self,
        id: Uuid,
        request: TransitionRequest,
        actor: &Actor,
    ) -> Result<Outcome<Rfq>, WorkflowError> {
        let target: RfqStatus = parse_target(&request.target_status)?;
        let rfq = self.load_rfq(id).await?;
        let now = Utc::now();

        let change = if request.force {
            RfqWorkflow::force_transition(&rfq, target, actor, &request.metadata, now)?
        } else {
            let bids = self.store.list_bids_for_rfq(rfq.id).await?;
            RfqWorkflow::transition(
                &rfq,
                &bids,
                target,
                actor,
                &request.metadata,
                &self.policy,
                now,
            )?
        };

        let RfqChange {
            rfq: updated,
            transition,
            bids,
            events,
        } = change;
        let mut changes = ChangeSet::default();
        changes.history.push(transition.clone().into_history(rfq.id));
        let updated = changes.update_rfq(updated);
        for bid in bids {
            changes.update_bid(bid);
        }
        self.commit(changes, events).await?;

        tracing::info!(
            rfq_id = %rfq.id,
            from = %transition.from,
            to = %transition.to,
            forced = transition.forced,
            "rfq transitioned"
        );
        let message = format!("RFQ {} moved to {}", updated.reference_number, updated.status);
        Ok(Self::rfq_outcome(updated, actor, message))
    }

    /// Status history of an RFQ, oldest first.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Unauthorized`.
    pub async fn rfq_history(
        &self,
        id: Uuid,
        actor: &Actor,
    ) -> Result<Vec<StatusHistoryEntry>, WorkflowError> {
        let rfq = self.load_rfq(id).await?;
        RfqWorkflow::ensure_visible(&rfq, actor)?;
        self.store.list_history(EntityKind::Rfq, rfq.id).await
    }

    /// Bids on an RFQ that the actor may see: the owner sees every
    /// non-draft bid, a supplier only its own.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Unauthorized`.
    pub async fn list_bids(&self, rfq_id: Uuid, actor: &Actor) -> Result<Vec<Bid>, WorkflowError> {
        let rfq = self.load_rfq(rfq_id).await?;
        RfqWorkflow::ensure_visible(&rfq, actor)?;
        let bids = self.store.list_bids_for_rfq(rfq.id).await?;
        Ok(bids
            .into_iter()
            .filter(|bid| BidLifecycle::ensure_visible(bid, &rfq, actor).is_ok())
            .collect())
    }
}
