//! Purchase order and modification operations.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::{
    Change, ChangeSet, Outcome, ProcurementService, TransitionRequest, TransitionView, WorkflowStore,
    found, names, parse_target, view,
};
use crate::bid::Bid;
use crate::error::WorkflowError;
use crate::machine::{Actor, ActorRole, EntityKind, StatusHistoryEntry};
use crate::negotiation::{Negotiation, NegotiationMessage};
use crate::numbering::DocumentKind;
use crate::purchase_order::{
    Derivation, DerivedPurchaseOrder, ModifiableField, ModificationChange, ModificationInput,
    ModificationLedger, PurchaseOrder, PurchaseOrderChange, PurchaseOrderModification,
    PurchaseOrderStatus, PurchaseOrderWorkflow,
};
use crate::rfq::{Rfq, RfqWorkflow};

/// Result of deriving a purchase order.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseOrderCreation {
    /// The order with what the caller may do next.
    #[serde(flatten)]
    pub outcome: Outcome<PurchaseOrder>,
    /// False when an order already existed for the bid.
    pub created: bool,
}

impl<S: WorkflowStore> ProcurementService<S> {
    async fn load_purchase_order(&self, id: Uuid) -> Result<PurchaseOrder, WorkflowError> {
        found(
            EntityKind::PurchaseOrder,
            id,
            self.store.find_purchase_order(id).await?,
        )
    }

    fn purchase_order_outcome(
        po: PurchaseOrder,
        actor: &Actor,
        message: String,
    ) -> Outcome<PurchaseOrder> {
        Outcome {
            available_transitions: names(PurchaseOrderWorkflow::available_transitions(&po, actor)),
            entity: po,
            message,
        }
    }

    /// Returns the bid's existing order, linking the bid's negotiation to it
    /// if that was never recorded.
    async fn existing_order(
        &self,
        po: PurchaseOrder,
        actor: &Actor,
    ) -> Result<PurchaseOrderCreation, WorkflowError> {
        let unlinked = self
            .store
            .find_negotiation_by_bid(po.bid_id)
            .await?
            .and_then(|n| PurchaseOrderWorkflow::link_negotiation(&n, po.id));
        if let Some(negotiation) = unlinked {
            let mut changes = ChangeSet::default();
            changes.update_negotiation(negotiation);
            match self.commit(changes, Vec::new()).await {
                // A concurrent caller linked it first.
                Ok(()) | Err(WorkflowError::Conflict(_)) => {}
                Err(e) => return Err(e),
            }
            tracing::info!(
                purchase_order_id = %po.id,
                bid_id = %po.bid_id,
                "negotiation linked to existing purchase order"
            );
        }

        let message = format!("Purchase order {} already exists", po.po_number);
        Ok(PurchaseOrderCreation {
            outcome: Self::purchase_order_outcome(po, actor, message),
            created: false,
        })
    }

    /// Issues a purchase order from an awarded bid. Idempotent per bid.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` unless the actor is a buyer of the RFQ owner.
    /// - `PreconditionFailed` unless the bid is awarded.
    pub async fn create_purchase_order_from_bid(
        &self,
        bid_id: Uuid,
        actor: &Actor,
    ) -> Result<PurchaseOrderCreation, WorkflowError> {
        let bid = self.load_bid(bid_id).await?;
        let rfq = self.load_rfq(bid.rfq_id).await?;
        RfqWorkflow::ensure_owner(&rfq, actor)?;
        if let Some(existing) = self.store.find_purchase_order_by_bid(bid.id).await? {
            return self.existing_order(existing, actor).await;
        }
        PurchaseOrderWorkflow::ensure_bid_accepting(&bid)?;
        let negotiation = self.store.find_negotiation_by_bid(bid.id).await?;

        self.issue_purchase_order(&bid, &rfq, negotiation.as_ref(), None, actor)
            .await
    }

    /// Issues a purchase order from a negotiation closed on an accepted
    /// offer. Idempotent per bid.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` unless the actor is a buyer of the RFQ owner.
    /// - `PreconditionFailed` unless the negotiation closed on an accepted
    ///   offer.
    pub async fn create_purchase_order_from_negotiation(
        &self,
        negotiation_id: Uuid,
        actor: &Actor,
    ) -> Result<PurchaseOrderCreation, WorkflowError> {
        let negotiation = self.load_negotiation(negotiation_id).await?;
        let bid = self.load_bid(negotiation.bid_id).await?;
        let rfq = self.load_rfq(bid.rfq_id).await?;
        RfqWorkflow::ensure_owner(&rfq, actor)?;
        if let Some(existing) = self.store.find_purchase_order_by_bid(bid.id).await? {
            return self.existing_order(existing, actor).await;
        }
        let offer_id = PurchaseOrderWorkflow::ensure_negotiation_accepting(&negotiation)?;
        let offer = found(
            EntityKind::NegotiationMessage,
            offer_id,
            self.store.find_message(offer_id).await?,
        )?;

        self.issue_purchase_order(&bid, &rfq, Some(&negotiation), Some(&offer), actor)
            .await
    }

    async fn issue_purchase_order(
        &self,
        bid: &Bid,
        rfq: &Rfq,
        negotiation: Option<&Negotiation>,
        accepted_offer: Option<&NegotiationMessage>,
        actor: &Actor,
    ) -> Result<PurchaseOrderCreation, WorkflowError> {
        let now = Utc::now();
        let po_number = self.next_number(DocumentKind::PurchaseOrder, now).await?;
        let DerivedPurchaseOrder {
            purchase_order,
            history,
            negotiation,
            events,
        } = PurchaseOrderWorkflow::derive(
            Derivation {
                bid,
                rfq,
                negotiation,
                accepted_offer,
            },
            actor,
            po_number,
            &self.policy,
            now,
        )?;

        let mut changes = ChangeSet::default();
        changes
            .purchase_orders
            .push(Change::Insert(purchase_order.clone()));
        changes.history.push(history);
        if let Some(negotiation) = negotiation {
            changes.update_negotiation(negotiation);
        }

        match self.commit(changes, events).await {
            Ok(()) => {}
            Err(WorkflowError::Conflict(reason)) => {
                // Lost the race on the bid's unique order.
                return match self.store.find_purchase_order_by_bid(bid.id).await? {
                    Some(existing) => self.existing_order(existing, actor).await,
                    None => Err(WorkflowError::Conflict(reason)),
                };
            }
            Err(e) => return Err(e),
        }

        tracing::info!(
            purchase_order_id = %purchase_order.id,
            po_number = %purchase_order.po_number,
            bid_id = %bid.id,
            status = %purchase_order.status,
            "purchase order created"
        );
        let message = format!("Purchase order {} created", purchase_order.po_number);
        Ok(PurchaseOrderCreation {
            outcome: Self::purchase_order_outcome(purchase_order, actor, message),
            created: true,
        })
    }

    /// Loads a purchase order the actor may see.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Unauthorized`.
    pub async fn get_purchase_order(
        &self,
        id: Uuid,
        actor: &Actor,
    ) -> Result<Outcome<PurchaseOrder>, WorkflowError> {
        let po = self.load_purchase_order(id).await?;
        PurchaseOrderWorkflow::ensure_visible(&po, actor)?;
        let po = Self::redact(po, actor);
        let message = format!("Purchase order {} is {}", po.po_number, po.status);
        Ok(Self::purchase_order_outcome(po, actor, message))
    }

    /// Current order status and the statuses the actor may move it to.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Unauthorized`.
    pub async fn purchase_order_transitions(
        &self,
        id: Uuid,
        actor: &Actor,
    ) -> Result<TransitionView, WorkflowError> {
        let po = self.load_purchase_order(id).await?;
        PurchaseOrderWorkflow::ensure_visible(&po, actor)?;
        Ok(view(po.status, PurchaseOrderWorkflow::available_transitions(&po, actor)))
    }

    /// Moves a purchase order to another status.
    ///
    /// # Errors
    ///
    /// Any [`WorkflowError`] from the purchase order workflow; `Conflict`
    /// on a concurrent write.
    pub async fn transition_purchase_order(
        &self,
        id: Uuid,
        request: TransitionRequest,
        actor: &Actor,
    ) -> Result<Outcome<PurchaseOrder>, WorkflowError> {
        let target: PurchaseOrderStatus = parse_target(&request.target_status)?;
        let po = self.load_purchase_order(id).await?;
        let now = Utc::now();

        let PurchaseOrderChange {
            purchase_order,
            transition,
            events,
        } = if request.force {
            PurchaseOrderWorkflow::force_transition(&po, target, actor, &request.metadata, now)?
        } else {
            PurchaseOrderWorkflow::transition(&po, target, actor, &request.metadata, now)?
        };

        let mut changes = ChangeSet::default();
        changes.history.push(transition.clone().into_history(po.id));
        let updated = changes.update_purchase_order(purchase_order);
        self.commit(changes, events).await?;

        tracing::info!(
            purchase_order_id = %updated.id,
            from = %transition.from,
            to = %transition.to,
            forced = transition.forced,
            "purchase order transitioned"
        );
        let updated = Self::redact(updated, actor);
        let message = format!("Purchase order {} moved to {}", updated.po_number, updated.status);
        Ok(Self::purchase_order_outcome(updated, actor, message))
    }

    /// Status history of a purchase order, oldest first.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Unauthorized`.
    pub async fn purchase_order_history(
        &self,
        id: Uuid,
        actor: &Actor,
    ) -> Result<Vec<StatusHistoryEntry>, WorkflowError> {
        let po = self.load_purchase_order(id).await?;
        PurchaseOrderWorkflow::ensure_visible(&po, actor)?;
        self.store.list_history(EntityKind::PurchaseOrder, po.id).await
    }

    /// Modifications of a purchase order. Suppliers do not see changes to
    /// internal notes.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Unauthorized`.
    pub async fn list_modifications(
        &self,
        id: Uuid,
        actor: &Actor,
    ) -> Result<Vec<PurchaseOrderModification>, WorkflowError> {
        let po = self.load_purchase_order(id).await?;
        PurchaseOrderWorkflow::ensure_visible(&po, actor)?;
        let rows = self.store.list_modifications(po.id).await?;
        Ok(rows
            .into_iter()
            .filter(|m| actor.role != ActorRole::Supplier || m.field != ModifiableField::InternalNotes)
            .collect())
    }

    /// Records a field change request. Draft orders apply it at once.
    ///
    /// # Errors
    ///
    /// See [`ModificationLedger::record`].
    pub async fn request_modification(
        &self,
        id: Uuid,
        input: ModificationInput,
        actor: &Actor,
    ) -> Result<PurchaseOrderModification, WorkflowError> {
        let po = self.load_purchase_order(id).await?;
        PurchaseOrderWorkflow::ensure_visible(&po, actor)?;
        let ModificationChange {
            purchase_order,
            modification,
            events,
        } = ModificationLedger::record(&po, &input, actor, Utc::now())?;

        let mut changes = ChangeSet::default();
        changes
            .modifications
            .push(Change::Insert(modification.clone()));
        if let Some(updated) = purchase_order {
            changes.update_purchase_order(updated);
        }
        self.commit(changes, events).await?;

        tracing::info!(
            purchase_order_id = %po.id,
            modification_id = %modification.id,
            field = %modification.field,
            status = modification.status.as_str(),
            "modification recorded"
        );
        Ok(modification)
    }

    /// Applies a pending modification.
    ///
    /// # Errors
    ///
    /// See [`ModificationLedger::approve`].
    pub async fn approve_modification(
        &self,
        id: Uuid,
        modification_id: Uuid,
        notes: Option<String>,
        actor: &Actor,
    ) -> Result<PurchaseOrderModification, WorkflowError> {
        self.review_modification(id, modification_id, notes, true, actor)
            .await
    }

    /// Discards a pending modification.
    ///
    /// # Errors
    ///
    /// See [`ModificationLedger::reject`].
    pub async fn reject_modification(
        &self,
        id: Uuid,
        modification_id: Uuid,
        notes: Option<String>,
        actor: &Actor,
    ) -> Result<PurchaseOrderModification, WorkflowError> {
        self.review_modification(id, modification_id, notes, false, actor)
            .await
    }

    async fn review_modification(
        &self,
        id: Uuid,
        modification_id: Uuid,
        notes: Option<String>,
        approve: bool,
        actor: &Actor,
    ) -> Result<PurchaseOrderModification, WorkflowError> {
        let po = self.load_purchase_order(id).await?;
        let modification = found(
            EntityKind::PurchaseOrderModification,
            modification_id,
            self.store.find_modification(modification_id).await?,
        )?;
        let now = Utc::now();
        let ModificationChange {
            purchase_order,
            modification,
            events,
        } = if approve {
            ModificationLedger::approve(&po, &modification, notes.as_deref(), actor, now)?
        } else {
            ModificationLedger::reject(&po, &modification, notes.as_deref(), actor, now)?
        };

        let mut changes = ChangeSet::default();
        let modification = changes.update_modification(modification);
        if let Some(updated) = purchase_order {
            changes.update_purchase_order(updated);
        }
        self.commit(changes, events).await?;

        tracing::info!(
            purchase_order_id = %po.id,
            modification_id = %modification.id,
            status = modification.status.as_str(),
            "modification reviewed"
        );
        Ok(modification)
    }

    fn redact(mut po: PurchaseOrder, actor: &Actor) -> PurchaseOrder {
        if actor.role == ActorRole::Supplier {
            po.internal_notes = None;
        }
        po
    }
}
