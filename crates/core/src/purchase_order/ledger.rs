//! Field-level modification ledger for issued purchase orders.
//!
//! Rows are append-only. A pending row changes nothing on the order until it
//! is approved; draft orders apply the edit at once and record the row as
//! already approved.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::types::{
    ModifiableField, ModificationInput, ModificationStatus, PurchaseOrder,
    PurchaseOrderModification, PurchaseOrderStatus,
};
use crate::error::WorkflowError;
use crate::events::{DomainEvent, Recipient};
use crate::machine::{Actor, ActorRole, EntityKind, WorkflowState, non_blank};

/// Result of recording or reviewing a modification.
#[derive(Debug, Clone)]
pub struct ModificationChange {
    /// Order with the field applied, when it changed.
    pub purchase_order: Option<PurchaseOrder>,
    /// The ledger row after the change.
    pub modification: PurchaseOrderModification,
    /// Notifications to send after commit.
    pub events: Vec<DomainEvent>,
}

/// Stateless modification ledger.
pub struct ModificationLedger;

impl ModificationLedger {
    /// Records a requested field change.
    ///
    /// # Errors
    ///
    /// - `Validation` for a field outside the allow-list, a malformed date,
    ///   or a value identical to the current one.
    /// - `PreconditionFailed` on a terminal order.
    /// - `Unauthorized` when the actor is not a party allowed to edit the
    ///   field.
    pub fn record(
        po: &PurchaseOrder,
        input: &ModificationInput,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<ModificationChange, WorkflowError> {
        let field = ModifiableField::parse(input.field.trim()).ok_or_else(|| {
            WorkflowError::field(
                "field",
                format!("{} cannot be modified", input.field.trim()),
            )
        })?;

        if po.status.is_terminal() {
            return Err(WorkflowError::precondition(format!(
                "purchase order {} is {} and can no longer be modified",
                po.po_number, po.status
            )));
        }
        Self::ensure_may_request(po, field, actor)?;

        let new_value = non_blank(input.new_value.as_deref());
        field.check(new_value.as_deref())?;
        let old_value = field.read(po);
        if old_value == new_value {
            return Err(WorkflowError::field(
                "new_value",
                format!("{field} already has this value"),
            ));
        }

        let mut modification = PurchaseOrderModification {
            id: Uuid::new_v4(),
            purchase_order_id: po.id,
            field,
            old_value,
            new_value,
            reason: non_blank(input.reason.as_deref()),
            status: ModificationStatus::Pending,
            requested_by: actor.user_id,
            reviewed_by: None,
            reviewed_at: None,
            review_notes: None,
            created_at: now,
            version: 0,
        };

        let purchase_order = if po.status == PurchaseOrderStatus::Draft {
            let mut updated = po.clone();
            field.write(&mut updated, modification.new_value.clone())?;
            updated.updated_at = now;
            modification.status = ModificationStatus::Approved;
            modification.reviewed_by = Some(actor.user_id);
            modification.reviewed_at = Some(now);
            Some(updated)
        } else {
            None
        };

        let recipients = if purchase_order.is_some() {
            Vec::new()
        } else {
            vec![Self::counterparty(po, actor)]
        };
        let events = vec![Self::event(po, &modification, recipients)];

        Ok(ModificationChange {
            purchase_order,
            modification,
            events,
        })
    }

    /// Applies a pending modification to the order.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the row is no longer pending, or the field changed
    ///   since it was requested.
    /// - `Unauthorized` unless the reviewer is buyer-side and not the
    ///   requester (admins excepted).
    pub fn approve(
        po: &PurchaseOrder,
        modification: &PurchaseOrderModification,
        notes: Option<&str>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<ModificationChange, WorkflowError> {
        Self::ensure_reviewable(po, modification, actor)?;
        if po.status.is_terminal() {
            return Err(WorkflowError::precondition(format!(
                "purchase order {} is {} and can no longer be modified",
                po.po_number, po.status
            )));
        }
        if modification.field.read(po) != modification.old_value {
            return Err(WorkflowError::conflict(format!(
                "{} changed since this modification was requested",
                modification.field
            )));
        }

        let mut updated = po.clone();
        modification
            .field
            .write(&mut updated, modification.new_value.clone())?;
        updated.updated_at = now;

        let reviewed = Self::reviewed(modification, ModificationStatus::Approved, notes, actor, now);
        let events = vec![Self::event(
            po,
            &reviewed,
            vec![Recipient::User(modification.requested_by)],
        )];

        Ok(ModificationChange {
            purchase_order: Some(updated),
            modification: reviewed,
            events,
        })
    }

    /// Discards a pending modification.
    ///
    /// # Errors
    ///
    /// Same as [`ModificationLedger::approve`], minus the stale check.
    pub fn reject(
        po: &PurchaseOrder,
        modification: &PurchaseOrderModification,
        notes: Option<&str>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<ModificationChange, WorkflowError> {
        Self::ensure_reviewable(po, modification, actor)?;
        let reviewed = Self::reviewed(modification, ModificationStatus::Rejected, notes, actor, now);
        let events = vec![Self::event(
            po,
            &reviewed,
            vec![Recipient::User(modification.requested_by)],
        )];

        Ok(ModificationChange {
            purchase_order: None,
            modification: reviewed,
            events,
        })
    }

    fn ensure_may_request(
        po: &PurchaseOrder,
        field: ModifiableField,
        actor: &Actor,
    ) -> Result<(), WorkflowError> {
        let allowed = match actor.role {
            ActorRole::Admin => true,
            ActorRole::Buyer => actor.belongs_to(po.buyer_company_id),
            ActorRole::Supplier => {
                actor.belongs_to(po.supplier_company_id)
                    && po.sent_at.is_some()
                    && po.status != PurchaseOrderStatus::Draft
                    && field != ModifiableField::InternalNotes
            }
        };
        if allowed {
            Ok(())
        } else {
            Err(WorkflowError::unauthorized(format!(
                "actor may not modify {field} on purchase order {}",
                po.po_number
            )))
        }
    }

    fn ensure_reviewable(
        po: &PurchaseOrder,
        modification: &PurchaseOrderModification,
        actor: &Actor,
    ) -> Result<(), WorkflowError> {
        if modification.purchase_order_id != po.id {
            return Err(WorkflowError::not_found(
                EntityKind::PurchaseOrderModification,
                modification.id,
            ));
        }
        if modification.status != ModificationStatus::Pending {
            return Err(WorkflowError::conflict(format!(
                "modification {} is already {}",
                modification.id,
                modification.status.as_str()
            )));
        }
        if actor.is_admin() {
            return Ok(());
        }
        if !actor.acts_as(ActorRole::Buyer, po.buyer_company_id) {
            return Err(WorkflowError::unauthorized(
                "only the buying company may review modifications",
            ));
        }
        if actor.user_id == modification.requested_by {
            return Err(WorkflowError::unauthorized(
                "a modification cannot be reviewed by its requester",
            ));
        }
        Ok(())
    }

    fn reviewed(
        modification: &PurchaseOrderModification,
        status: ModificationStatus,
        notes: Option<&str>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> PurchaseOrderModification {
        PurchaseOrderModification {
            status,
            reviewed_by: Some(actor.user_id),
            reviewed_at: Some(now),
            review_notes: non_blank(notes),
            ..modification.clone()
        }
    }

    fn counterparty(po: &PurchaseOrder, actor: &Actor) -> Recipient {
        if actor.role == ActorRole::Supplier {
            Recipient::Company(po.buyer_company_id)
        } else if po.sent_at.is_some() {
            Recipient::Company(po.supplier_company_id)
        } else {
            Recipient::Company(po.buyer_company_id)
        }
    }

    fn event(
        po: &PurchaseOrder,
        modification: &PurchaseOrderModification,
        recipients: Vec<Recipient>,
    ) -> DomainEvent {
        DomainEvent::ModificationChanged {
            purchase_order_id: po.id,
            po_number: po.po_number.clone(),
            modification_id: modification.id,
            field: modification.field,
            status: modification.status,
            recipients,
        }
    }
}
