//! Domain events emitted by the workflows.
//!
//! Events are collected while a change is computed and handed to the
//! [`EventDispatcher`](crate::notify::EventDispatcher) only after the change
//! has been committed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::machine::{EntityKind, Transition, WorkflowState};
use crate::negotiation::MessageType;
use crate::purchase_order::{ModifiableField, ModificationStatus};

/// Who should hear about an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Recipient {
    /// A single user.
    User(Uuid),
    /// Everyone at a company.
    Company(Uuid),
}

/// A status change worth telling someone about.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChanged {
    /// Entity kind.
    pub entity: EntityKind,
    /// Entity identifier.
    pub entity_id: Uuid,
    /// Document number or other human reference.
    pub reference: String,
    /// Previous status.
    pub from: String,
    /// New status.
    pub to: String,
    /// Acting user.
    pub actor_id: Uuid,
    /// Admin override.
    pub forced: bool,
    /// Free text reason, when the transition carried one.
    pub reason: Option<String>,
    /// Parties to notify.
    pub recipients: Vec<Recipient>,
}

impl StatusChanged {
    /// Builds the event from an applied transition.
    #[must_use]
    pub fn from_transition<S: WorkflowState>(
        transition: &Transition<S>,
        entity_id: Uuid,
        reference: &str,
        recipients: Vec<Recipient>,
    ) -> Self {
        let reason = ["reason", "cancellation_reason", "rejection_reason"]
            .iter()
            .find_map(|key| transition.metadata.get(*key))
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);

        Self {
            entity: S::ENTITY,
            entity_id,
            reference: reference.to_string(),
            from: transition.from.as_str().to_string(),
            to: transition.to.as_str().to_string(),
            actor_id: transition.actor_id,
            forced: transition.forced,
            reason,
            recipients,
        }
    }
}

/// Events produced by workflow operations.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    /// An RFQ, bid, negotiation or purchase order changed status.
    StatusChanged(StatusChanged),

    /// A supplier company was invited to bid.
    SupplierInvited {
        /// RFQ identifier.
        rfq_id: Uuid,
        /// RFQ number.
        rfq_number: String,
        /// RFQ title.
        title: String,
        /// Invited company.
        supplier_company_id: Uuid,
        /// Bid deadline, if any.
        bid_deadline: Option<DateTime<Utc>>,
    },

    /// A negotiation message was posted.
    MessageSent {
        /// Negotiation identifier.
        negotiation_id: Uuid,
        /// Message identifier.
        message_id: Uuid,
        /// Bid under negotiation.
        bid_id: Uuid,
        /// Message kind.
        message_type: MessageType,
        /// Author.
        sender_id: Uuid,
        /// The other participant.
        recipient_id: Uuid,
        /// Negotiation status after the message.
        negotiation_status: String,
    },

    /// A purchase order was derived from an awarded bid or a closed
    /// negotiation.
    PurchaseOrderCreated {
        /// Purchase order identifier.
        purchase_order_id: Uuid,
        /// PO number.
        po_number: String,
        /// Initial status.
        status: String,
        /// Buying company.
        buyer_company_id: Uuid,
        /// Supplying company.
        supplier_company_id: Uuid,
        /// Order total.
        total_amount: Decimal,
        /// ISO currency code.
        currency: String,
    },

    /// A purchase order modification was requested or reviewed.
    ModificationChanged {
        /// Purchase order identifier.
        purchase_order_id: Uuid,
        /// PO number.
        po_number: String,
        /// Modification identifier.
        modification_id: Uuid,
        /// Field being changed.
        field: ModifiableField,
        /// Modification status after the change.
        status: ModificationStatus,
        /// Parties to notify.
        recipients: Vec<Recipient>,
    },
}

impl DomainEvent {
    /// Short name used in logs and broadcast event types.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StatusChanged(_) => "status_changed",
            Self::SupplierInvited { .. } => "supplier_invited",
            Self::MessageSent { .. } => "message_sent",
            Self::PurchaseOrderCreated { .. } => "purchase_order_created",
            Self::ModificationChanged { .. } => "modification_changed",
        }
    }
}
