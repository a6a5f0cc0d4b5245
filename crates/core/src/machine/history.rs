//! Entity kinds and the append-only status history record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kinds of workflow entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Request for quotation.
    Rfq,
    /// Supplier bid.
    Bid,
    /// Buyer/supplier negotiation thread.
    Negotiation,
    /// Negotiation message.
    NegotiationMessage,
    /// Purchase order.
    PurchaseOrder,
    /// Purchase order modification request.
    PurchaseOrderModification,
}

impl EntityKind {
    /// Returns the string representation of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rfq => "rfq",
            Self::Bid => "bid",
            Self::Negotiation => "negotiation",
            Self::NegotiationMessage => "negotiation_message",
            Self::PurchaseOrder => "purchase_order",
            Self::PurchaseOrderModification => "purchase_order_modification",
        }
    }

    /// Parses a kind from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "rfq" => Some(Self::Rfq),
            "bid" => Some(Self::Bid),
            "negotiation" => Some(Self::Negotiation),
            "negotiation_message" => Some(Self::NegotiationMessage),
            "purchase_order" => Some(Self::PurchaseOrder),
            "purchase_order_modification" => Some(Self::PurchaseOrderModification),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of an entity's status history.
///
/// Rows are only ever appended, in the same commit as the status change
/// they describe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    /// Row identifier.
    pub id: Uuid,
    /// Entity kind.
    pub entity_type: EntityKind,
    /// Entity identifier.
    pub entity_id: Uuid,
    /// Previous status; `None` for the creation row.
    pub from_status: Option<String>,
    /// New status.
    pub to_status: String,
    /// Acting user.
    pub changed_by: Uuid,
    /// When the change happened.
    pub changed_at: DateTime<Utc>,
    /// Transition metadata (reason, notes, `forced`).
    pub metadata: serde_json::Value,
}

impl StatusHistoryEntry {
    /// History row recording an entity's initial status.
    #[must_use]
    pub fn created(
        entity_type: EntityKind,
        entity_id: Uuid,
        status: &str,
        changed_by: Uuid,
        changed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_type,
            entity_id,
            from_status: None,
            to_status: status.to_string(),
            changed_by,
            changed_at,
            metadata: serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}
