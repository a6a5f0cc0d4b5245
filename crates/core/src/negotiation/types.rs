//! Negotiation domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::machine::{ActorRole, EntityKind, WorkflowState};

/// Negotiation status.
///
/// - Active → Closed (acceptance) | Cancelled
/// - Closed → Active (new counter-offer) | Cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegotiationStatus {
    /// Messages and offers flowing.
    Active,
    /// An offer was accepted.
    Closed,
    /// Abandoned; no further messages.
    Cancelled,
}

const PARTICIPANTS: &[ActorRole] = &[ActorRole::Buyer, ActorRole::Supplier, ActorRole::Admin];

impl WorkflowState for NegotiationStatus {
    const ENTITY: EntityKind = EntityKind::Negotiation;
    const ALL: &'static [Self] = &[Self::Active, Self::Closed, Self::Cancelled];

    fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
        }
    }

    fn next_states(self) -> &'static [Self] {
        match self {
            Self::Active => &[Self::Closed, Self::Cancelled],
            Self::Closed => &[Self::Active, Self::Cancelled],
            Self::Cancelled => &[],
        }
    }

    fn permitted_roles(self, _to: Self) -> &'static [ActorRole] {
        PARTICIPANTS
    }
}

impl fmt::Display for NegotiationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of negotiation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Plain text; may withdraw the sender's pending offer.
    Text,
    /// New terms; becomes the pending offer.
    CounterOffer,
    /// Accepts the pending offer and closes the negotiation.
    Acceptance,
    /// Rejects the pending offer.
    Rejection,
}

impl MessageType {
    /// Returns the string representation of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::CounterOffer => "counter_offer",
            Self::Acceptance => "acceptance",
            Self::Rejection => "rejection",
        }
    }

    /// Parses a type from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(Self::Text),
            "counter_offer" => Some(Self::CounterOffer),
            "acceptance" => Some(Self::Acceptance),
            "rejection" => Some(Self::Rejection),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolution of a counter-offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    /// Accepted by the counterpart.
    Accepted,
    /// Rejected by the counterpart.
    Rejected,
    /// Withdrawn by its author or superseded.
    Cancelled,
}

impl OfferStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a status from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// A buyer/supplier thread attached to one bid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Negotiation {
    /// Negotiation identifier.
    pub id: Uuid,
    /// Bid under negotiation; one negotiation per bid.
    pub bid_id: Uuid,
    /// RFQ of the bid.
    pub rfq_id: Uuid,
    /// Buyer user who opened it.
    pub initiator_id: Uuid,
    /// Supplier user on the other side.
    pub supplier_user_id: Uuid,
    /// Current status.
    pub status: NegotiationStatus,
    /// The unresolved counter-offer, if any.
    pub pending_offer_message_id: Option<Uuid>,
    /// The counter-offer that was accepted, if any.
    pub accepted_offer_message_id: Option<Uuid>,
    /// Last message time.
    pub last_activity_at: DateTime<Utc>,
    /// When it was last closed.
    pub closed_at: Option<DateTime<Utc>>,
    /// Purchase order derived from it.
    pub purchase_order_id: Option<Uuid>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Optimistic concurrency version.
    pub version: i64,
}

impl Negotiation {
    /// Returns true if `user_id` is one of the two participants.
    #[must_use]
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        user_id == self.initiator_id || user_id == self.supplier_user_id
    }

    /// The participant opposite `user_id`.
    #[must_use]
    pub fn counterpart_of(&self, user_id: Uuid) -> Uuid {
        if user_id == self.initiator_id {
            self.supplier_user_id
        } else {
            self.initiator_id
        }
    }
}

/// One message in a negotiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiationMessage {
    /// Message identifier.
    pub id: Uuid,
    /// Owning negotiation.
    pub negotiation_id: Uuid,
    /// Author.
    pub sender_id: Uuid,
    /// Kind.
    pub message_type: MessageType,
    /// Text body.
    pub content: String,
    /// Offer terms for counter-offers (`total_amount`, `delivery_date`, ...).
    pub offer_data: Option<serde_json::Value>,
    /// Resolution of a counter-offer; `None` while pending.
    pub offer_status: Option<OfferStatus>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Payload for posting a message.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageInput {
    /// Kind.
    pub message_type: MessageType,
    /// Text body.
    #[serde(default)]
    pub content: String,
    /// Offer terms; required for counter-offers.
    #[serde(default)]
    pub offer_data: Option<serde_json::Value>,
    /// Only meaningful on text messages: `cancelled` withdraws the sender's
    /// pending offer.
    #[serde(default)]
    pub offer_status: Option<OfferStatus>,
}

/// A counter-offer whose status was settled by a new message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OfferResolution {
    /// The counter-offer message.
    pub message_id: Uuid,
    /// Its new status.
    pub status: OfferStatus,
}
