//! RFQ domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::machine::{ActorRole, EntityKind, WorkflowState};

/// RFQ status.
///
/// The valid transitions are:
/// - Draft → Published | Cancelled
/// - Published → BiddingOpen | Cancelled
/// - BiddingOpen → BiddingClosed | Awarded | Cancelled
/// - BiddingClosed → UnderEvaluation | Awarded | Cancelled
/// - UnderEvaluation → Awarded | Cancelled
/// - Awarded → Completed | Cancelled
/// - Cancelled → Draft (reopen)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfqStatus {
    /// Being prepared by the buyer; editable.
    Draft,
    /// Visible to invited suppliers.
    Published,
    /// Any supplier may bid.
    BiddingOpen,
    /// No further bids accepted.
    BiddingClosed,
    /// Buyer is scoring bids.
    UnderEvaluation,
    /// A supplier has won.
    Awarded,
    /// Fulfilled.
    Completed,
    /// Withdrawn by the buyer; may be reopened as a draft.
    Cancelled,
}

impl RfqStatus {
    /// Returns true if the RFQ may still be edited.
    #[must_use]
    pub const fn is_editable(self) -> bool {
        matches!(self, Self::Draft)
    }

    /// Returns true if suppliers may save or submit bids.
    #[must_use]
    pub const fn accepts_bids(self) -> bool {
        matches!(self, Self::Published | Self::BiddingOpen)
    }

    /// Returns true if a bid may be awarded from this status.
    #[must_use]
    pub const fn is_awardable(self) -> bool {
        matches!(
            self,
            Self::BiddingOpen | Self::BiddingClosed | Self::UnderEvaluation
        )
    }
}

const BUYER_OR_ADMIN: &[ActorRole] = &[ActorRole::Buyer, ActorRole::Admin];

impl WorkflowState for RfqStatus {
    const ENTITY: EntityKind = EntityKind::Rfq;
    const ALL: &'static [Self] = &[
        Self::Draft,
        Self::Published,
        Self::BiddingOpen,
        Self::BiddingClosed,
        Self::UnderEvaluation,
        Self::Awarded,
        Self::Completed,
        Self::Cancelled,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::BiddingOpen => "bidding_open",
            Self::BiddingClosed => "bidding_closed",
            Self::UnderEvaluation => "under_evaluation",
            Self::Awarded => "awarded",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    fn next_states(self) -> &'static [Self] {
        match self {
            Self::Draft => &[Self::Published, Self::Cancelled],
            Self::Published => &[Self::BiddingOpen, Self::Cancelled],
            Self::BiddingOpen => &[Self::BiddingClosed, Self::Awarded, Self::Cancelled],
            Self::BiddingClosed => &[Self::UnderEvaluation, Self::Awarded, Self::Cancelled],
            Self::UnderEvaluation => &[Self::Awarded, Self::Cancelled],
            Self::Awarded => &[Self::Completed, Self::Cancelled],
            Self::Cancelled => &[Self::Draft],
            Self::Completed => &[],
        }
    }

    fn permitted_roles(self, _to: Self) -> &'static [ActorRole] {
        BUYER_OR_ADMIN
    }
}

impl fmt::Display for RfqStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A line item the buyer wants quoted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfqItem {
    /// Item identifier.
    pub id: Uuid,
    /// Short name.
    pub name: String,
    /// Longer description.
    pub description: Option<String>,
    /// Requested quantity, always positive.
    pub quantity: Decimal,
    /// Unit of measure.
    pub unit: String,
    /// Free-form technical specifications.
    pub specifications: Option<serde_json::Value>,
}

/// Request for quotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rfq {
    /// RFQ identifier.
    pub id: Uuid,
    /// `RFQ-<year>-<seq>`.
    pub reference_number: String,
    /// Title.
    pub title: String,
    /// Description.
    pub description: Option<String>,
    /// Owning buyer company.
    pub company_id: Uuid,
    /// Buyer who created the RFQ.
    pub created_by: Uuid,
    /// Current status.
    pub status: RfqStatus,
    /// Last moment bids are expected.
    pub bid_deadline: Option<DateTime<Utc>>,
    /// Requested delivery date.
    pub delivery_date: Option<DateTime<Utc>>,
    /// Requested items.
    pub items: Vec<RfqItem>,
    /// Supplier companies invited while `published`.
    pub invited_suppliers: Vec<Uuid>,
    /// Winning supplier company.
    pub awarded_supplier_id: Option<Uuid>,
    /// Winning bid.
    pub awarded_bid_id: Option<Uuid>,
    /// Reason given when cancelled.
    pub cancellation_reason: Option<String>,
    /// First publication time.
    pub published_at: Option<DateTime<Utc>>,
    /// Award time.
    pub awarded_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency version.
    pub version: i64,
}

impl Rfq {
    /// Returns true if `supplier_company_id` was invited.
    #[must_use]
    pub fn is_invited(&self, supplier_company_id: Uuid) -> bool {
        self.invited_suppliers.contains(&supplier_company_id)
    }
}

/// Item payload for creating or editing an RFQ.
#[derive(Debug, Clone, Deserialize)]
pub struct RfqItemInput {
    /// Short name.
    pub name: String,
    /// Longer description.
    #[serde(default)]
    pub description: Option<String>,
    /// Requested quantity.
    pub quantity: Decimal,
    /// Unit of measure.
    pub unit: String,
    /// Technical specifications.
    #[serde(default)]
    pub specifications: Option<serde_json::Value>,
}

/// Payload for creating or editing an RFQ.
#[derive(Debug, Clone, Deserialize)]
pub struct RfqInput {
    /// Title.
    pub title: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Bid deadline; defaulted on publish when absent.
    #[serde(default)]
    pub bid_deadline: Option<DateTime<Utc>>,
    /// Requested delivery date.
    #[serde(default)]
    pub delivery_date: Option<DateTime<Utc>>,
    /// Items; fully replace the current items on edit.
    #[serde(default)]
    pub items: Vec<RfqItemInput>,
    /// Supplier companies to invite.
    #[serde(default)]
    pub invited_suppliers: Vec<Uuid>,
}
