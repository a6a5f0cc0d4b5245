//! Bid domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::machine::{ActorRole, EntityKind, WorkflowState};

/// Upper bound (exclusive) for line and document totals, matching the
/// `NUMERIC(19, 4)` money columns.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xA4C6_8000, 0x0003_8D7E, 0, false, 0);

/// Bid status.
///
/// The valid transitions are:
/// - Draft → Submitted | Withdrawn (supplier)
/// - Submitted → UnderReview | Awarded | Rejected (buyer)
/// - Submitted → Withdrawn (supplier)
/// - UnderReview → Awarded | Rejected (buyer)
/// - UnderReview → Withdrawn (supplier)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    /// Being prepared by the supplier.
    Draft,
    /// Sent to the buyer.
    Submitted,
    /// Buyer is reviewing it.
    UnderReview,
    /// Won.
    Awarded,
    /// Lost or refused.
    Rejected,
    /// Pulled by the supplier.
    Withdrawn,
}

impl BidStatus {
    /// Returns true if items may still change.
    #[must_use]
    pub const fn is_editable(self) -> bool {
        matches!(self, Self::Draft)
    }

    /// Returns true if the bid is in the running for an award.
    #[must_use]
    pub const fn is_awardable(self) -> bool {
        matches!(self, Self::Submitted | Self::UnderReview)
    }

    /// Returns true if a negotiation may be opened on the bid.
    #[must_use]
    pub const fn is_negotiable(self) -> bool {
        matches!(self, Self::Submitted | Self::UnderReview | Self::Awarded)
    }
}

const SUPPLIER: &[ActorRole] = &[ActorRole::Supplier, ActorRole::Admin];
const BUYER: &[ActorRole] = &[ActorRole::Buyer, ActorRole::Admin];

impl WorkflowState for BidStatus {
    const ENTITY: EntityKind = EntityKind::Bid;
    const ALL: &'static [Self] = &[
        Self::Draft,
        Self::Submitted,
        Self::UnderReview,
        Self::Awarded,
        Self::Rejected,
        Self::Withdrawn,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::UnderReview => "under_review",
            Self::Awarded => "awarded",
            Self::Rejected => "rejected",
            Self::Withdrawn => "withdrawn",
        }
    }

    fn next_states(self) -> &'static [Self] {
        match self {
            Self::Draft => &[Self::Submitted, Self::Withdrawn],
            Self::Submitted => &[
                Self::UnderReview,
                Self::Awarded,
                Self::Rejected,
                Self::Withdrawn,
            ],
            Self::UnderReview => &[Self::Awarded, Self::Rejected, Self::Withdrawn],
            Self::Awarded | Self::Rejected | Self::Withdrawn => &[],
        }
    }

    fn permitted_roles(self, to: Self) -> &'static [ActorRole] {
        match to {
            Self::Submitted | Self::Withdrawn => SUPPLIER,
            Self::UnderReview | Self::Awarded | Self::Rejected => BUYER,
            Self::Draft => &[ActorRole::Admin],
        }
    }
}

impl fmt::Display for BidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A priced line of a bid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidItem {
    /// Item identifier.
    pub id: Uuid,
    /// RFQ item being quoted, if any.
    pub rfq_item_id: Option<Uuid>,
    /// Description.
    pub description: String,
    /// Quantity offered.
    pub quantity: Decimal,
    /// Price per unit.
    pub unit_price: Decimal,
    /// `quantity * unit_price`.
    pub total_price: Decimal,
    /// Technical specifications.
    pub specifications: Option<serde_json::Value>,
}

/// Buyer scoring of a submitted bid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidEvaluation {
    /// Technical score, 1 to 10.
    pub technical_score: Decimal,
    /// Commercial score, 1 to 10.
    pub commercial_score: Decimal,
    /// Delivery score, 1 to 10.
    pub delivery_score: Decimal,
    /// Overall score.
    pub total_score: Decimal,
    /// Evaluator notes.
    pub notes: Option<String>,
    /// Evaluator.
    pub evaluated_by: Uuid,
    /// Evaluation time.
    pub evaluated_at: DateTime<Utc>,
}

/// A supplier's response to an RFQ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    /// Bid identifier.
    pub id: Uuid,
    /// `BID-<year>-<seq>`.
    pub bid_number: String,
    /// RFQ being answered.
    pub rfq_id: Uuid,
    /// Bidding supplier company.
    pub supplier_company_id: Uuid,
    /// Supplier user who created the bid.
    pub submitted_by: Uuid,
    /// Current status.
    pub status: BidStatus,
    /// Priced items.
    pub items: Vec<BidItem>,
    /// Sum of item totals.
    pub total_amount: Decimal,
    /// ISO currency code.
    pub currency: String,
    /// Supplier notes.
    pub notes: Option<String>,
    /// First submission time; never overwritten.
    pub submitted_at: Option<DateTime<Utc>>,
    /// Buyer scoring.
    pub evaluation: Option<BidEvaluation>,
    /// Reason recorded on rejection.
    pub rejection_reason: Option<String>,
    /// Award time.
    pub awarded_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency version.
    pub version: i64,
}

/// Priced item payload.
#[derive(Debug, Clone, Deserialize)]
pub struct BidItemInput {
    /// RFQ item being quoted.
    #[serde(default)]
    pub rfq_item_id: Option<Uuid>,
    /// Description.
    pub description: String,
    /// Quantity.
    pub quantity: Decimal,
    /// Unit price.
    pub unit_price: Decimal,
    /// Technical specifications.
    #[serde(default)]
    pub specifications: Option<serde_json::Value>,
}

/// Payload for saving a bid.
#[derive(Debug, Clone, Deserialize)]
pub struct BidInput {
    /// Items; replace the draft's items entirely.
    #[serde(default)]
    pub items: Vec<BidItemInput>,
    /// ISO currency code, `USD` when absent.
    #[serde(default)]
    pub currency: Option<String>,
    /// Supplier notes.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Payload for scoring a bid.
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationInput {
    /// Technical score.
    pub technical_score: Decimal,
    /// Commercial score.
    pub commercial_score: Decimal,
    /// Delivery score.
    pub delivery_score: Decimal,
    /// Explicit overall score; the mean of the three when absent.
    #[serde(default)]
    pub total_score: Option<Decimal>,
    /// Notes.
    #[serde(default)]
    pub notes: Option<String>,
}
