//! Purchase order domain types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::WorkflowError;
use crate::machine::{ActorRole, EntityKind, WorkflowState};

/// Purchase order status.
///
/// The valid transitions are:
/// - Draft → PendingApproval | Approved | Cancelled
/// - PendingApproval → Approved | Rejected | Cancelled
/// - Approved → SentToSupplier | Cancelled
/// - SentToSupplier → Acknowledged | Cancelled
/// - Acknowledged → InProgress | Cancelled
/// - InProgress → Delivered
/// - Delivered → Completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    /// Internal, not yet submitted for approval.
    Draft,
    /// Waiting for internal approval.
    PendingApproval,
    /// Approved internally.
    Approved,
    /// Refused internally.
    Rejected,
    /// Issued to the supplier.
    SentToSupplier,
    /// Supplier confirmed receipt.
    Acknowledged,
    /// Supplier is fulfilling it.
    InProgress,
    /// Goods delivered.
    Delivered,
    /// Closed out.
    Completed,
    /// Cancelled by the buyer.
    Cancelled,
}

impl PurchaseOrderStatus {
    /// Returns true if the order may be approved.
    #[must_use]
    pub const fn can_be_approved(self) -> bool {
        matches!(self, Self::Draft | Self::PendingApproval)
    }
}

const BUYER: &[ActorRole] = &[ActorRole::Buyer, ActorRole::Admin];
const SUPPLIER: &[ActorRole] = &[ActorRole::Supplier, ActorRole::Admin];
const EITHER: &[ActorRole] = &[ActorRole::Buyer, ActorRole::Supplier, ActorRole::Admin];

impl WorkflowState for PurchaseOrderStatus {
    const ENTITY: EntityKind = EntityKind::PurchaseOrder;
    const ALL: &'static [Self] = &[
        Self::Draft,
        Self::PendingApproval,
        Self::Approved,
        Self::Rejected,
        Self::SentToSupplier,
        Self::Acknowledged,
        Self::InProgress,
        Self::Delivered,
        Self::Completed,
        Self::Cancelled,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::SentToSupplier => "sent_to_supplier",
            Self::Acknowledged => "acknowledged",
            Self::InProgress => "in_progress",
            Self::Delivered => "delivered",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    fn next_states(self) -> &'static [Self] {
        match self {
            Self::Draft => &[Self::PendingApproval, Self::Approved, Self::Cancelled],
            Self::PendingApproval => &[Self::Approved, Self::Rejected, Self::Cancelled],
            Self::Approved => &[Self::SentToSupplier, Self::Cancelled],
            Self::SentToSupplier => &[Self::Acknowledged, Self::Cancelled],
            Self::Acknowledged => &[Self::InProgress, Self::Cancelled],
            Self::InProgress => &[Self::Delivered],
            Self::Delivered => &[Self::Completed],
            Self::Completed | Self::Rejected | Self::Cancelled => &[],
        }
    }

    fn permitted_roles(self, to: Self) -> &'static [ActorRole] {
        match to {
            Self::Acknowledged | Self::InProgress => SUPPLIER,
            Self::Delivered => EITHER,
            _ => BUYER,
        }
    }
}

impl fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A line copied from the source bid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderItem {
    /// Item identifier.
    pub id: Uuid,
    /// Bid item it was copied from.
    pub bid_item_id: Option<Uuid>,
    /// Description.
    pub description: String,
    /// Quantity.
    pub quantity: Decimal,
    /// Unit price.
    pub unit_price: Decimal,
    /// `quantity * unit_price`.
    pub total_price: Decimal,
    /// Technical specifications.
    pub specifications: Option<serde_json::Value>,
}

/// Reference to an uploaded file. Storage is handled elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    /// File name shown to users.
    pub name: String,
    /// Where the file can be fetched.
    pub url: String,
}

/// Proof of delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryEvidence {
    /// Photos; at most five.
    #[serde(default)]
    pub photos: Vec<AttachmentRef>,
    /// Documents; at most three.
    #[serde(default)]
    pub documents: Vec<AttachmentRef>,
    /// Delivery notes.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Purchase order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    /// PO identifier.
    pub id: Uuid,
    /// `PO-<year>-<seq>`.
    pub po_number: String,
    /// Source bid; one PO per bid.
    pub bid_id: Uuid,
    /// Source RFQ.
    pub rfq_id: Uuid,
    /// Source negotiation, when derived from one.
    pub negotiation_id: Option<Uuid>,
    /// Buying company.
    pub buyer_company_id: Uuid,
    /// Supplying company.
    pub supplier_company_id: Uuid,
    /// User who created the PO.
    pub created_by: Uuid,
    /// Current status.
    pub status: PurchaseOrderStatus,
    /// Total; fixed at creation.
    pub total_amount: Decimal,
    /// ISO currency code.
    pub currency: String,
    /// Amount approved internally.
    pub approved_amount: Option<Decimal>,
    /// Number of approvals recorded.
    pub current_approval_step: i32,
    /// Last approver.
    pub approved_by: Option<Uuid>,
    /// Last approval time.
    pub approved_at: Option<DateTime<Utc>>,
    /// Delivery address.
    pub delivery_address: Option<String>,
    /// Payment terms.
    pub payment_terms: Option<String>,
    /// Notes visible to the supplier.
    pub notes: Option<String>,
    /// Buyer-only notes.
    pub internal_notes: Option<String>,
    /// Terms and conditions.
    pub terms_and_conditions: Option<String>,
    /// Expected delivery date.
    pub expected_delivery_date: Option<NaiveDate>,
    /// Actual delivery time.
    pub actual_delivery_date: Option<DateTime<Utc>>,
    /// When it was sent to the supplier.
    pub sent_at: Option<DateTime<Utc>>,
    /// When the supplier acknowledged it.
    pub acknowledged_at: Option<DateTime<Utc>>,
    /// Reason recorded on internal rejection.
    pub rejection_reason: Option<String>,
    /// Reason recorded on cancellation.
    pub cancellation_reason: Option<String>,
    /// Accepted offer terms, for negotiated orders.
    pub negotiated_terms: Option<serde_json::Value>,
    /// Proof of delivery.
    pub delivery_evidence: Option<DeliveryEvidence>,
    /// Items.
    pub items: Vec<PurchaseOrderItem>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency version.
    pub version: i64,
}

/// Fields that may change after creation through a modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifiableField {
    /// `delivery_address`.
    DeliveryAddress,
    /// `payment_terms`.
    PaymentTerms,
    /// `notes`.
    Notes,
    /// `expected_delivery_date`, as `YYYY-MM-DD`.
    ExpectedDeliveryDate,
    /// `terms_and_conditions`.
    TermsAndConditions,
    /// `internal_notes`.
    InternalNotes,
}

impl ModifiableField {
    /// Returns the field name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DeliveryAddress => "delivery_address",
            Self::PaymentTerms => "payment_terms",
            Self::Notes => "notes",
            Self::ExpectedDeliveryDate => "expected_delivery_date",
            Self::TermsAndConditions => "terms_and_conditions",
            Self::InternalNotes => "internal_notes",
        }
    }

    /// Parses an allow-listed field name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "delivery_address" => Some(Self::DeliveryAddress),
            "payment_terms" => Some(Self::PaymentTerms),
            "notes" => Some(Self::Notes),
            "expected_delivery_date" => Some(Self::ExpectedDeliveryDate),
            "terms_and_conditions" => Some(Self::TermsAndConditions),
            "internal_notes" => Some(Self::InternalNotes),
            _ => None,
        }
    }

    /// Current value on `po`, rendered as text.
    #[must_use]
    pub fn read(self, po: &PurchaseOrder) -> Option<String> {
        match self {
            Self::DeliveryAddress => po.delivery_address.clone(),
            Self::PaymentTerms => po.payment_terms.clone(),
            Self::Notes => po.notes.clone(),
            Self::ExpectedDeliveryDate => po.expected_delivery_date.map(|d| d.to_string()),
            Self::TermsAndConditions => po.terms_and_conditions.clone(),
            Self::InternalNotes => po.internal_notes.clone(),
        }
    }

    /// Checks that `value` is acceptable for the field.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a date that is not `YYYY-MM-DD`.
    pub fn check(self, value: Option<&str>) -> Result<(), WorkflowError> {
        if let (Self::ExpectedDeliveryDate, Some(raw)) = (self, value) {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                WorkflowError::field("new_value", "expected_delivery_date must be YYYY-MM-DD")
            })?;
        }
        Ok(())
    }

    /// Writes `value` to the field on `po`.
    ///
    /// # Errors
    ///
    /// See [`ModifiableField::check`].
    pub fn write(self, po: &mut PurchaseOrder, value: Option<String>) -> Result<(), WorkflowError> {
        self.check(value.as_deref())?;
        match self {
            Self::DeliveryAddress => po.delivery_address = value,
            Self::PaymentTerms => po.payment_terms = value,
            Self::Notes => po.notes = value,
            Self::ExpectedDeliveryDate => {
                po.expected_delivery_date = value
                    .as_deref()
                    .map(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
                    .transpose()
                    .map_err(|e| WorkflowError::field("new_value", e.to_string()))?;
            }
            Self::TermsAndConditions => po.terms_and_conditions = value,
            Self::InternalNotes => po.internal_notes = value,
        }
        Ok(())
    }
}

impl fmt::Display for ModifiableField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Review state of a modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModificationStatus {
    /// Awaiting review.
    Pending,
    /// Applied.
    Approved,
    /// Discarded.
    Rejected,
}

impl ModificationStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// A requested change to one purchase order field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderModification {
    /// Modification identifier.
    pub id: Uuid,
    /// Target purchase order.
    pub purchase_order_id: Uuid,
    /// Field being changed.
    pub field: ModifiableField,
    /// Value when the request was made.
    pub old_value: Option<String>,
    /// Requested value.
    pub new_value: Option<String>,
    /// Why the change is needed.
    pub reason: Option<String>,
    /// Review state.
    pub status: ModificationStatus,
    /// Requesting user.
    pub requested_by: Uuid,
    /// Reviewer.
    pub reviewed_by: Option<Uuid>,
    /// Review time.
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Reviewer notes.
    pub review_notes: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Optimistic concurrency version.
    pub version: i64,
}

/// Payload for requesting a modification.
#[derive(Debug, Clone, Deserialize)]
pub struct ModificationInput {
    /// Field name; must be allow-listed.
    pub field: String,
    /// New value; `null` clears the field.
    #[serde(default)]
    pub new_value: Option<String>,
    /// Why the change is needed.
    #[serde(default)]
    pub reason: Option<String>,
}
