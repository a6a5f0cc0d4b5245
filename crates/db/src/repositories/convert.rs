//! Conversions between `SeaORM` models and the core domain types.
//!
//! Reads go `Model -> domain`; writes go `domain -> ActiveModel` with every
//! column `Set`, so the same active model serves inserts and version-checked
//! `update_many` calls.

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as Json;

use procura_core::bid::{Bid, BidEvaluation, BidStatus as CoreBidStatus};
use procura_core::error::WorkflowError;
use procura_core::machine::{EntityKind, StatusHistoryEntry, WorkflowState};
use procura_core::negotiation::{
    MessageType as CoreMessageType, Negotiation, NegotiationMessage,
    NegotiationStatus as CoreNegotiationStatus, OfferStatus as CoreOfferStatus,
};
use procura_core::purchase_order::{
    ModifiableField, ModificationStatus as CoreModificationStatus, PurchaseOrder,
    PurchaseOrderModification, PurchaseOrderStatus as CorePurchaseOrderStatus,
};
use procura_core::rfq::{Rfq, RfqStatus as CoreRfqStatus};

use crate::entities::sea_orm_active_enums::{
    BidStatus, ModificationStatus, NegotiationMessageType, NegotiationStatus, OfferStatus,
    PurchaseOrderStatus, RfqStatus,
};
use crate::entities::{
    bids, negotiation_messages, negotiations, purchase_order_modifications,
    purchase_order_status_history, purchase_orders, rfq_status_history, rfqs,
};

macro_rules! status_map {
    ($db:ident <=> $core:ident { $($variant:ident),+ $(,)? }) => {
        impl From<$core> for $db {
            fn from(status: $core) -> Self {
                match status {
                    $($core::$variant => Self::$variant,)+
                }
            }
        }

        impl From<$db> for $core {
            fn from(status: $db) -> Self {
                match status {
                    $($db::$variant => Self::$variant,)+
                }
            }
        }
    };
}

status_map!(RfqStatus <=> CoreRfqStatus {
    Draft, Published, BiddingOpen, BiddingClosed, UnderEvaluation, Awarded, Completed, Cancelled,
});
status_map!(BidStatus <=> CoreBidStatus {
    Draft, Submitted, UnderReview, Awarded, Rejected, Withdrawn,
});
status_map!(NegotiationStatus <=> CoreNegotiationStatus { Active, Closed, Cancelled });
status_map!(NegotiationMessageType <=> CoreMessageType {
    Text, CounterOffer, Acceptance, Rejection,
});
status_map!(OfferStatus <=> CoreOfferStatus { Accepted, Rejected, Cancelled });
status_map!(PurchaseOrderStatus <=> CorePurchaseOrderStatus {
    Draft, PendingApproval, Approved, Rejected, SentToSupplier, Acknowledged, InProgress,
    Delivered, Completed, Cancelled,
});
status_map!(ModificationStatus <=> CoreModificationStatus { Pending, Approved, Rejected });

/// Maps a database error onto the workflow taxonomy. Unique violations are
/// conflicts; everything else is internal.
pub(crate) fn db_err(err: DbErr) -> WorkflowError {
    if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
        tracing::debug!(detail = %detail, "unique constraint violated");
        return WorkflowError::conflict("a conflicting record already exists");
    }
    tracing::error!(error = %err, "database error");
    WorkflowError::Internal("database error".to_string())
}

fn ts(at: DateTime<Utc>) -> DateTimeWithTimeZone {
    at.into()
}

fn utc(at: DateTimeWithTimeZone) -> DateTime<Utc> {
    at.with_timezone(&Utc)
}

fn to_json<T: Serialize>(value: &T) -> Result<Json, WorkflowError> {
    serde_json::to_value(value)
        .map_err(|e| WorkflowError::Internal(format!("failed to encode column: {e}")))
}

fn from_json<T: DeserializeOwned>(value: Json, column: &str) -> Result<T, WorkflowError> {
    serde_json::from_value(value)
        .map_err(|e| WorkflowError::Internal(format!("corrupt {column} column: {e}")))
}

fn parse_status<S: WorkflowState>(value: &str) -> Result<S, WorkflowError> {
    S::parse(value).ok_or_else(|| {
        WorkflowError::Internal(format!("unknown {} status '{value}'", S::ENTITY))
    })
}

// ============================================================
// RFQ
// ============================================================

pub(crate) fn rfq_active(rfq: &Rfq) -> Result<rfqs::ActiveModel, WorkflowError> {
    Ok(rfqs::ActiveModel {
        id: Set(rfq.id),
        reference_number: Set(rfq.reference_number.clone()),
        title: Set(rfq.title.clone()),
        description: Set(rfq.description.clone()),
        company_id: Set(rfq.company_id),
        created_by: Set(rfq.created_by),
        status: Set(rfq.status.into()),
        bid_deadline: Set(rfq.bid_deadline.map(ts)),
        delivery_date: Set(rfq.delivery_date.map(ts)),
        items: Set(to_json(&rfq.items)?),
        invited_suppliers: Set(to_json(&rfq.invited_suppliers)?),
        awarded_supplier_id: Set(rfq.awarded_supplier_id),
        awarded_bid_id: Set(rfq.awarded_bid_id),
        cancellation_reason: Set(rfq.cancellation_reason.clone()),
        published_at: Set(rfq.published_at.map(ts)),
        awarded_at: Set(rfq.awarded_at.map(ts)),
        created_at: Set(ts(rfq.created_at)),
        updated_at: Set(ts(rfq.updated_at)),
        version: Set(rfq.version),
    })
}

pub(crate) fn rfq_from_model(model: rfqs::Model) -> Result<Rfq, WorkflowError> {
    Ok(Rfq {
        id: model.id,
        reference_number: model.reference_number,
        title: model.title,
        description: model.description,
        company_id: model.company_id,
        created_by: model.created_by,
        status: model.status.into(),
        bid_deadline: model.bid_deadline.map(utc),
        delivery_date: model.delivery_date.map(utc),
        items: from_json(model.items, "rfqs.items")?,
        invited_suppliers: from_json(model.invited_suppliers, "rfqs.invited_suppliers")?,
        awarded_supplier_id: model.awarded_supplier_id,
        awarded_bid_id: model.awarded_bid_id,
        cancellation_reason: model.cancellation_reason,
        published_at: model.published_at.map(utc),
        awarded_at: model.awarded_at.map(utc),
        created_at: utc(model.created_at),
        updated_at: utc(model.updated_at),
        version: model.version,
    })
}

// ============================================================
// BID
// ============================================================

pub(crate) fn bid_active(bid: &Bid) -> Result<bids::ActiveModel, WorkflowError> {
    let evaluation = bid.evaluation.as_ref();
    Ok(bids::ActiveModel {
        id: Set(bid.id),
        bid_number: Set(bid.bid_number.clone()),
        rfq_id: Set(bid.rfq_id),
        supplier_company_id: Set(bid.supplier_company_id),
        submitted_by: Set(bid.submitted_by),
        status: Set(bid.status.into()),
        items: Set(to_json(&bid.items)?),
        total_amount: Set(bid.total_amount),
        currency: Set(bid.currency.clone()),
        notes: Set(bid.notes.clone()),
        submitted_at: Set(bid.submitted_at.map(ts)),
        technical_score: Set(evaluation.map(|e| e.technical_score)),
        commercial_score: Set(evaluation.map(|e| e.commercial_score)),
        delivery_score: Set(evaluation.map(|e| e.delivery_score)),
        total_score: Set(evaluation.map(|e| e.total_score)),
        evaluation_notes: Set(evaluation.and_then(|e| e.notes.clone())),
        evaluated_by: Set(evaluation.map(|e| e.evaluated_by)),
        evaluated_at: Set(evaluation.map(|e| ts(e.evaluated_at))),
        rejection_reason: Set(bid.rejection_reason.clone()),
        awarded_at: Set(bid.awarded_at.map(ts)),
        created_at: Set(ts(bid.created_at)),
        updated_at: Set(ts(bid.updated_at)),
        version: Set(bid.version),
    })
}

pub(crate) fn bid_from_model(model: bids::Model) -> Result<Bid, WorkflowError> {
    let evaluation = match (
        model.technical_score,
        model.commercial_score,
        model.delivery_score,
        model.total_score,
        model.evaluated_by,
        model.evaluated_at,
    ) {
        (
            Some(technical_score),
            Some(commercial_score),
            Some(delivery_score),
            Some(total_score),
            Some(evaluated_by),
            Some(evaluated_at),
        ) => Some(BidEvaluation {
            technical_score,
            commercial_score,
            delivery_score,
            total_score,
            notes: model.evaluation_notes,
            evaluated_by,
            evaluated_at: utc(evaluated_at),
        }),
        _ => None,
    };

    Ok(Bid {
        id: model.id,
        bid_number: model.bid_number,
        rfq_id: model.rfq_id,
        supplier_company_id: model.supplier_company_id,
        submitted_by: model.submitted_by,
        status: model.status.into(),
        items: from_json(model.items, "bids.items")?,
        total_amount: model.total_amount,
        currency: model.currency.trim().to_string(),
        notes: model.notes,
        submitted_at: model.submitted_at.map(utc),
        evaluation,
        rejection_reason: model.rejection_reason,
        awarded_at: model.awarded_at.map(utc),
        created_at: utc(model.created_at),
        updated_at: utc(model.updated_at),
        version: model.version,
    })
}

// ============================================================
// NEGOTIATION
// ============================================================

pub(crate) fn negotiation_active(negotiation: &Negotiation) -> negotiations::ActiveModel {
    negotiations::ActiveModel {
        id: Set(negotiation.id),
        bid_id: Set(negotiation.bid_id),
        rfq_id: Set(negotiation.rfq_id),
        initiator_id: Set(negotiation.initiator_id),
        supplier_user_id: Set(negotiation.supplier_user_id),
        status: Set(negotiation.status.into()),
        pending_offer_message_id: Set(negotiation.pending_offer_message_id),
        accepted_offer_message_id: Set(negotiation.accepted_offer_message_id),
        last_activity_at: Set(ts(negotiation.last_activity_at)),
        closed_at: Set(negotiation.closed_at.map(ts)),
        purchase_order_id: Set(negotiation.purchase_order_id),
        created_at: Set(ts(negotiation.created_at)),
        version: Set(negotiation.version),
    }
}

pub(crate) fn negotiation_from_model(model: negotiations::Model) -> Negotiation {
    Negotiation {
        id: model.id,
        bid_id: model.bid_id,
        rfq_id: model.rfq_id,
        initiator_id: model.initiator_id,
        supplier_user_id: model.supplier_user_id,
        status: model.status.into(),
        pending_offer_message_id: model.pending_offer_message_id,
        accepted_offer_message_id: model.accepted_offer_message_id,
        last_activity_at: utc(model.last_activity_at),
        closed_at: model.closed_at.map(utc),
        purchase_order_id: model.purchase_order_id,
        created_at: utc(model.created_at),
        version: model.version,
    }
}

pub(crate) fn message_active(message: &NegotiationMessage) -> negotiation_messages::ActiveModel {
    negotiation_messages::ActiveModel {
        id: Set(message.id),
        negotiation_id: Set(message.negotiation_id),
        sender_id: Set(message.sender_id),
        message_type: Set(message.message_type.into()),
        content: Set(message.content.clone()),
        offer_data: Set(message.offer_data.clone()),
        offer_status: Set(message.offer_status.map(Into::into)),
        created_at: Set(ts(message.created_at)),
    }
}

pub(crate) fn message_from_model(model: negotiation_messages::Model) -> NegotiationMessage {
    NegotiationMessage {
        id: model.id,
        negotiation_id: model.negotiation_id,
        sender_id: model.sender_id,
        message_type: model.message_type.into(),
        content: model.content,
        offer_data: model.offer_data,
        offer_status: model.offer_status.map(Into::into),
        created_at: utc(model.created_at),
    }
}

// ============================================================
// PURCHASE ORDER
// ============================================================

pub(crate) fn purchase_order_active(
    po: &PurchaseOrder,
) -> Result<purchase_orders::ActiveModel, WorkflowError> {
    Ok(purchase_orders::ActiveModel {
        id: Set(po.id),
        po_number: Set(po.po_number.clone()),
        bid_id: Set(po.bid_id),
        rfq_id: Set(po.rfq_id),
        negotiation_id: Set(po.negotiation_id),
        buyer_company_id: Set(po.buyer_company_id),
        supplier_company_id: Set(po.supplier_company_id),
        created_by: Set(po.created_by),
        status: Set(po.status.into()),
        total_amount: Set(po.total_amount),
        currency: Set(po.currency.clone()),
        approved_amount: Set(po.approved_amount),
        current_approval_step: Set(po.current_approval_step),
        approved_by: Set(po.approved_by),
        approved_at: Set(po.approved_at.map(ts)),
        delivery_address: Set(po.delivery_address.clone()),
        payment_terms: Set(po.payment_terms.clone()),
        notes: Set(po.notes.clone()),
        internal_notes: Set(po.internal_notes.clone()),
        terms_and_conditions: Set(po.terms_and_conditions.clone()),
        expected_delivery_date: Set(po.expected_delivery_date),
        actual_delivery_date: Set(po.actual_delivery_date.map(ts)),
        sent_at: Set(po.sent_at.map(ts)),
        acknowledged_at: Set(po.acknowledged_at.map(ts)),
        rejection_reason: Set(po.rejection_reason.clone()),
        cancellation_reason: Set(po.cancellation_reason.clone()),
        negotiated_terms: Set(po.negotiated_terms.clone()),
        delivery_evidence: Set(po.delivery_evidence.as_ref().map(to_json).transpose()?),
        items: Set(to_json(&po.items)?),
        created_at: Set(ts(po.created_at)),
        updated_at: Set(ts(po.updated_at)),
        version: Set(po.version),
    })
}

pub(crate) fn purchase_order_from_model(
    model: purchase_orders::Model,
) -> Result<PurchaseOrder, WorkflowError> {
    Ok(PurchaseOrder {
        id: model.id,
        po_number: model.po_number,
        bid_id: model.bid_id,
        rfq_id: model.rfq_id,
        negotiation_id: model.negotiation_id,
        buyer_company_id: model.buyer_company_id,
        supplier_company_id: model.supplier_company_id,
        created_by: model.created_by,
        status: model.status.into(),
        total_amount: model.total_amount,
        currency: model.currency.trim().to_string(),
        approved_amount: model.approved_amount,
        current_approval_step: model.current_approval_step,
        approved_by: model.approved_by,
        approved_at: model.approved_at.map(utc),
        delivery_address: model.delivery_address,
        payment_terms: model.payment_terms,
        notes: model.notes,
        internal_notes: model.internal_notes,
        terms_and_conditions: model.terms_and_conditions,
        expected_delivery_date: model.expected_delivery_date,
        actual_delivery_date: model.actual_delivery_date.map(utc),
        sent_at: model.sent_at.map(utc),
        acknowledged_at: model.acknowledged_at.map(utc),
        rejection_reason: model.rejection_reason,
        cancellation_reason: model.cancellation_reason,
        negotiated_terms: model.negotiated_terms,
        delivery_evidence: model
            .delivery_evidence
            .map(|value| from_json(value, "purchase_orders.delivery_evidence"))
            .transpose()?,
        items: from_json(model.items, "purchase_orders.items")?,
        created_at: utc(model.created_at),
        updated_at: utc(model.updated_at),
        version: model.version,
    })
}

pub(crate) fn modification_active(
    modification: &PurchaseOrderModification,
) -> purchase_order_modifications::ActiveModel {
    purchase_order_modifications::ActiveModel {
        id: Set(modification.id),
        purchase_order_id: Set(modification.purchase_order_id),
        field: Set(modification.field.as_str().to_string()),
        old_value: Set(modification.old_value.clone()),
        new_value: Set(modification.new_value.clone()),
        reason: Set(modification.reason.clone()),
        status: Set(modification.status.into()),
        requested_by: Set(modification.requested_by),
        reviewed_by: Set(modification.reviewed_by),
        reviewed_at: Set(modification.reviewed_at.map(ts)),
        review_notes: Set(modification.review_notes.clone()),
        created_at: Set(ts(modification.created_at)),
        version: Set(modification.version),
    }
}

pub(crate) fn modification_from_model(
    model: purchase_order_modifications::Model,
) -> Result<PurchaseOrderModification, WorkflowError> {
    let field = ModifiableField::parse(&model.field).ok_or_else(|| {
        WorkflowError::Internal(format!("unknown modification field '{}'", model.field))
    })?;
    Ok(PurchaseOrderModification {
        id: model.id,
        purchase_order_id: model.purchase_order_id,
        field,
        old_value: model.old_value,
        new_value: model.new_value,
        reason: model.reason,
        status: model.status.into(),
        requested_by: model.requested_by,
        reviewed_by: model.reviewed_by,
        reviewed_at: model.reviewed_at.map(utc),
        review_notes: model.review_notes,
        created_at: utc(model.created_at),
        version: model.version,
    })
}

// ============================================================
// STATUS HISTORY
// ============================================================

/// A history row routed to its table.
pub(crate) enum HistoryRow {
    Rfq(rfq_status_history::ActiveModel),
    PurchaseOrder(purchase_order_status_history::ActiveModel),
}

/// Routes a history entry to its table. Only RFQs and purchase orders keep
/// history; other entities yield `None`.
pub(crate) fn history_active(entry: &StatusHistoryEntry) -> Result<Option<HistoryRow>, WorkflowError> {
    let row = match entry.entity_type {
        EntityKind::Rfq => Some(HistoryRow::Rfq(rfq_status_history::ActiveModel {
            id: Set(entry.id),
            rfq_id: Set(entry.entity_id),
            from_status: Set(entry
                .from_status
                .as_deref()
                .map(parse_status::<CoreRfqStatus>)
                .transpose()?
                .map(Into::into)),
            to_status: Set(parse_status::<CoreRfqStatus>(&entry.to_status)?.into()),
            changed_by: Set(entry.changed_by),
            changed_at: Set(ts(entry.changed_at)),
            metadata: Set(entry.metadata.clone()),
        })),
        EntityKind::PurchaseOrder => Some(HistoryRow::PurchaseOrder(
            purchase_order_status_history::ActiveModel {
                id: Set(entry.id),
                purchase_order_id: Set(entry.entity_id),
                from_status: Set(entry
                    .from_status
                    .as_deref()
                    .map(parse_status::<CorePurchaseOrderStatus>)
                    .transpose()?
                    .map(Into::into)),
                to_status: Set(parse_status::<CorePurchaseOrderStatus>(&entry.to_status)?.into()),
                changed_by: Set(entry.changed_by),
                changed_at: Set(ts(entry.changed_at)),
                metadata: Set(entry.metadata.clone()),
            },
        )),
        EntityKind::Bid
        | EntityKind::Negotiation
        | EntityKind::NegotiationMessage
        | EntityKind::PurchaseOrderModification => None,
    };
    Ok(row)
}

pub(crate) fn rfq_history_from_model(model: rfq_status_history::Model) -> StatusHistoryEntry {
    StatusHistoryEntry {
        id: model.id,
        entity_type: EntityKind::Rfq,
        entity_id: model.rfq_id,
        from_status: model
            .from_status
            .map(|s| CoreRfqStatus::from(s).as_str().to_string()),
        to_status: CoreRfqStatus::from(model.to_status).as_str().to_string(),
        changed_by: model.changed_by,
        changed_at: utc(model.changed_at),
        metadata: model.metadata,
    }
}

pub(crate) fn purchase_order_history_from_model(
    model: purchase_order_status_history::Model,
) -> StatusHistoryEntry {
    StatusHistoryEntry {
        id: model.id,
        entity_type: EntityKind::PurchaseOrder,
        entity_id: model.purchase_order_id,
        from_status: model
            .from_status
            .map(|s| CorePurchaseOrderStatus::from(s).as_str().to_string()),
        to_status: CorePurchaseOrderStatus::from(model.to_status)
            .as_str()
            .to_string(),
        changed_by: model.changed_by,
        changed_at: utc(model.changed_at),
        metadata: model.metadata,
    }
}
