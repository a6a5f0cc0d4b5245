//! `SeaORM` Entity for purchase_orders table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::PurchaseOrderStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub po_number: String,
    #[sea_orm(unique)]
    pub bid_id: Uuid,
    pub rfq_id: Uuid,
    pub negotiation_id: Option<Uuid>,
    pub buyer_company_id: Uuid,
    pub supplier_company_id: Uuid,
    pub created_by: Uuid,
    pub status: PurchaseOrderStatus,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_amount: Decimal,
    pub currency: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub approved_amount: Option<Decimal>,
    pub current_approval_step: i32,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTimeWithTimeZone>,
    #[sea_orm(column_type = "Text", nullable)]
    pub delivery_address: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub payment_terms: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub internal_notes: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub terms_and_conditions: Option<String>,
    pub expected_delivery_date: Option<Date>,
    pub actual_delivery_date: Option<DateTimeWithTimeZone>,
    pub sent_at: Option<DateTimeWithTimeZone>,
    pub acknowledged_at: Option<DateTimeWithTimeZone>,
    #[sea_orm(column_type = "Text", nullable)]
    pub rejection_reason: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub cancellation_reason: Option<String>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub negotiated_terms: Option<Json>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub delivery_evidence: Option<Json>,
    #[sea_orm(column_type = "JsonBinary")]
    pub items: Json,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub version: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bids::Entity",
        from = "Column::BidId",
        to = "super::bids::Column::Id"
    )]
    Bids,
    #[sea_orm(has_many = "super::purchase_order_modifications::Entity")]
    PurchaseOrderModifications,
    #[sea_orm(has_many = "super::purchase_order_status_history::Entity")]
    PurchaseOrderStatusHistory,
}

impl Related<super::bids::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bids.def()
    }
}

impl Related<super::purchase_order_modifications::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseOrderModifications.def()
    }
}

impl Related<super::purchase_order_status_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseOrderStatusHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
