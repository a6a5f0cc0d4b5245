//! `SeaORM` Entity for rfqs table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::RfqStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "rfqs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub reference_number: String,
    #[sea_orm(column_type = "Text")]
    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub company_id: Uuid,
    pub created_by: Uuid,
    pub status: RfqStatus,
    pub bid_deadline: Option<DateTimeWithTimeZone>,
    pub delivery_date: Option<DateTimeWithTimeZone>,
    #[sea_orm(column_type = "JsonBinary")]
    pub items: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub invited_suppliers: Json,
    pub awarded_supplier_id: Option<Uuid>,
    pub awarded_bid_id: Option<Uuid>,
    #[sea_orm(column_type = "Text", nullable)]
    pub cancellation_reason: Option<String>,
    pub published_at: Option<DateTimeWithTimeZone>,
    pub awarded_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub version: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::bids::Entity")]
    Bids,
    #[sea_orm(has_many = "super::rfq_status_history::Entity")]
    RfqStatusHistory,
}

impl Related<super::bids::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bids.def()
    }
}

impl Related<super::rfq_status_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RfqStatusHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
