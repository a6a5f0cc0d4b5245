//! `SeaORM` Entity for bids table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::BidStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "bids")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub bid_number: String,
    pub rfq_id: Uuid,
    pub supplier_company_id: Uuid,
    pub submitted_by: Uuid,
    pub status: BidStatus,
    #[sea_orm(column_type = "JsonBinary")]
    pub items: Json,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_amount: Decimal,
    pub currency: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub submitted_at: Option<DateTimeWithTimeZone>,
    #[sea_orm(column_type = "Decimal(Some((5, 2)))", nullable)]
    pub technical_score: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((5, 2)))", nullable)]
    pub commercial_score: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((5, 2)))", nullable)]
    pub delivery_score: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((5, 2)))", nullable)]
    pub total_score: Option<Decimal>,
    #[sea_orm(column_type = "Text", nullable)]
    pub evaluation_notes: Option<String>,
    pub evaluated_by: Option<Uuid>,
    pub evaluated_at: Option<DateTimeWithTimeZone>,
    #[sea_orm(column_type = "Text", nullable)]
    pub rejection_reason: Option<String>,
    pub awarded_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub version: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::rfqs::Entity",
        from = "Column::RfqId",
        to = "super::rfqs::Column::Id"
    )]
    Rfqs,
    #[sea_orm(has_one = "super::negotiations::Entity")]
    Negotiations,
}

impl Related<super::rfqs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rfqs.def()
    }
}

impl Related<super::negotiations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Negotiations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
