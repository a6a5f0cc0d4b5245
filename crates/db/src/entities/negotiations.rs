//! `SeaORM` Entity for negotiations table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::NegotiationStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "negotiations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub bid_id: Uuid,
    pub rfq_id: Uuid,
    pub initiator_id: Uuid,
    pub supplier_user_id: Uuid,
    pub status: NegotiationStatus,
    pub pending_offer_message_id: Option<Uuid>,
    pub accepted_offer_message_id: Option<Uuid>,
    pub last_activity_at: DateTimeWithTimeZone,
    pub closed_at: Option<DateTimeWithTimeZone>,
    pub purchase_order_id: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
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
    #[sea_orm(has_many = "super::negotiation_messages::Entity")]
    NegotiationMessages,
}

impl Related<super::bids::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bids.def()
    }
}

impl Related<super::negotiation_messages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::NegotiationMessages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
