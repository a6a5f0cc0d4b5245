//! `SeaORM` Entity for negotiation_messages table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{NegotiationMessageType, OfferStatus};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "negotiation_messages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub negotiation_id: Uuid,
    pub sender_id: Uuid,
    pub message_type: NegotiationMessageType,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub offer_data: Option<Json>,
    pub offer_status: Option<OfferStatus>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::negotiations::Entity",
        from = "Column::NegotiationId",
        to = "super::negotiations::Column::Id"
    )]
    Negotiations,
}

impl Related<super::negotiations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Negotiations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
