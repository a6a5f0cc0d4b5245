//! `SeaORM` entities for the procurement schema.

pub mod prelude;

pub mod bids;
pub mod company_contacts;
pub mod document_sequences;
pub mod negotiation_messages;
pub mod negotiations;
pub mod notifications;
pub mod purchase_order_modifications;
pub mod purchase_order_status_history;
pub mod purchase_orders;
pub mod rfq_status_history;
pub mod rfqs;
pub mod sea_orm_active_enums;
