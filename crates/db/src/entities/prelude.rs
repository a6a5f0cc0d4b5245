//! Entity re-exports.

pub use super::bids::Entity as Bids;
pub use super::company_contacts::Entity as CompanyContacts;
pub use super::document_sequences::Entity as DocumentSequences;
pub use super::negotiation_messages::Entity as NegotiationMessages;
pub use super::negotiations::Entity as Negotiations;
pub use super::notifications::Entity as Notifications;
pub use super::purchase_order_modifications::Entity as PurchaseOrderModifications;
pub use super::purchase_order_status_history::Entity as PurchaseOrderStatusHistory;
pub use super::purchase_orders::Entity as PurchaseOrders;
pub use super::rfq_status_history::Entity as RfqStatusHistory;
pub use super::rfqs::Entity as Rfqs;
