//! Purchase orders and their modification ledger.

pub mod ledger;
pub mod types;
pub mod workflow;

pub use ledger::{ModificationChange, ModificationLedger};
pub use types::{
    AttachmentRef, DeliveryEvidence, ModifiableField, ModificationInput, ModificationStatus,
    PurchaseOrder, PurchaseOrderItem, PurchaseOrderModification, PurchaseOrderStatus,
};
pub use workflow::{
    Derivation, DerivedPurchaseOrder, MAX_DELIVERY_DOCUMENTS, MAX_DELIVERY_PHOTOS,
    PurchaseOrderChange, PurchaseOrderWorkflow,
};
