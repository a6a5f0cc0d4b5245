//! Core procurement workflow logic for Procura.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Persistence and delivery are reached through the [`WorkflowStore`] and
//! [`notify`] ports.
//!
//! # Modules
//!
//! - `machine` - Generic status machine, actors and status history
//! - `rfq` - Request for quotation lifecycle
//! - `bid` - Supplier bids, evaluation and award settlement
//! - `negotiation` - Message protocol with offer tracking
//! - `purchase_order` - Order derivation, fulfilment and modifications
//! - `service` - Load, validate, commit and dispatch orchestration
//! - `notify` - Notification, email and broadcast ports

pub mod bid;
pub mod error;
pub mod events;
pub mod machine;
pub mod negotiation;
pub mod notify;
pub mod numbering;
pub mod policy;
pub mod purchase_order;
pub mod rfq;
pub mod service;

#[cfg(test)]
mod fixtures;

pub use error::{FieldError, WorkflowError};
pub use events::{DomainEvent, Recipient};
pub use machine::{Actor, ActorRole, EntityKind, StatusHistoryEntry};
pub use policy::WorkflowPolicy;
pub use service::{
    Change, ChangeSet, Outcome, ProcurementService, TransitionRequest, TransitionView,
    WorkflowStore,
};
