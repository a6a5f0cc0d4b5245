//! Generic status machine shared by RFQs, bids, negotiations and purchase
//! orders.
//!
//! Each entity declares its transition table and role table by implementing
//! [`WorkflowState`]; [`StatusMachine`] evaluates them for an [`Actor`].

pub mod actor;
pub mod engine;
pub mod history;
pub mod metadata;

#[cfg(test)]
mod engine_props;

pub use actor::{Actor, ActorRole};
pub use engine::{StatusMachine, Transition, WorkflowState};
pub use history::{EntityKind, StatusHistoryEntry};
pub use metadata::{non_blank, read_metadata};
