//! Store-agnostic orchestration of the procurement workflows.
//!
//! Every operation follows the same shape: load what it needs from the
//! [`WorkflowStore`], compute the change with the pure workflow types,
//! commit the resulting [`ChangeSet`] in one transaction, then hand the
//! collected events to the [`EventDispatcher`]. Nothing is dispatched when
//! the commit fails.

mod bid;
mod negotiation;
mod purchase_order;
mod rfq;
pub mod store;

#[cfg(test)]
mod memory;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::WorkflowError;
use crate::events::DomainEvent;
use crate::machine::{EntityKind, WorkflowState};
use crate::notify::EventDispatcher;
use crate::numbering::{DocumentKind, format_number};
use crate::policy::WorkflowPolicy;

pub use negotiation::PostedMessage;
pub use purchase_order::PurchaseOrderCreation;
pub use store::{Change, ChangeSet, Versioned, WorkflowStore};

/// Request to move an entity to another status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransitionRequest {
    /// Target status name.
    pub target_status: String,
    /// Transition-specific data (reasons, amounts, evidence...).
    #[serde(default)]
    pub metadata: Value,
    /// Admin override of the transition table.
    #[serde(default)]
    pub force: bool,
}

impl TransitionRequest {
    /// A table transition to `target` with `metadata`.
    pub fn to(target: impl Into<String>, metadata: Value) -> Self {
        Self {
            target_status: target.into(),
            metadata,
            force: false,
        }
    }
}

/// An entity together with what the caller may do next.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
    /// The entity after the operation.
    pub entity: T,
    /// Status names the caller may move the entity to.
    pub available_transitions: Vec<String>,
    /// Human readable summary.
    pub message: String,
}

/// Current status and the statuses the caller may move to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionView {
    /// Current status name.
    pub current_status: String,
    /// Reachable status names.
    pub available_transitions: Vec<String>,
}

fn names<S: WorkflowState>(statuses: Vec<S>) -> Vec<String> {
    statuses.into_iter().map(|s| s.as_str().to_string()).collect()
}

fn view<S: WorkflowState>(current: S, available: Vec<S>) -> TransitionView {
    TransitionView {
        current_status: current.as_str().to_string(),
        available_transitions: names(available),
    }
}

fn parse_target<S: WorkflowState>(raw: &str) -> Result<S, WorkflowError> {
    S::parse(raw).ok_or_else(|| {
        WorkflowError::field(
            "target_status",
            format!("unknown {} status '{}'", S::ENTITY, raw.trim()),
        )
    })
}

fn found<T>(entity: EntityKind, id: Uuid, row: Option<T>) -> Result<T, WorkflowError> {
    row.ok_or(WorkflowError::not_found(entity, id))
}

/// Orchestrates every procurement operation over a [`WorkflowStore`].
pub struct ProcurementService<S: WorkflowStore> {
    store: Arc<S>,
    dispatcher: EventDispatcher,
    policy: WorkflowPolicy,
}

impl<S: WorkflowStore> Clone for ProcurementService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            dispatcher: self.dispatcher.clone(),
            policy: self.policy,
        }
    }
}

impl<S: WorkflowStore> ProcurementService<S> {
    /// Creates a service.
    #[must_use]
    pub fn new(store: Arc<S>, dispatcher: EventDispatcher, policy: WorkflowPolicy) -> Self {
        Self {
            store,
            dispatcher,
            policy,
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The active workflow policy.
    #[must_use]
    pub fn policy(&self) -> &WorkflowPolicy {
        &self.policy
    }

    /// Commits `changes` and, only on success, dispatches `events`.
    async fn commit(&self, changes: ChangeSet, events: Vec<DomainEvent>) -> Result<(), WorkflowError> {
        if !changes.is_empty() {
            self.store.commit(changes).await.inspect_err(|e| {
                tracing::warn!(error = %e, "commit failed");
            })?;
        }
        self.dispatcher.dispatch(events);
        Ok(())
    }

    /// Reserves the next document number of `kind`.
    async fn next_number(&self, kind: DocumentKind, now: DateTime<Utc>) -> Result<String, WorkflowError> {
        let year = now.year();
        let sequence = self.store.next_sequence(kind, year).await?;
        Ok(format_number(kind, year, sequence))
    }
}
