//! Transition table evaluation.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fmt;
use std::marker::PhantomData;
use uuid::Uuid;

use super::actor::{Actor, ActorRole};
use super::history::{EntityKind, StatusHistoryEntry};
use crate::error::WorkflowError;

/// A status enum with a declared transition table.
///
/// `next_states` lists every target reachable from a status; `permitted_roles`
/// says which roles may perform a given edge. Admins never need to appear in
/// the role table: [`StatusMachine::force_transition`] covers them.
pub trait WorkflowState:
    Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Entity the status belongs to.
    const ENTITY: EntityKind;

    /// Every status, in lifecycle order.
    const ALL: &'static [Self];

    /// Returns the string representation of the status.
    fn as_str(self) -> &'static str;

    /// Targets reachable from this status.
    fn next_states(self) -> &'static [Self];

    /// Roles allowed to take the edge `self -> to`.
    fn permitted_roles(self, to: Self) -> &'static [ActorRole];

    /// Returns true if no further transition is possible.
    fn is_terminal(self) -> bool {
        self.next_states().is_empty()
    }

    /// Parses a status from its string representation.
    fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
    }
}

/// An applied transition, ready to be written to history.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<S> {
    /// Status before the change.
    pub from: S,
    /// Status after the change.
    pub to: S,
    /// Acting user.
    pub actor_id: Uuid,
    /// When the change happened.
    pub at: DateTime<Utc>,
    /// Caller supplied metadata.
    pub metadata: Value,
    /// True when an admin bypassed the transition table.
    pub forced: bool,
}

impl<S: WorkflowState> Transition<S> {
    /// Converts the transition into a history row for `entity_id`.
    #[must_use]
    pub fn into_history(self, entity_id: Uuid) -> StatusHistoryEntry {
        let mut metadata = match self.metadata {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        if self.forced {
            metadata.insert("forced".to_string(), Value::Bool(true));
        }

        StatusHistoryEntry {
            id: Uuid::new_v4(),
            entity_type: S::ENTITY,
            entity_id,
            from_status: Some(self.from.as_str().to_string()),
            to_status: self.to.as_str().to_string(),
            changed_by: self.actor_id,
            changed_at: self.at,
            metadata: Value::Object(metadata),
        }
    }
}

/// Stateless evaluator for a [`WorkflowState`] table.
///
/// Ownership (which company an actor works for) is checked by each entity's
/// workflow; the machine only knows statuses and roles.
#[derive(Debug)]
pub struct StatusMachine<S>(PhantomData<S>);

impl<S: WorkflowState> StatusMachine<S> {
    /// Returns true if the edge exists in the transition table.
    #[must_use]
    pub fn in_table(current: S, target: S) -> bool {
        current.next_states().contains(&target)
    }

    /// Returns true if the edge exists and the actor's role may take it.
    #[must_use]
    pub fn permitted(current: S, target: S, actor: &Actor) -> bool {
        Self::in_table(current, target) && current.permitted_roles(target).contains(&actor.role)
    }

    /// Returns true if the actor may take the edge, either from the table or
    /// as an admin override.
    #[must_use]
    pub fn can_transition(current: S, target: S, actor: &Actor) -> bool {
        Self::permitted(current, target, actor) || Self::can_force(current, target, actor)
    }

    /// Returns true if the actor may force `current -> target`.
    #[must_use]
    pub fn can_force(current: S, target: S, actor: &Actor) -> bool {
        actor.is_admin() && current != target
    }

    /// Targets the actor may move to from `current` through the table.
    ///
    /// Admin overrides are not listed.
    #[must_use]
    pub fn available_transitions(current: S, actor: &Actor) -> Vec<S> {
        current
            .next_states()
            .iter()
            .copied()
            .filter(|target| {
                actor.is_admin() || current.permitted_roles(*target).contains(&actor.role)
            })
            .collect()
    }

    /// Validates an edge against the table and role table.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` if the edge is not in the table and
    /// `Unauthorized` if the actor's role may not take it.
    pub fn check(current: S, target: S, actor: &Actor) -> Result<(), WorkflowError> {
        if !Self::in_table(current, target) {
            return Err(Self::invalid(current, target));
        }
        if !actor.is_admin() && !current.permitted_roles(target).contains(&actor.role) {
            return Err(WorkflowError::unauthorized(format!(
                "{} may not move {} from {current} to {target}",
                actor.role,
                S::ENTITY
            )));
        }
        Ok(())
    }

    /// Validates and records a table transition.
    ///
    /// # Errors
    ///
    /// See [`StatusMachine::check`].
    pub fn transition(
        current: S,
        target: S,
        actor: &Actor,
        metadata: Value,
        at: DateTime<Utc>,
    ) -> Result<Transition<S>, WorkflowError> {
        Self::check(current, target, actor)?;
        Ok(Transition {
            from: current,
            to: target,
            actor_id: actor.user_id,
            at,
            metadata,
            forced: false,
        })
    }

    /// Records an admin override that ignores the transition table.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for non-admins and `InvalidTransition` when
    /// `target` equals `current`.
    pub fn force_transition(
        current: S,
        target: S,
        actor: &Actor,
        metadata: Value,
        at: DateTime<Utc>,
    ) -> Result<Transition<S>, WorkflowError> {
        if !actor.is_admin() {
            return Err(WorkflowError::unauthorized(format!(
                "only admins may force {} transitions",
                S::ENTITY
            )));
        }
        if current == target {
            return Err(Self::invalid(current, target));
        }
        Ok(Transition {
            from: current,
            to: target,
            actor_id: actor.user_id,
            at,
            metadata,
            forced: true,
        })
    }

    /// Builds the `InvalidTransition` error for an edge.
    #[must_use]
    pub fn invalid(current: S, target: S) -> WorkflowError {
        WorkflowError::InvalidTransition {
            entity: S::ENTITY,
            from: current.as_str().to_string(),
            to: target.as_str().to_string(),
        }
    }
}
