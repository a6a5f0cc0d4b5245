//! Property-based tests for the transition engine over every status table.

use chrono::Utc;
use proptest::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use super::{Actor, ActorRole, StatusMachine, WorkflowState};
use crate::bid::BidStatus;
use crate::error::WorkflowError;
use crate::negotiation::NegotiationStatus;
use crate::purchase_order::PurchaseOrderStatus;
use crate::rfq::RfqStatus;

fn arb_actor() -> impl Strategy<Value = Actor> {
    prop_oneof![
        Just(ActorRole::Buyer),
        Just(ActorRole::Supplier),
        Just(ActorRole::Admin),
    ]
    .prop_map(|role| {
        let company = (role != ActorRole::Admin).then(Uuid::new_v4);
        Actor::new(Uuid::new_v4(), company, role)
    })
}

fn arb_pair<S: WorkflowState + 'static>() -> impl Strategy<Value = (S, S)> {
    (
        prop::sample::select(S::ALL),
        prop::sample::select(S::ALL),
    )
}

fn check_table<S: WorkflowState>(from: S, to: S, actor: &Actor) -> Result<(), TestCaseError> {
    let machine_allows = StatusMachine::<S>::can_transition(from, to, actor);

    if actor.is_admin() {
        prop_assert_eq!(machine_allows, from != to);
    } else if machine_allows {
        prop_assert!(from.next_states().contains(&to));
        prop_assert!(from.permitted_roles(to).contains(&actor.role));
    }

    let available = StatusMachine::<S>::available_transitions(from, actor);
    for target in &available {
        prop_assert!(from.next_states().contains(target));
    }

    match StatusMachine::<S>::transition(from, to, actor, Value::Null, Utc::now()) {
        Ok(t) => {
            prop_assert!(!t.forced);
            prop_assert!(available.contains(&to));
        }
        Err(WorkflowError::InvalidTransition { .. }) => {
            prop_assert!(!from.next_states().contains(&to));
        }
        Err(WorkflowError::Unauthorized(_)) => prop_assert!(!actor.is_admin()),
        Err(other) => prop_assert!(false, "unexpected error {other:?}"),
    }

    prop_assert_eq!(S::parse(from.as_str()), Some(from));
    prop_assert_eq!(S::parse(&from.as_str().to_uppercase()), Some(from));
    if from.is_terminal() {
        prop_assert!(available.is_empty());
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_rfq_table((from, to) in arb_pair::<RfqStatus>(), actor in arb_actor()) {
        check_table(from, to, &actor)?;
    }

    #[test]
    fn prop_bid_table((from, to) in arb_pair::<BidStatus>(), actor in arb_actor()) {
        check_table(from, to, &actor)?;
    }

    #[test]
    fn prop_negotiation_table((from, to) in arb_pair::<NegotiationStatus>(), actor in arb_actor()) {
        check_table(from, to, &actor)?;
    }

    #[test]
    fn prop_purchase_order_table((from, to) in arb_pair::<PurchaseOrderStatus>(), actor in arb_actor()) {
        check_table(from, to, &actor)?;
    }

    /// Forcing records the override and never lands on the current status.
    #[test]
    fn prop_force_marks_override((from, to) in arb_pair::<PurchaseOrderStatus>(), actor in arb_actor()) {
        let result = StatusMachine::force_transition(from, to, &actor, Value::Null, Utc::now());
        if actor.is_admin() && from != to {
            let transition = result.unwrap();
            prop_assert!(transition.forced);
            let history = transition.into_history(Uuid::new_v4());
            prop_assert_eq!(history.metadata.get("forced"), Some(&Value::Bool(true)));
        } else {
            prop_assert!(result.is_err());
        }
    }
}
