//! Property-based tests for the negotiation protocol.

use chrono::Utc;
use proptest::prelude::*;
use serde_json::json;
use uuid::Uuid;

use crate::bid::BidStatus;
use crate::fixtures::{bid_on, buyer_of, rfq_in};
use crate::machine::Actor;
use crate::negotiation::{
    MessageInput, MessageType, NegotiationMessage, NegotiationProtocol, NegotiationStatus,
    OfferStatus,
};
use crate::rfq::RfqStatus;

#[derive(Debug, Clone, Copy)]
enum Step {
    Offer,
    Accept,
    Reject,
    Withdraw,
    Chat,
}

fn arb_step() -> impl Strategy<Value = (bool, Step)> {
    (
        any::<bool>(),
        prop_oneof![
            Just(Step::Offer),
            Just(Step::Accept),
            Just(Step::Reject),
            Just(Step::Withdraw),
            Just(Step::Chat),
        ],
    )
}

fn input(step: Step) -> MessageInput {
    let (message_type, offer_data, offer_status) = match step {
        Step::Offer => (
            MessageType::CounterOffer,
            Some(json!({ "total_amount": "100.00" })),
            None,
        ),
        Step::Accept => (MessageType::Acceptance, None, None),
        Step::Reject => (MessageType::Rejection, None, None),
        Step::Withdraw => (MessageType::Text, None, Some(OfferStatus::Cancelled)),
        Step::Chat => (MessageType::Text, None, None),
    };
    MessageInput {
        message_type,
        content: "message".to_string(),
        offer_data,
        offer_status,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Whatever the interleaving, at most one counter-offer is unresolved and
    /// the pending pointer always names it.
    #[test]
    fn prop_at_most_one_pending_offer(steps in prop::collection::vec(arb_step(), 1..40)) {
        let rfq = rfq_in(RfqStatus::BiddingClosed);
        let bid = bid_on(&rfq, Uuid::new_v4(), BidStatus::Submitted);
        let buyer = buyer_of(rfq.company_id);
        let supplier = Actor::supplier(bid.submitted_by, bid.supplier_company_id);
        let mut negotiation = NegotiationProtocol::start(&bid, &rfq, &buyer, Utc::now()).unwrap();
        let mut log: Vec<NegotiationMessage> = Vec::new();

        for (by_buyer, step) in steps {
            let actor = if by_buyer { buyer } else { supplier };
            let pending = negotiation
                .pending_offer_message_id
                .and_then(|id| log.iter().find(|m| m.id == id));

            // Refusals (answering your own offer, withdrawing someone
            // else's) leave state untouched.
            let Ok(outcome) = NegotiationProtocol::send_message(
                &negotiation,
                pending,
                input(step),
                &actor,
                Utc::now(),
            ) else {
                continue;
            };

            if let Some(resolution) = outcome.resolution {
                let resolved = log.iter_mut().find(|m| m.id == resolution.message_id).unwrap();
                prop_assert!(resolved.offer_status.is_none());
                resolved.offer_status = Some(resolution.status);
            }
            log.push(outcome.message);
            negotiation = outcome.negotiation;

            let unresolved: Vec<_> = log
                .iter()
                .filter(|m| m.message_type == MessageType::CounterOffer && m.offer_status.is_none())
                .map(|m| m.id)
                .collect();
            prop_assert!(unresolved.len() <= 1);
            prop_assert_eq!(unresolved.first().copied(), negotiation.pending_offer_message_id);
            prop_assert_ne!(negotiation.status, NegotiationStatus::Cancelled);
        }
    }

    /// A closed negotiation always has its closing time set.
    #[test]
    fn prop_closed_has_closed_at(steps in prop::collection::vec(arb_step(), 1..20)) {
        let rfq = rfq_in(RfqStatus::BiddingClosed);
        let bid = bid_on(&rfq, Uuid::new_v4(), BidStatus::UnderReview);
        let buyer = buyer_of(rfq.company_id);
        let supplier = Actor::supplier(bid.submitted_by, bid.supplier_company_id);
        let mut negotiation = NegotiationProtocol::start(&bid, &rfq, &buyer, Utc::now()).unwrap();
        let mut log: Vec<NegotiationMessage> = Vec::new();

        for (by_buyer, step) in steps {
            let actor = if by_buyer { buyer } else { supplier };
            let pending = negotiation
                .pending_offer_message_id
                .and_then(|id| log.iter().find(|m| m.id == id));
            if let Ok(outcome) =
                NegotiationProtocol::send_message(&negotiation, pending, input(step), &actor, Utc::now())
            {
                log.push(outcome.message);
                negotiation = outcome.negotiation;
            }
            if negotiation.status == NegotiationStatus::Closed {
                prop_assert!(negotiation.closed_at.is_some());
            }
        }
    }
}
