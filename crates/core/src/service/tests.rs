//! End-to-end workflow tests over the in-memory store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Datelike, Duration, Utc};
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use uuid::Uuid;

use super::memory::MemoryStore;
use super::{ProcurementService, TransitionRequest};
use crate::bid::{BidInput, BidItemInput, BidStatus, EvaluationInput};
use crate::error::WorkflowError;
use crate::machine::{Actor, EntityKind};
use crate::negotiation::{MessageInput, MessageType, NegotiationStatus, OfferStatus};
use crate::notify::{
    EventDispatcher, NewNotification, NoopSink, NotificationSink, NotificationType, NotifyError,
};
use crate::policy::WorkflowPolicy;
use crate::purchase_order::{ModificationInput, ModificationStatus, PurchaseOrderStatus};
use crate::rfq::{RfqInput, RfqItemInput, RfqStatus};

#[derive(Default)]
struct RecordingSink {
    seen: Mutex<Vec<NewNotification>>,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn create_notification(&self, notification: NewNotification) -> Result<(), NotifyError> {
        self.seen.lock().unwrap().push(notification);
        Ok(())
    }
}

struct World {
    service: ProcurementService<MemoryStore>,
    store: Arc<MemoryStore>,
    sink: Arc<RecordingSink>,
    buyer: Actor,
    supplier: Actor,
    rival: Actor,
    admin: Actor,
}

impl World {
    fn new() -> Self {
        Self::with_policy(WorkflowPolicy::default())
    }

    fn with_policy(policy: WorkflowPolicy) -> Self {
        let store = Arc::new(MemoryStore::default());
        let sink = Arc::new(RecordingSink::default());
        let dispatcher =
            EventDispatcher::new(sink.clone(), Arc::new(NoopSink), Arc::new(NoopSink));
        Self {
            service: ProcurementService::new(store.clone(), dispatcher, policy),
            store,
            sink,
            buyer: Actor::buyer(Uuid::new_v4(), Uuid::new_v4()),
            supplier: Actor::supplier(Uuid::new_v4(), Uuid::new_v4()),
            rival: Actor::supplier(Uuid::new_v4(), Uuid::new_v4()),
            admin: Actor::admin(Uuid::new_v4()),
        }
    }

    fn supplier_company(&self) -> Uuid {
        self.supplier.company_id.unwrap()
    }

    async fn notifications(&self) -> Vec<NewNotification> {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        self.sink.seen.lock().unwrap().clone()
    }

    /// Draft RFQ with one item and both suppliers invited.
    async fn draft(&self) -> Uuid {
        let input = RfqInput {
            title: "Steel brackets".to_string(),
            description: None,
            bid_deadline: None,
            delivery_date: Some(Utc::now() + Duration::days(45)),
            items: vec![RfqItemInput {
                name: "Bracket".to_string(),
                description: None,
                quantity: dec!(100),
                unit: "pcs".to_string(),
                specifications: None,
            }],
            invited_suppliers: vec![
                self.supplier.company_id.unwrap(),
                self.rival.company_id.unwrap(),
            ],
        };
        self.service.create_rfq(input, &self.buyer).await.unwrap().entity.id
    }

    async fn move_rfq(&self, id: Uuid, target: &str) {
        self.service
            .transition_rfq(id, TransitionRequest::to(target, Value::Null), &self.buyer)
            .await
            .unwrap();
    }

    async fn open(&self) -> Uuid {
        let id = self.draft().await;
        self.move_rfq(id, "published").await;
        self.move_rfq(id, "bidding_open").await;
        id
    }

    async fn submit(&self, rfq_id: Uuid, actor: &Actor, unit_price: rust_decimal::Decimal) -> Uuid {
        self.service
            .save_bid(rfq_id, bid_input(unit_price), true, actor)
            .await
            .unwrap()
            .entity
            .id
    }
}

fn bid_input(unit_price: rust_decimal::Decimal) -> BidInput {
    BidInput {
        items: vec![BidItemInput {
            rfq_item_id: None,
            description: "Bracket, galvanised".to_string(),
            quantity: dec!(100),
            unit_price,
            specifications: None,
        }],
        currency: Some("eur".to_string()),
        notes: None,
    }
}

fn award_request(supplier_company_id: Uuid) -> TransitionRequest {
    TransitionRequest::to(
        "awarded",
        json!({ "awarded_supplier_id": supplier_company_id }),
    )
}

#[tokio::test]
async fn test_publish_defaults_deadline_and_numbers_documents() {
    let world = World::new();
    let id = world.draft().await;
    let before = Utc::now();
    world.move_rfq(id, "published").await;

    let rfq = world.service.get_rfq(id, &world.buyer).await.unwrap().entity;
    assert_eq!(rfq.status, RfqStatus::Published);
    assert_eq!(rfq.reference_number, format!("RFQ-{}-0001", before.year()));
    let deadline = rfq.bid_deadline.unwrap();
    assert!(deadline >= before + Duration::days(14));
    assert!(deadline <= Utc::now() + Duration::days(14));

    let history = world.service.rfq_history(id, &world.buyer).await.unwrap();
    let steps: Vec<_> = history
        .iter()
        .map(|h| (h.from_status.clone(), h.to_status.clone()))
        .collect();
    assert_eq!(
        steps,
        vec![
            (None, "draft".to_string()),
            (Some("draft".to_string()), "published".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_draft_cannot_jump_to_awarded_unless_forced() {
    let world = World::new();
    let id = world.draft().await;

    let view = world.service.rfq_transitions(id, &world.buyer).await.unwrap();
    assert!(!view.available_transitions.contains(&"awarded".to_string()));
    let err = world
        .service
        .transition_rfq(id, award_request(world.supplier_company()), &world.buyer)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidTransition { .. }));

    let forced = world
        .service
        .transition_rfq(
            id,
            TransitionRequest {
                target_status: "awarded".to_string(),
                metadata: json!({ "note": "migrated" }),
                force: true,
            },
            &world.admin,
        )
        .await
        .unwrap();
    assert_eq!(forced.entity.status, RfqStatus::Awarded);
    let history = world.service.rfq_history(id, &world.admin).await.unwrap();
    assert_eq!(history.last().unwrap().metadata["forced"], true);
}

#[tokio::test]
async fn test_unknown_target_status_is_validation() {
    let world = World::new();
    let id = world.draft().await;
    let err = world
        .service
        .transition_rfq(id, TransitionRequest::to("shipped", Value::Null), &world.buyer)
        .await
        .unwrap_err();
    assert_eq!(err.field_errors()[0].field, "target_status");
}

#[tokio::test]
async fn test_saving_twice_keeps_one_bid_with_latest_items() {
    let world = World::new();
    let rfq_id = world.open().await;

    let first = world
        .service
        .save_bid(rfq_id, bid_input(dec!(4)), false, &world.supplier)
        .await
        .unwrap()
        .entity;
    let second = world
        .service
        .save_bid(rfq_id, bid_input(dec!(5)), false, &world.supplier)
        .await
        .unwrap()
        .entity;

    assert_eq!(first.id, second.id);
    assert_eq!(first.bid_number, second.bid_number);
    let state = world.store.snapshot();
    assert_eq!(state.bids.len(), 1);
    assert_eq!(state.bids[0].items.len(), 1);
    assert_eq!(state.bids[0].items[0].unit_price, dec!(5));
    assert_eq!(state.bids[0].total_amount, dec!(500));
    assert_eq!(state.bids[0].currency, "EUR");

    world.submit(rfq_id, &world.supplier, dec!(5)).await;
    let err = world
        .service
        .save_bid(rfq_id, bid_input(dec!(6)), false, &world.supplier)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Conflict(_)));
}

#[tokio::test]
async fn test_overflowing_bid_is_rejected_without_saving() {
    let world = World::new();
    let rfq_id = world.open().await;
    let mut input = bid_input(dec!(10000000000000000));
    input.items[0].quantity = dec!(10000000000000000);

    let err = world
        .service
        .save_bid(rfq_id, input, true, &world.supplier)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));
    assert!(world.store.snapshot().bids.is_empty());
}

#[tokio::test]
async fn test_award_leaves_exactly_one_winner() {
    let world = World::new();
    let rfq_id = world.open().await;
    let winner = world.submit(rfq_id, &world.supplier, dec!(5)).await;
    let loser = world.submit(rfq_id, &world.rival, dec!(4)).await;

    let rfq = world
        .service
        .transition_rfq(rfq_id, award_request(world.supplier_company()), &world.buyer)
        .await
        .unwrap()
        .entity;
    assert_eq!(rfq.status, RfqStatus::Awarded);
    assert_eq!(rfq.awarded_bid_id, Some(winner));

    let state = world.store.snapshot();
    let awarded: Vec<_> = state
        .bids
        .iter()
        .filter(|b| b.status == BidStatus::Awarded)
        .collect();
    assert_eq!(awarded.len(), 1);
    assert_eq!(awarded[0].id, winner);
    let lost = state.bids.iter().find(|b| b.id == loser).unwrap();
    assert_eq!(lost.status, BidStatus::Rejected);
    assert!(lost.rejection_reason.is_some());

    let notes = world.notifications().await;
    let rival_company = world.rival.company_id.unwrap();
    assert!(notes.iter().any(|n| {
        n.notification_type == NotificationType::BidStatusChanged
            && n.recipient == crate::events::Recipient::Company(rival_company)
    }));
}

#[tokio::test]
async fn test_bid_award_couples_rfq() {
    let world = World::new();
    let rfq_id = world.open().await;
    let bid_id = world.submit(rfq_id, &world.supplier, dec!(5)).await;

    world
        .service
        .transition_bid(bid_id, TransitionRequest::to("awarded", Value::Null), &world.buyer)
        .await
        .unwrap();

    let rfq = world.service.get_rfq(rfq_id, &world.buyer).await.unwrap().entity;
    assert_eq!(rfq.status, RfqStatus::Awarded);
    assert_eq!(rfq.awarded_supplier_id, Some(world.supplier_company()));
    let history = world.service.rfq_history(rfq_id, &world.buyer).await.unwrap();
    assert_eq!(history.last().unwrap().to_status, "awarded");
}

#[tokio::test]
async fn test_award_to_supplier_without_bid_is_precondition() {
    let world = World::new();
    let rfq_id = world.open().await;
    world.submit(rfq_id, &world.supplier, dec!(5)).await;

    let err = world
        .service
        .transition_rfq(rfq_id, award_request(Uuid::new_v4()), &world.buyer)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::PreconditionFailed(_)));
    let rfq = world.service.get_rfq(rfq_id, &world.buyer).await.unwrap().entity;
    assert_eq!(rfq.status, RfqStatus::BiddingOpen);
}

#[tokio::test]
async fn test_award_then_order_scenario() {
    let world = World::new();
    let rfq_id = world.open().await;
    let bid_id = world.submit(rfq_id, &world.supplier, dec!(5)).await;
    let bid = world.service.get_bid(bid_id, &world.buyer).await.unwrap().entity;
    assert_eq!(bid.status, BidStatus::Submitted);
    assert_eq!(bid.total_amount, dec!(500));

    world
        .service
        .transition_rfq(rfq_id, award_request(world.supplier_company()), &world.buyer)
        .await
        .unwrap();

    let first = world
        .service
        .create_purchase_order_from_bid(bid_id, &world.buyer)
        .await
        .unwrap();
    assert!(first.created);
    let po = &first.outcome.entity;
    assert_eq!(po.po_number, format!("PO-{}-0001", Utc::now().year()));
    assert_eq!(po.total_amount, dec!(500));
    assert_eq!(po.status, PurchaseOrderStatus::SentToSupplier);

    let second = world
        .service
        .create_purchase_order_from_bid(bid_id, &world.buyer)
        .await
        .unwrap();
    assert!(!second.created);
    assert_eq!(second.outcome.entity.po_number, po.po_number);
    assert_eq!(world.store.snapshot().purchase_orders.len(), 1);
}

#[tokio::test]
async fn test_order_race_returns_winner() {
    let world = World::new();
    let rfq_id = world.open().await;
    let bid_id = world.submit(rfq_id, &world.supplier, dec!(5)).await;
    world
        .service
        .transition_bid(bid_id, TransitionRequest::to("awarded", Value::Null), &world.buyer)
        .await
        .unwrap();
    let first = world
        .service
        .create_purchase_order_from_bid(bid_id, &world.buyer)
        .await
        .unwrap();

    world.store.miss_next_order_lookup();
    let second = world
        .service
        .create_purchase_order_from_bid(bid_id, &world.buyer)
        .await
        .unwrap();
    assert!(!second.created);
    assert_eq!(second.outcome.entity.id, first.outcome.entity.id);
    assert_eq!(world.store.snapshot().purchase_orders.len(), 1);
}

#[tokio::test]
async fn test_order_requires_award() {
    let world = World::new();
    let rfq_id = world.open().await;
    let bid_id = world.submit(rfq_id, &world.supplier, dec!(5)).await;
    let err = world
        .service
        .create_purchase_order_from_bid(bid_id, &world.buyer)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::PreconditionFailed(_)));
}

fn counter_offer(total: &str) -> MessageInput {
    MessageInput {
        message_type: MessageType::CounterOffer,
        content: "Revised terms".to_string(),
        offer_data: Some(json!({ "total_amount": total })),
        offer_status: None,
    }
}

#[tokio::test]
async fn test_negotiation_scenario() {
    let world = World::new();
    let rfq_id = world.open().await;
    let supplier = Actor::supplier(Uuid::new_v4(), world.supplier_company());
    let bid_id = world.submit(rfq_id, &supplier, dec!(5)).await;

    let negotiation = world
        .service
        .start_negotiation(bid_id, None, &world.buyer)
        .await
        .unwrap()
        .entity;
    assert_eq!(negotiation.status, NegotiationStatus::Active);
    assert!(matches!(
        world.service.start_negotiation(bid_id, None, &world.buyer).await,
        Err(WorkflowError::Conflict(_))
    ));

    let offer = world
        .service
        .send_message(negotiation.id, counter_offer("450"), &supplier)
        .await
        .unwrap()
        .entity;
    assert_eq!(offer.negotiation.pending_offer_message_id, Some(offer.message.id));

    let accepted = world
        .service
        .accept_offer(negotiation.id, None, &world.buyer)
        .await
        .unwrap()
        .entity;
    assert_eq!(accepted.negotiation.status, NegotiationStatus::Closed);
    assert_eq!(accepted.negotiation.accepted_offer_message_id, Some(offer.message.id));
    let messages = world
        .service
        .list_messages(negotiation.id, &world.buyer)
        .await
        .unwrap();
    assert_eq!(messages[0].offer_status, Some(OfferStatus::Accepted));

    let reopened = world
        .service
        .send_message(negotiation.id, counter_offer("470"), &supplier)
        .await
        .unwrap()
        .entity;
    assert_eq!(reopened.negotiation.status, NegotiationStatus::Active);

    let notes = world.notifications().await;
    assert!(notes.iter().any(|n| {
        n.notification_type == NotificationType::NegotiationMessage
            && n.recipient == crate::events::Recipient::User(world.buyer.user_id)
    }));
}

#[tokio::test]
async fn test_negotiated_order_takes_offer_total() {
    let world = World::new();
    let rfq_id = world.open().await;
    let supplier = Actor::supplier(Uuid::new_v4(), world.supplier_company());
    let bid_id = world.submit(rfq_id, &supplier, dec!(5)).await;
    let negotiation = world
        .service
        .start_negotiation(bid_id, Some(counter_offer("450.00")), &world.buyer)
        .await
        .unwrap()
        .entity;

    assert!(matches!(
        world
            .service
            .create_purchase_order_from_negotiation(negotiation.id, &world.buyer)
            .await,
        Err(WorkflowError::PreconditionFailed(_))
    ));

    world
        .service
        .accept_offer(negotiation.id, Some("Agreed".to_string()), &supplier)
        .await
        .unwrap();
    let created = world
        .service
        .create_purchase_order_from_negotiation(negotiation.id, &world.buyer)
        .await
        .unwrap();
    assert!(created.created);
    assert_eq!(created.outcome.entity.total_amount, dec!(450.00));
    assert_eq!(created.outcome.entity.negotiation_id, Some(negotiation.id));

    let negotiation = world
        .service
        .get_negotiation(negotiation.id, &world.buyer)
        .await
        .unwrap()
        .entity;
    assert_eq!(negotiation.purchase_order_id, Some(created.outcome.entity.id));
}

#[tokio::test]
async fn test_existing_order_is_linked_to_later_negotiation() {
    let world = World::new();
    let rfq_id = world.open().await;
    let supplier = Actor::supplier(Uuid::new_v4(), world.supplier_company());
    let bid_id = world.submit(rfq_id, &supplier, dec!(5)).await;
    world
        .service
        .transition_bid(bid_id, TransitionRequest::to("awarded", Value::Null), &world.buyer)
        .await
        .unwrap();
    let order = world
        .service
        .create_purchase_order_from_bid(bid_id, &world.buyer)
        .await
        .unwrap()
        .outcome
        .entity;

    let negotiation = world
        .service
        .start_negotiation(bid_id, Some(counter_offer("480")), &world.buyer)
        .await
        .unwrap()
        .entity;
    assert_eq!(negotiation.purchase_order_id, None);
    world
        .service
        .accept_offer(negotiation.id, None, &supplier)
        .await
        .unwrap();

    let again = world
        .service
        .create_purchase_order_from_negotiation(negotiation.id, &world.buyer)
        .await
        .unwrap();
    assert!(!again.created);
    assert_eq!(again.outcome.entity.id, order.id);
    assert_eq!(world.store.snapshot().purchase_orders.len(), 1);

    let negotiation = world
        .service
        .get_negotiation(negotiation.id, &world.buyer)
        .await
        .unwrap()
        .entity;
    assert_eq!(negotiation.purchase_order_id, Some(order.id));
}

#[tokio::test]
async fn test_cancel_negotiation_withdraws_pending_offer() {
    let world = World::new();
    let rfq_id = world.open().await;
    let supplier = Actor::supplier(Uuid::new_v4(), world.supplier_company());
    let bid_id = world.submit(rfq_id, &supplier, dec!(5)).await;
    let negotiation = world
        .service
        .start_negotiation(bid_id, Some(counter_offer("480")), &world.buyer)
        .await
        .unwrap()
        .entity;

    let cancelled = world
        .service
        .cancel_negotiation(negotiation.id, Some("Going with catalogue price".to_string()), &supplier)
        .await
        .unwrap()
        .entity;
    assert_eq!(cancelled.status, NegotiationStatus::Cancelled);
    assert_eq!(cancelled.pending_offer_message_id, None);
    let messages = world.service.list_messages(negotiation.id, &supplier).await.unwrap();
    assert_eq!(messages[0].offer_status, Some(OfferStatus::Cancelled));

    assert!(matches!(
        world
            .service
            .send_message(negotiation.id, counter_offer("470"), &supplier)
            .await,
        Err(WorkflowError::PreconditionFailed(_))
    ));
}

async fn issued_order(world: &World) -> Uuid {
    let rfq_id = world.open().await;
    let bid_id = world.submit(rfq_id, &world.supplier, dec!(5)).await;
    world
        .service
        .transition_bid(bid_id, TransitionRequest::to("awarded", Value::Null), &world.buyer)
        .await
        .unwrap();
    world
        .service
        .create_purchase_order_from_bid(bid_id, &world.buyer)
        .await
        .unwrap()
        .outcome
        .entity
        .id
}

#[tokio::test]
async fn test_modification_waits_for_approval_on_issued_order() {
    let world = World::new();
    let po_id = issued_order(&world).await;

    let pending = world
        .service
        .request_modification(
            po_id,
            ModificationInput {
                field: "delivery_address".to_string(),
                new_value: Some("Warehouse B".to_string()),
                reason: None,
            },
            &world.supplier,
        )
        .await
        .unwrap();
    assert_eq!(pending.status, ModificationStatus::Pending);
    let po = world.service.get_purchase_order(po_id, &world.buyer).await.unwrap().entity;
    assert_eq!(po.delivery_address, None);

    let approved = world
        .service
        .approve_modification(po_id, pending.id, None, &world.buyer)
        .await
        .unwrap();
    assert_eq!(approved.status, ModificationStatus::Approved);
    let po = world.service.get_purchase_order(po_id, &world.buyer).await.unwrap().entity;
    assert_eq!(po.delivery_address.as_deref(), Some("Warehouse B"));
    assert_eq!(
        world.service.list_modifications(po_id, &world.buyer).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_modification_on_draft_order_applies_at_once() {
    let world = World::new();
    let po_id = issued_order(&world).await;
    world
        .service
        .transition_purchase_order(
            po_id,
            TransitionRequest {
                target_status: "draft".to_string(),
                metadata: Value::Null,
                force: true,
            },
            &world.admin,
        )
        .await
        .unwrap();

    let row = world
        .service
        .request_modification(
            po_id,
            ModificationInput {
                field: "payment_terms".to_string(),
                new_value: Some("Net 30".to_string()),
                reason: Some("Standard terms".to_string()),
            },
            &world.buyer,
        )
        .await
        .unwrap();
    assert_eq!(row.status, ModificationStatus::Approved);
    let po = world.service.get_purchase_order(po_id, &world.buyer).await.unwrap().entity;
    assert_eq!(po.payment_terms.as_deref(), Some("Net 30"));
}

#[tokio::test]
async fn test_fulfilment_path_and_history() {
    let world = World::new();
    let po_id = issued_order(&world).await;

    for (target, actor, metadata) in [
        ("acknowledged", &world.supplier, Value::Null),
        ("in_progress", &world.supplier, Value::Null),
        ("delivered", &world.supplier, json!({ "notes": "Pallets at dock 2" })),
        ("completed", &world.buyer, Value::Null),
    ] {
        world
            .service
            .transition_purchase_order(po_id, TransitionRequest::to(target, metadata), actor)
            .await
            .unwrap();
    }

    let history = world.service.purchase_order_history(po_id, &world.buyer).await.unwrap();
    let statuses: Vec<_> = history.iter().map(|h| h.to_status.as_str()).collect();
    assert_eq!(
        statuses,
        ["sent_to_supplier", "acknowledged", "in_progress", "delivered", "completed"]
    );
    assert!(history.iter().all(|h| h.entity_type == EntityKind::PurchaseOrder));
}

#[tokio::test]
async fn test_approval_policy_starts_orders_pending() {
    let world = World::with_policy(WorkflowPolicy {
        purchase_order_requires_approval: true,
        ..WorkflowPolicy::default()
    });
    let po_id = issued_order(&world).await;
    assert!(matches!(
        world.service.get_purchase_order(po_id, &world.supplier).await,
        Err(WorkflowError::Unauthorized(_))
    ));

    let approved = world
        .service
        .transition_purchase_order(po_id, TransitionRequest::to("approved", Value::Null), &world.buyer)
        .await
        .unwrap()
        .entity;
    assert_eq!(approved.approved_amount, Some(dec!(500)));
    assert_eq!(approved.current_approval_step, 1);
}

#[tokio::test]
async fn test_failed_commit_sends_nothing() {
    let world = World::new();
    let id = world.draft().await;
    world.move_rfq(id, "published").await;
    let before = world.notifications().await.len();

    world.store.fail_next_commit();
    let err = world
        .service
        .transition_rfq(id, TransitionRequest::to("bidding_open", Value::Null), &world.buyer)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Internal(_)));

    assert_eq!(world.notifications().await.len(), before);
    let rfq = world.service.get_rfq(id, &world.buyer).await.unwrap().entity;
    assert_eq!(rfq.status, RfqStatus::Published);
}

#[tokio::test]
async fn test_evaluation_is_stored() {
    let world = World::new();
    let rfq_id = world.open().await;
    let bid_id = world.submit(rfq_id, &world.supplier, dec!(5)).await;
    let bid = world
        .service
        .evaluate_bid(
            bid_id,
            EvaluationInput {
                technical_score: dec!(8),
                commercial_score: dec!(7),
                delivery_score: dec!(9),
                total_score: None,
                notes: None,
            },
            &world.buyer,
        )
        .await
        .unwrap()
        .entity;
    assert_eq!(bid.evaluation.unwrap().total_score, dec!(8.00));
    assert_eq!(bid.version, 1);
}

#[tokio::test]
async fn test_suppliers_only_see_their_own_bids() {
    let world = World::new();
    let rfq_id = world.open().await;
    world.submit(rfq_id, &world.supplier, dec!(5)).await;
    world.submit(rfq_id, &world.rival, dec!(4)).await;

    assert_eq!(world.service.list_bids(rfq_id, &world.buyer).await.unwrap().len(), 2);
    let own = world.service.list_bids(rfq_id, &world.rival).await.unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].supplier_company_id, world.rival.company_id.unwrap());
}
