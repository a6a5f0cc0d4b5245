//! Builders shared by the unit tests.

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::bid::{Bid, BidItem, BidStatus};
use crate::machine::Actor;
use crate::rfq::{Rfq, RfqItem, RfqStatus};

pub(crate) fn buyer_of(company_id: Uuid) -> Actor {
    Actor::buyer(Uuid::new_v4(), company_id)
}

pub(crate) fn supplier_of(company_id: Uuid) -> Actor {
    Actor::supplier(Uuid::new_v4(), company_id)
}

pub(crate) fn admin() -> Actor {
    Actor::admin(Uuid::new_v4())
}

pub(crate) fn draft_rfq() -> Rfq {
    let now = Utc::now();
    Rfq {
        id: Uuid::new_v4(),
        reference_number: "RFQ-2026-0001".to_string(),
        title: "Industrial fasteners".to_string(),
        description: None,
        company_id: Uuid::new_v4(),
        created_by: Uuid::new_v4(),
        status: RfqStatus::Draft,
        bid_deadline: None,
        delivery_date: Some(now + Duration::days(60)),
        items: vec![RfqItem {
            id: Uuid::new_v4(),
            name: "M8 bolt".to_string(),
            description: None,
            quantity: dec!(1000),
            unit: "pcs".to_string(),
            specifications: None,
        }],
        invited_suppliers: Vec::new(),
        awarded_supplier_id: None,
        awarded_bid_id: None,
        cancellation_reason: None,
        published_at: None,
        awarded_at: None,
        created_at: now,
        updated_at: now,
        version: 0,
    }
}

pub(crate) fn rfq_in(status: RfqStatus) -> Rfq {
    let mut rfq = draft_rfq();
    rfq.status = status;
    if status != RfqStatus::Draft {
        rfq.bid_deadline = Some(Utc::now() + Duration::days(14));
        rfq.published_at = Some(Utc::now());
    }
    rfq
}

pub(crate) fn bid_on(rfq: &Rfq, supplier_company_id: Uuid, status: BidStatus) -> Bid {
    let now = Utc::now();
    Bid {
        id: Uuid::new_v4(),
        bid_number: "BID-2026-0001".to_string(),
        rfq_id: rfq.id,
        supplier_company_id,
        submitted_by: Uuid::new_v4(),
        status,
        items: vec![BidItem {
            id: Uuid::new_v4(),
            rfq_item_id: rfq.items.first().map(|i| i.id),
            description: "M8 bolt, zinc plated".to_string(),
            quantity: dec!(1000),
            unit_price: dec!(0.25),
            total_price: dec!(250.00),
            specifications: None,
        }],
        total_amount: dec!(250.00),
        currency: "USD".to_string(),
        notes: None,
        submitted_at: (status != BidStatus::Draft).then_some(now),
        evaluation: None,
        rejection_reason: None,
        awarded_at: None,
        created_at: now,
        updated_at: now,
        version: 0,
    }
}
