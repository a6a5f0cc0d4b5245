//! In-memory [`WorkflowStore`] for service tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use uuid::Uuid;

use super::store::{Change, ChangeSet, Versioned, WorkflowStore};
use crate::bid::Bid;
use crate::error::WorkflowError;
use crate::machine::{EntityKind, StatusHistoryEntry};
use crate::negotiation::{Negotiation, NegotiationMessage};
use crate::numbering::DocumentKind;
use crate::purchase_order::{PurchaseOrder, PurchaseOrderModification};
use crate::rfq::Rfq;

#[derive(Debug, Clone, Default)]
pub(crate) struct State {
    pub rfqs: Vec<Rfq>,
    pub bids: Vec<Bid>,
    pub negotiations: Vec<Negotiation>,
    pub messages: Vec<NegotiationMessage>,
    pub purchase_orders: Vec<PurchaseOrder>,
    pub modifications: Vec<PurchaseOrderModification>,
    pub history: Vec<StatusHistoryEntry>,
    pub sequences: HashMap<(DocumentKind, i32), i64>,
}

#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    state: Mutex<State>,
    fail_next_commit: AtomicBool,
    miss_next_order_lookup: AtomicBool,
}

impl MemoryStore {
    pub(crate) fn snapshot(&self) -> State {
        self.state.lock().unwrap().clone()
    }

    pub(crate) fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Makes the next order-by-bid lookup miss, as if another request
    /// inserted the order right after it.
    pub(crate) fn miss_next_order_lookup(&self) {
        self.miss_next_order_lookup.store(true, Ordering::SeqCst);
    }
}

trait Row: Versioned + Clone {
    const ENTITY: EntityKind;
    fn id(&self) -> Uuid;
}

macro_rules! row {
    ($ty:ty, $entity:expr) => {
        impl Row for $ty {
            const ENTITY: EntityKind = $entity;
            fn id(&self) -> Uuid {
                self.id
            }
        }
    };
}

row!(Rfq, EntityKind::Rfq);
row!(Bid, EntityKind::Bid);
row!(Negotiation, EntityKind::Negotiation);
row!(PurchaseOrder, EntityKind::PurchaseOrder);
row!(PurchaseOrderModification, EntityKind::PurchaseOrderModification);

fn apply<T: Row>(rows: &mut Vec<T>, change: Change<T>) -> Result<(), WorkflowError> {
    match change {
        Change::Insert(value) => {
            if rows.iter().any(|r| r.id() == value.id()) {
                return Err(WorkflowError::conflict(format!("duplicate {}", T::ENTITY)));
            }
            rows.push(value);
        }
        Change::Update {
            expected_version,
            value,
        } => {
            let row = rows
                .iter_mut()
                .find(|r| r.id() == value.id())
                .ok_or(WorkflowError::not_found(T::ENTITY, value.id()))?;
            if row.version() != expected_version {
                return Err(WorkflowError::conflict(format!(
                    "{} {} was modified concurrently",
                    T::ENTITY,
                    value.id()
                )));
            }
            *row = value;
        }
    }
    Ok(())
}

fn unique<T, K: PartialEq>(rows: &[T], key: impl Fn(&T) -> K, what: &str) -> Result<(), WorkflowError> {
    for (i, row) in rows.iter().enumerate() {
        if rows[..i].iter().any(|other| key(other) == key(row)) {
            return Err(WorkflowError::conflict(format!("duplicate {what}")));
        }
    }
    Ok(())
}

impl WorkflowStore for MemoryStore {
    async fn find_rfq(&self, id: Uuid) -> Result<Option<Rfq>, WorkflowError> {
        Ok(self.state.lock().unwrap().rfqs.iter().find(|r| r.id == id).cloned())
    }

    async fn list_bids_for_rfq(&self, rfq_id: Uuid) -> Result<Vec<Bid>, WorkflowError> {
        let state = self.state.lock().unwrap();
        Ok(state.bids.iter().filter(|b| b.rfq_id == rfq_id).cloned().collect())
    }

    async fn find_bid(&self, id: Uuid) -> Result<Option<Bid>, WorkflowError> {
        Ok(self.state.lock().unwrap().bids.iter().find(|b| b.id == id).cloned())
    }

    async fn find_bid_for_supplier(
        &self,
        rfq_id: Uuid,
        supplier_company_id: Uuid,
    ) -> Result<Option<Bid>, WorkflowError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .bids
            .iter()
            .find(|b| b.rfq_id == rfq_id && b.supplier_company_id == supplier_company_id)
            .cloned())
    }

    async fn find_negotiation(&self, id: Uuid) -> Result<Option<Negotiation>, WorkflowError> {
        let state = self.state.lock().unwrap();
        Ok(state.negotiations.iter().find(|n| n.id == id).cloned())
    }

    async fn find_negotiation_by_bid(&self, bid_id: Uuid) -> Result<Option<Negotiation>, WorkflowError> {
        let state = self.state.lock().unwrap();
        Ok(state.negotiations.iter().find(|n| n.bid_id == bid_id).cloned())
    }

    async fn find_message(&self, id: Uuid) -> Result<Option<NegotiationMessage>, WorkflowError> {
        let state = self.state.lock().unwrap();
        Ok(state.messages.iter().find(|m| m.id == id).cloned())
    }

    async fn list_messages(&self, negotiation_id: Uuid) -> Result<Vec<NegotiationMessage>, WorkflowError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .messages
            .iter()
            .filter(|m| m.negotiation_id == negotiation_id)
            .cloned()
            .collect())
    }

    async fn find_purchase_order(&self, id: Uuid) -> Result<Option<PurchaseOrder>, WorkflowError> {
        let state = self.state.lock().unwrap();
        Ok(state.purchase_orders.iter().find(|p| p.id == id).cloned())
    }

    async fn find_purchase_order_by_bid(&self, bid_id: Uuid) -> Result<Option<PurchaseOrder>, WorkflowError> {
        if self.miss_next_order_lookup.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        let state = self.state.lock().unwrap();
        Ok(state.purchase_orders.iter().find(|p| p.bid_id == bid_id).cloned())
    }

    async fn find_modification(
        &self,
        id: Uuid,
    ) -> Result<Option<PurchaseOrderModification>, WorkflowError> {
        let state = self.state.lock().unwrap();
        Ok(state.modifications.iter().find(|m| m.id == id).cloned())
    }

    async fn list_modifications(
        &self,
        purchase_order_id: Uuid,
    ) -> Result<Vec<PurchaseOrderModification>, WorkflowError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .modifications
            .iter()
            .filter(|m| m.purchase_order_id == purchase_order_id)
            .cloned()
            .collect())
    }

    async fn list_history(
        &self,
        entity: EntityKind,
        entity_id: Uuid,
    ) -> Result<Vec<StatusHistoryEntry>, WorkflowError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .history
            .iter()
            .filter(|h| h.entity_type == entity && h.entity_id == entity_id)
            .cloned()
            .collect())
    }

    async fn next_sequence(&self, kind: DocumentKind, year: i32) -> Result<i64, WorkflowError> {
        let mut state = self.state.lock().unwrap();
        let value = state.sequences.entry((kind, year)).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn commit(&self, changes: ChangeSet) -> Result<(), WorkflowError> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(WorkflowError::Internal("simulated storage failure".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        let mut next = state.clone();

        for change in changes.rfqs {
            apply(&mut next.rfqs, change)?;
        }
        for change in changes.bids {
            apply(&mut next.bids, change)?;
        }
        for change in changes.negotiations {
            apply(&mut next.negotiations, change)?;
        }
        next.messages.extend(changes.messages);
        for resolution in changes.offer_resolutions {
            if let Some(message) = next.messages.iter_mut().find(|m| m.id == resolution.message_id) {
                message.offer_status = Some(resolution.status);
            }
        }
        for change in changes.purchase_orders {
            apply(&mut next.purchase_orders, change)?;
        }
        for change in changes.modifications {
            apply(&mut next.modifications, change)?;
        }
        next.history.extend(changes.history);

        unique(&next.bids, |b| (b.rfq_id, b.supplier_company_id), "bid for supplier")?;
        unique(&next.negotiations, |n| n.bid_id, "negotiation for bid")?;
        unique(&next.purchase_orders, |p| p.bid_id, "purchase order for bid")?;

        *state = next;
        Ok(())
    }
}
