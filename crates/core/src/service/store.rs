//! Persistence port for the procurement service.

use std::future::Future;

use uuid::Uuid;

use crate::bid::Bid;
use crate::error::WorkflowError;
use crate::machine::{EntityKind, StatusHistoryEntry};
use crate::negotiation::{Negotiation, NegotiationMessage, OfferResolution};
use crate::numbering::DocumentKind;
use crate::purchase_order::{PurchaseOrder, PurchaseOrderModification};
use crate::rfq::Rfq;

/// Entities carrying an optimistic concurrency version.
pub trait Versioned {
    /// Current version.
    fn version(&self) -> i64;
    /// Overwrites the version.
    fn set_version(&mut self, version: i64);
}

macro_rules! versioned {
    ($($ty:ty),* $(,)?) => {
        $(impl Versioned for $ty {
            fn version(&self) -> i64 {
                self.version
            }

            fn set_version(&mut self, version: i64) {
                self.version = version;
            }
        })*
    };
}

versioned!(Rfq, Bid, Negotiation, PurchaseOrder, PurchaseOrderModification);

/// One row to write.
#[derive(Debug, Clone, PartialEq)]
pub enum Change<T> {
    /// A new row.
    Insert(T),
    /// An existing row, written only if its stored version still equals
    /// `expected_version`.
    Update {
        /// Version the change was computed from.
        expected_version: i64,
        /// The new row, already carrying `expected_version + 1`.
        value: T,
    },
}

impl<T> Change<T> {
    /// The row being written.
    pub fn value(&self) -> &T {
        match self {
            Self::Insert(value) | Self::Update { value, .. } => value,
        }
    }
}

impl<T: Versioned> Change<T> {
    /// Stages an update of `value`, bumping its version.
    pub fn update(mut value: T) -> Self {
        let expected_version = value.version();
        value.set_version(expected_version + 1);
        Self::Update {
            expected_version,
            value,
        }
    }
}

fn stage<T: Versioned + Clone>(changes: &mut Vec<Change<T>>, value: T) -> T {
    let change = Change::update(value);
    let staged = change.value().clone();
    changes.push(change);
    staged
}

/// Every write produced by one operation, committed atomically.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// RFQ rows.
    pub rfqs: Vec<Change<Rfq>>,
    /// Bid rows.
    pub bids: Vec<Change<Bid>>,
    /// Negotiation rows.
    pub negotiations: Vec<Change<Negotiation>>,
    /// New messages.
    pub messages: Vec<NegotiationMessage>,
    /// Counter-offers whose status was settled.
    pub offer_resolutions: Vec<OfferResolution>,
    /// Purchase order rows.
    pub purchase_orders: Vec<Change<PurchaseOrder>>,
    /// Modification rows.
    pub modifications: Vec<Change<PurchaseOrderModification>>,
    /// Status history rows.
    pub history: Vec<StatusHistoryEntry>,
}

impl ChangeSet {
    /// Returns true if nothing would be written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rfqs.is_empty()
            && self.bids.is_empty()
            && self.negotiations.is_empty()
            && self.messages.is_empty()
            && self.offer_resolutions.is_empty()
            && self.purchase_orders.is_empty()
            && self.modifications.is_empty()
            && self.history.is_empty()
    }

    /// Stages an RFQ update and returns the row as it will be stored.
    pub fn update_rfq(&mut self, rfq: Rfq) -> Rfq {
        stage(&mut self.rfqs, rfq)
    }

    /// Stages a bid update and returns the row as it will be stored.
    pub fn update_bid(&mut self, bid: Bid) -> Bid {
        stage(&mut self.bids, bid)
    }

    /// Stages a negotiation update and returns the row as it will be stored.
    pub fn update_negotiation(&mut self, negotiation: Negotiation) -> Negotiation {
        stage(&mut self.negotiations, negotiation)
    }

    /// Stages a purchase order update and returns the row as it will be
    /// stored.
    pub fn update_purchase_order(&mut self, po: PurchaseOrder) -> PurchaseOrder {
        stage(&mut self.purchase_orders, po)
    }

    /// Stages a modification update and returns the row as it will be
    /// stored.
    pub fn update_modification(
        &mut self,
        modification: PurchaseOrderModification,
    ) -> PurchaseOrderModification {
        stage(&mut self.modifications, modification)
    }
}

/// Storage used by [`ProcurementService`](super::ProcurementService).
///
/// Implemented by the db crate over Postgres. `commit` must apply the whole
/// [`ChangeSet`] in one transaction and fail with
/// [`WorkflowError::Conflict`] if any `Update` finds a different stored
/// version, or if an insert violates a uniqueness rule.
pub trait WorkflowStore: Send + Sync {
    /// Finds an RFQ.
    fn find_rfq(&self, id: Uuid) -> impl Future<Output = Result<Option<Rfq>, WorkflowError>> + Send;

    /// Every bid on an RFQ, oldest first.
    fn list_bids_for_rfq(
        &self,
        rfq_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Bid>, WorkflowError>> + Send;

    /// Finds a bid.
    fn find_bid(&self, id: Uuid) -> impl Future<Output = Result<Option<Bid>, WorkflowError>> + Send;

    /// The bid a supplier company placed on an RFQ.
    fn find_bid_for_supplier(
        &self,
        rfq_id: Uuid,
        supplier_company_id: Uuid,
    ) -> impl Future<Output = Result<Option<Bid>, WorkflowError>> + Send;

    /// Finds a negotiation.
    fn find_negotiation(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<Negotiation>, WorkflowError>> + Send;

    /// The negotiation on a bid.
    fn find_negotiation_by_bid(
        &self,
        bid_id: Uuid,
    ) -> impl Future<Output = Result<Option<Negotiation>, WorkflowError>> + Send;

    /// Finds a negotiation message.
    fn find_message(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<NegotiationMessage>, WorkflowError>> + Send;

    /// Messages of a negotiation, oldest first.
    fn list_messages(
        &self,
        negotiation_id: Uuid,
    ) -> impl Future<Output = Result<Vec<NegotiationMessage>, WorkflowError>> + Send;

    /// Finds a purchase order.
    fn find_purchase_order(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<PurchaseOrder>, WorkflowError>> + Send;

    /// The purchase order derived from a bid.
    fn find_purchase_order_by_bid(
        &self,
        bid_id: Uuid,
    ) -> impl Future<Output = Result<Option<PurchaseOrder>, WorkflowError>> + Send;

    /// Finds a modification.
    fn find_modification(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<PurchaseOrderModification>, WorkflowError>> + Send;

    /// Modifications of a purchase order, oldest first.
    fn list_modifications(
        &self,
        purchase_order_id: Uuid,
    ) -> impl Future<Output = Result<Vec<PurchaseOrderModification>, WorkflowError>> + Send;

    /// Status history of an entity, oldest first.
    fn list_history(
        &self,
        entity: EntityKind,
        entity_id: Uuid,
    ) -> impl Future<Output = Result<Vec<StatusHistoryEntry>, WorkflowError>> + Send;

    /// Atomically reserves the next sequence value for `kind` in `year`.
    fn next_sequence(
        &self,
        kind: DocumentKind,
        year: i32,
    ) -> impl Future<Output = Result<i64, WorkflowError>> + Send;

    /// Writes a change set in one transaction.
    fn commit(&self, changes: ChangeSet) -> impl Future<Output = Result<(), WorkflowError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::draft_rfq;

    #[test]
    fn test_update_bumps_version_and_remembers_expected() {
        let mut changes = ChangeSet::default();
        let mut rfq = draft_rfq();
        rfq.version = 4;
        let staged = changes.update_rfq(rfq);

        assert_eq!(staged.version, 5);
        match &changes.rfqs[0] {
            Change::Update {
                expected_version,
                value,
            } => {
                assert_eq!(*expected_version, 4);
                assert_eq!(value.version, 5);
            }
            Change::Insert(_) => panic!("expected an update"),
        }
        assert!(!changes.is_empty());
    }
}
