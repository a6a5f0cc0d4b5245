//! Postgres implementation of the core [`WorkflowStore`].
//!
//! Every [`ChangeSet`] is applied inside one database transaction. Updates
//! are compare-and-swap on the `version` column; zero affected rows rolls
//! the whole transaction back with `Conflict`.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbBackend, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, Statement, TransactionTrait,
};
use uuid::Uuid;

use procura_core::bid::Bid;
use procura_core::error::WorkflowError;
use procura_core::machine::{EntityKind, StatusHistoryEntry};
use procura_core::negotiation::{Negotiation, NegotiationMessage};
use procura_core::numbering::DocumentKind;
use procura_core::purchase_order::{PurchaseOrder, PurchaseOrderModification};
use procura_core::rfq::Rfq;
use procura_core::service::{Change, ChangeSet, Versioned, WorkflowStore};

use super::convert::{
    HistoryRow, bid_active, bid_from_model, db_err, history_active, message_active,
    message_from_model, modification_active, modification_from_model, negotiation_active,
    negotiation_from_model, purchase_order_active, purchase_order_from_model,
    purchase_order_history_from_model, rfq_active, rfq_from_model, rfq_history_from_model,
};
use crate::entities::{
    bids, negotiation_messages, negotiations, purchase_order_modifications,
    purchase_order_status_history, purchase_orders, rfq_status_history, rfqs,
};

const NEXT_SEQUENCE_SQL: &str = r"
INSERT INTO document_sequences (kind, year, last_value)
VALUES ($1, $2, 1)
ON CONFLICT (kind, year)
DO UPDATE SET last_value = document_sequences.last_value + 1
RETURNING last_value
";

/// Workflow store backed by Postgres.
#[derive(Debug, Clone)]
pub struct PgStore {
    db: DatabaseConnection,
}

impl PgStore {
    /// Creates a new store over a connection pool.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// Applies one staged row: insert, or update guarded by the version the
/// change was computed from.
async fn apply<E, A>(
    txn: &DatabaseTransaction,
    entity: EntityKind,
    id: Uuid,
    change: Change<A>,
    id_column: E::Column,
    version_column: E::Column,
) -> Result<(), WorkflowError>
where
    E: EntityTrait,
    A: ActiveModelTrait<Entity = E> + Send,
    E::Model: IntoActiveModel<A>,
{
    match change {
        Change::Insert(active) => {
            E::insert(active)
                .exec_without_returning(txn)
                .await
                .map_err(db_err)?;
        }
        Change::Update {
            expected_version,
            value,
        } => {
            let result = E::update_many()
                .set(value)
                .filter(id_column.eq(id))
                .filter(version_column.eq(expected_version))
                .exec(txn)
                .await
                .map_err(db_err)?;
            if result.rows_affected == 0 {
                let exists = E::find()
                    .filter(id_column.eq(id))
                    .one(txn)
                    .await
                    .map_err(db_err)?
                    .is_some();
                if !exists {
                    return Err(WorkflowError::not_found(entity, id));
                }
                tracing::warn!(%entity, %id, expected_version, "stale version on commit");
                return Err(WorkflowError::conflict(format!(
                    "{entity} {id} was modified by another request"
                )));
            }
        }
    }
    Ok(())
}

/// Converts a staged domain change into a staged active-model change.
fn stage<T: Versioned, A>(
    change: Change<T>,
    convert: impl FnOnce(&T) -> Result<A, WorkflowError>,
) -> Result<Change<A>, WorkflowError> {
    Ok(match change {
        Change::Insert(value) => Change::Insert(convert(&value)?),
        Change::Update {
            expected_version,
            value,
        } => Change::Update {
            expected_version,
            value: convert(&value)?,
        },
    })
}

impl PgStore {
    async fn apply_changes(
        txn: &DatabaseTransaction,
        changes: ChangeSet,
    ) -> Result<(), WorkflowError> {
        for change in changes.rfqs {
            let id = change.value().id;
            let staged = stage(change, rfq_active)?;
            apply(txn, EntityKind::Rfq, id, staged, rfqs::Column::Id, rfqs::Column::Version).await?;
        }
        for change in changes.bids {
            let id = change.value().id;
            let staged = stage(change, bid_active)?;
            apply(txn, EntityKind::Bid, id, staged, bids::Column::Id, bids::Column::Version).await?;
        }
        for change in changes.negotiations {
            let id = change.value().id;
            let staged = stage(change, |n| Ok(negotiation_active(n)))?;
            apply(
                txn,
                EntityKind::Negotiation,
                id,
                staged,
                negotiations::Column::Id,
                negotiations::Column::Version,
            )
            .await?;
        }
        for message in &changes.messages {
            negotiation_messages::Entity::insert(message_active(message))
                .exec_without_returning(txn)
                .await
                .map_err(db_err)?;
        }
        for resolution in changes.offer_resolutions {
            negotiation_messages::Entity::update_many()
                .set(negotiation_messages::ActiveModel {
                    offer_status: sea_orm::ActiveValue::Set(Some(resolution.status.into())),
                    ..Default::default()
                })
                .filter(negotiation_messages::Column::Id.eq(resolution.message_id))
                .exec(txn)
                .await
                .map_err(db_err)?;
        }
        for change in changes.purchase_orders {
            let id = change.value().id;
            let staged = stage(change, purchase_order_active)?;
            apply(
                txn,
                EntityKind::PurchaseOrder,
                id,
                staged,
                purchase_orders::Column::Id,
                purchase_orders::Column::Version,
            )
            .await?;
        }
        for change in changes.modifications {
            let id = change.value().id;
            let staged = stage(change, |m| Ok(modification_active(m)))?;
            apply(
                txn,
                EntityKind::PurchaseOrderModification,
                id,
                staged,
                purchase_order_modifications::Column::Id,
                purchase_order_modifications::Column::Version,
            )
            .await?;
        }
        for entry in &changes.history {
            match history_active(entry)? {
                Some(HistoryRow::Rfq(row)) => {
                    rfq_status_history::Entity::insert(row)
                        .exec_without_returning(txn)
                        .await
                        .map_err(db_err)?;
                }
                Some(HistoryRow::PurchaseOrder(row)) => {
                    purchase_order_status_history::Entity::insert(row)
                        .exec_without_returning(txn)
                        .await
                        .map_err(db_err)?;
                }
                None => {
                    tracing::debug!(entity = %entry.entity_type, "history not kept for entity");
                }
            }
        }
        Ok(())
    }
}

impl WorkflowStore for PgStore {
    async fn find_rfq(&self, id: Uuid) -> Result<Option<Rfq>, WorkflowError> {
        rfqs::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(rfq_from_model)
            .transpose()
    }

    async fn list_bids_for_rfq(&self, rfq_id: Uuid) -> Result<Vec<Bid>, WorkflowError> {
        bids::Entity::find()
            .filter(bids::Column::RfqId.eq(rfq_id))
            .order_by_asc(bids::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(bid_from_model)
            .collect()
    }

    async fn find_bid(&self, id: Uuid) -> Result<Option<Bid>, WorkflowError> {
        bids::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(bid_from_model)
            .transpose()
    }

    async fn find_bid_for_supplier(
        &self,
        rfq_id: Uuid,
        supplier_company_id: Uuid,
    ) -> Result<Option<Bid>, WorkflowError> {
        bids::Entity::find()
            .filter(bids::Column::RfqId.eq(rfq_id))
            .filter(bids::Column::SupplierCompanyId.eq(supplier_company_id))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(bid_from_model)
            .transpose()
    }

    async fn find_negotiation(&self, id: Uuid) -> Result<Option<Negotiation>, WorkflowError> {
        Ok(negotiations::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(negotiation_from_model))
    }

    async fn find_negotiation_by_bid(
        &self,
        bid_id: Uuid,
    ) -> Result<Option<Negotiation>, WorkflowError> {
        Ok(negotiations::Entity::find()
            .filter(negotiations::Column::BidId.eq(bid_id))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(negotiation_from_model))
    }

    async fn find_message(&self, id: Uuid) -> Result<Option<NegotiationMessage>, WorkflowError> {
        Ok(negotiation_messages::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(message_from_model))
    }

    async fn list_messages(
        &self,
        negotiation_id: Uuid,
    ) -> Result<Vec<NegotiationMessage>, WorkflowError> {
        Ok(negotiation_messages::Entity::find()
            .filter(negotiation_messages::Column::NegotiationId.eq(negotiation_id))
            .order_by_asc(negotiation_messages::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(message_from_model)
            .collect())
    }

    async fn find_purchase_order(&self, id: Uuid) -> Result<Option<PurchaseOrder>, WorkflowError> {
        purchase_orders::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(purchase_order_from_model)
            .transpose()
    }

    async fn find_purchase_order_by_bid(
        &self,
        bid_id: Uuid,
    ) -> Result<Option<PurchaseOrder>, WorkflowError> {
        purchase_orders::Entity::find()
            .filter(purchase_orders::Column::BidId.eq(bid_id))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(purchase_order_from_model)
            .transpose()
    }

    async fn find_modification(
        &self,
        id: Uuid,
    ) -> Result<Option<PurchaseOrderModification>, WorkflowError> {
        purchase_order_modifications::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(modification_from_model)
            .transpose()
    }

    async fn list_modifications(
        &self,
        purchase_order_id: Uuid,
    ) -> Result<Vec<PurchaseOrderModification>, WorkflowError> {
        purchase_order_modifications::Entity::find()
            .filter(purchase_order_modifications::Column::PurchaseOrderId.eq(purchase_order_id))
            .order_by_asc(purchase_order_modifications::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(modification_from_model)
            .collect()
    }

    async fn list_history(
        &self,
        entity: EntityKind,
        entity_id: Uuid,
    ) -> Result<Vec<StatusHistoryEntry>, WorkflowError> {
        match entity {
            EntityKind::Rfq => Ok(rfq_status_history::Entity::find()
                .filter(rfq_status_history::Column::RfqId.eq(entity_id))
                .order_by_asc(rfq_status_history::Column::ChangedAt)
                .all(&self.db)
                .await
                .map_err(db_err)?
                .into_iter()
                .map(rfq_history_from_model)
                .collect()),
            EntityKind::PurchaseOrder => Ok(purchase_order_status_history::Entity::find()
                .filter(purchase_order_status_history::Column::PurchaseOrderId.eq(entity_id))
                .order_by_asc(purchase_order_status_history::Column::ChangedAt)
                .all(&self.db)
                .await
                .map_err(db_err)?
                .into_iter()
                .map(purchase_order_history_from_model)
                .collect()),
            EntityKind::Bid
            | EntityKind::Negotiation
            | EntityKind::NegotiationMessage
            | EntityKind::PurchaseOrderModification => Ok(Vec::new()),
        }
    }

    async fn next_sequence(&self, kind: DocumentKind, year: i32) -> Result<i64, WorkflowError> {
        let statement = Statement::from_sql_and_values(
            DbBackend::Postgres,
            NEXT_SEQUENCE_SQL,
            [kind.as_str().into(), year.into()],
        );
        let row = self
            .db
            .query_one(statement)
            .await
            .map_err(db_err)?
            .ok_or_else(|| WorkflowError::Internal("sequence upsert returned no row".to_string()))?;
        row.try_get::<i64>("", "last_value").map_err(db_err)
    }

    async fn commit(&self, changes: ChangeSet) -> Result<(), WorkflowError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        // Dropping the transaction on error rolls it back.
        Self::apply_changes(&txn, changes).await?;
        txn.commit().await.map_err(db_err)
    }
}
