use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, TransactionTrait,
};
use serde::Deserialize;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::stock_level::{self, Entity as StockLevelEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TransferStockInput {
    pub item_id: Uuid,
    pub from_location_id: Uuid,
    pub to_location_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

/// Per-location stock movements. Every mutation runs inside a
/// transaction so a failed step never leaves quantities half-applied.
#[derive(Clone)]
pub struct StockService {
    db: Arc<DbPool>,
    event_sender: Option<EventSender>,
}

impl StockService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn get_stock_level(
        &self,
        item_id: Uuid,
        location_id: Uuid,
    ) -> Result<Option<stock_level::Model>, ServiceError> {
        StockLevelEntity::find()
            .filter(stock_level::Column::ItemId.eq(item_id))
            .filter(stock_level::Column::LocationId.eq(location_id))
            .one(&*self.db)
            .await
            .map_err(|e| {
                error!("Failed to fetch stock level: {}", e);
                ServiceError::DatabaseError(e)
            })
    }

    #[instrument(skip(self))]
    pub async fn list_stock_for_item(
        &self,
        item_id: Uuid,
    ) -> Result<Vec<stock_level::Model>, ServiceError> {
        StockLevelEntity::find()
            .filter(stock_level::Column::ItemId.eq(item_id))
            .order_by_asc(stock_level::Column::LocationId)
            .all(&*self.db)
            .await
            .map_err(|e| {
                error!("Failed to list stock levels: {}", e);
                ServiceError::DatabaseError(e)
            })
    }

    #[instrument(skip(self))]
    pub async fn list_stock_at_location(
        &self,
        location_id: Uuid,
    ) -> Result<Vec<stock_level::Model>, ServiceError> {
        StockLevelEntity::find()
            .filter(stock_level::Column::LocationId.eq(location_id))
            .order_by_asc(stock_level::Column::ItemId)
            .all(&*self.db)
            .await
            .map_err(|e| {
                error!("Failed to list stock levels: {}", e);
                ServiceError::DatabaseError(e)
            })
    }

    /// Moves `quantity` units of an item between two locations.
    ///
    /// Validation happens before any row changes: unknown source or a
    /// source balance below the requested quantity rejects the whole
    /// transfer and leaves both locations untouched.
    #[instrument(skip(self, input), fields(item_id = %input.item_id))]
    pub async fn transfer_stock(
        &self,
        input: TransferStockInput,
    ) -> Result<(stock_level::Model, stock_level::Model), ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        if input.from_location_id == input.to_location_id {
            return Err(ServiceError::InvalidOperation(
                "Source and destination locations must differ".to_string(),
            ));
        }

        let txn = self.db.begin().await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        let source = StockLevelEntity::find()
            .filter(stock_level::Column::ItemId.eq(input.item_id))
            .filter(stock_level::Column::LocationId.eq(input.from_location_id))
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "No stock record for item {} at location {}",
                    input.item_id, input.from_location_id
                ))
            })?;

        if source.quantity < input.quantity {
            return Err(ServiceError::InsufficientStock(format!(
                "Requested {} units of item {} but only {} available at location {}",
                input.quantity, input.item_id, source.quantity, input.from_location_id
            )));
        }

        let now = Utc::now();
        let mut source_active: stock_level::ActiveModel = source.clone().into();
        source_active.quantity = Set(source.quantity - input.quantity);
        source_active.updated_at = Set(now);
        let updated_source = source_active
            .update(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let updated_dest = add_stock_in_txn(
            &txn,
            input.item_id,
            input.to_location_id,
            input.quantity,
        )
        .await?;

        txn.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        info!(
            item_id = %input.item_id,
            from = %input.from_location_id,
            to = %input.to_location_id,
            quantity = input.quantity,
            "stock transferred"
        );

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::StockTransferred {
                    item_id: input.item_id,
                    from_location_id: input.from_location_id,
                    to_location_id: input.to_location_id,
                    quantity: input.quantity,
                })
                .await;
        }

        Ok((updated_source, updated_dest))
    }
}

/// Adds `quantity` units at a location, creating the row on first
/// receipt. Callers own the surrounding transaction.
pub(crate) async fn add_stock_in_txn(
    txn: &DatabaseTransaction,
    item_id: Uuid,
    location_id: Uuid,
    quantity: i32,
) -> Result<stock_level::Model, ServiceError> {
    let existing = StockLevelEntity::find()
        .filter(stock_level::Column::ItemId.eq(item_id))
        .filter(stock_level::Column::LocationId.eq(location_id))
        .one(txn)
        .await
        .map_err(ServiceError::DatabaseError)?;

    let now = Utc::now();
    match existing {
        Some(level) => {
            let mut active: stock_level::ActiveModel = level.clone().into();
            active.quantity = Set(level.quantity + quantity);
            active.updated_at = Set(now);
            active.update(txn).await.map_err(ServiceError::DatabaseError)
        }
        None => {
            let active = stock_level::ActiveModel {
                id: Set(Uuid::new_v4()),
                item_id: Set(item_id),
                location_id: Set(location_id),
                quantity: Set(quantity),
                created_at: Set(now),
                updated_at: Set(now),
            };
            active.insert(txn).await.map_err(ServiceError::DatabaseError)
        }
    }
}
