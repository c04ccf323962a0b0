use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{
        order_counter::{self, Entity as OrderCounterEntity},
        order_status_history::{self, Entity as OrderStatusHistoryEntity},
        purchase_order::{self, Entity as PurchaseOrderEntity, PurchaseOrderStatus},
        purchase_order_item::{self, Entity as PurchaseOrderItemEntity, LineType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

pub(crate) const ORDER_COUNTER_NAME: &str = "purchase_order";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderItemInput {
    pub item_id: Uuid,
    #[validate(length(min = 1))]
    pub item_sku: String,
    #[validate(length(min = 1))]
    pub item_name: String,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_type: LineType,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePurchaseOrderInput {
    pub supplier_id: Uuid,
    #[validate(length(min = 1))]
    pub supplier_name: String,
    pub project_id: Option<Uuid>,
    pub project_name: Option<String>,
    pub estimated_delivery_date: Option<DateTime<Utc>>,
    #[validate(length(min = 1))]
    pub items: Vec<CreateOrderItemInput>,
}

/// Full read model for one order: the row, its lines, its audit trail,
/// and any backorders minted from it during partial receptions.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseOrderDetail {
    pub order: purchase_order::Model,
    pub items: Vec<purchase_order_item::Model>,
    pub status_history: Vec<order_status_history::Model>,
    pub backorder_ids: Vec<Uuid>,
}

#[derive(Clone)]
pub struct PurchaseOrderService {
    db: Arc<DbPool>,
    event_sender: Option<EventSender>,
}

impl PurchaseOrderService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Creates an order in `Pendiente de Aprobación` with a freshly
    /// minted `OC-NNNNN` number. Order, lines, and the initial history
    /// entry land in one transaction.
    #[instrument(skip(self, input), fields(supplier_id = %input.supplier_id))]
    pub async fn create_purchase_order(
        &self,
        input: CreatePurchaseOrderInput,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        for item in &input.items {
            item.validate()
                .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        }

        let txn = self.db.begin().await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        let order_number = mint_order_number(&txn).await?;
        let order_id = Uuid::new_v4();
        let now = Utc::now();
        let status = PurchaseOrderStatus::PendingApproval;

        let total: Decimal = input
            .items
            .iter()
            .map(|i| i.unit_price * Decimal::from(i.quantity))
            .sum();

        let order = purchase_order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number.clone()),
            supplier_id: Set(input.supplier_id),
            supplier_name: Set(input.supplier_name.clone()),
            project_id: Set(input.project_id),
            project_name: Set(input.project_name.clone()),
            status: Set(status.to_string()),
            total: Set(total),
            order_date: Set(now),
            estimated_delivery_date: Set(input.estimated_delivery_date),
            reception_notes: Set(None),
            original_order_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let order = order.insert(&txn).await.map_err(ServiceError::DatabaseError)?;

        let mut items = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let row = purchase_order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                item_id: Set(item.item_id),
                item_sku: Set(item.item_sku.clone()),
                item_name: Set(item.item_name.clone()),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
                line_type: Set(item.line_type.to_string()),
            };
            items.push(row.insert(&txn).await.map_err(ServiceError::DatabaseError)?);
        }

        let history = record_status_in_txn(&txn, order_id, &status, None).await?;

        txn.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        info!(%order_id, %order.order_number, "purchase order created");

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::PurchaseOrderCreated {
                    order_id,
                    order_number: order.order_number.clone(),
                })
                .await;
        }

        Ok(PurchaseOrderDetail {
            order,
            items,
            status_history: vec![history],
            backorder_ids: Vec::new(),
        })
    }

    #[instrument(skip(self))]
    pub async fn get_purchase_order(
        &self,
        order_id: Uuid,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        let order = PurchaseOrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Purchase order {} not found", order_id))
            })?;

        let items = PurchaseOrderItemEntity::find()
            .filter(purchase_order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let status_history = OrderStatusHistoryEntity::find()
            .filter(order_status_history::Column::OrderId.eq(order_id))
            .order_by_asc(order_status_history::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let backorder_ids = self.get_backorder_ids(order_id).await?;

        Ok(PurchaseOrderDetail {
            order,
            items,
            status_history,
            backorder_ids,
        })
    }

    /// Backorders reference their parent through `original_order_id`.
    #[instrument(skip(self))]
    pub async fn get_backorder_ids(&self, order_id: Uuid) -> Result<Vec<Uuid>, ServiceError> {
        let backorders = PurchaseOrderEntity::find()
            .filter(purchase_order::Column::OriginalOrderId.eq(order_id))
            .order_by_asc(purchase_order::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(backorders.into_iter().map(|o| o.id).collect())
    }

    #[instrument(skip(self))]
    pub async fn get_backorders(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<purchase_order::Model>, ServiceError> {
        PurchaseOrderEntity::find()
            .filter(purchase_order::Column::OriginalOrderId.eq(order_id))
            .order_by_asc(purchase_order::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    #[instrument(skip(self))]
    pub async fn list_purchase_orders(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<purchase_order::Model>, u64), ServiceError> {
        let paginator = PurchaseOrderEntity::find()
            .order_by_desc(purchase_order::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));

        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let orders = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok((orders, total))
    }

    #[instrument(skip(self))]
    pub async fn get_orders_by_status(
        &self,
        status: PurchaseOrderStatus,
    ) -> Result<Vec<purchase_order::Model>, ServiceError> {
        PurchaseOrderEntity::find()
            .filter(purchase_order::Column::Status.eq(status.to_string()))
            .order_by_desc(purchase_order::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    #[instrument(skip(self))]
    pub async fn get_orders_by_supplier(
        &self,
        supplier_id: Uuid,
    ) -> Result<Vec<purchase_order::Model>, ServiceError> {
        PurchaseOrderEntity::find()
            .filter(purchase_order::Column::SupplierId.eq(supplier_id))
            .order_by_desc(purchase_order::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Administrative transitions only. Reception statuses are set
    /// exclusively by `ReceptionService::confirm_reception`.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: PurchaseOrderStatus,
        comment: Option<String>,
    ) -> Result<purchase_order::Model, ServiceError> {
        if matches!(
            new_status,
            PurchaseOrderStatus::Received | PurchaseOrderStatus::PartiallyReceived
        ) {
            return Err(ServiceError::InvalidOperation(
                "Reception statuses can only be set by confirming a reception".to_string(),
            ));
        }

        let txn = self.db.begin().await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        let order = PurchaseOrderEntity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Purchase order {} not found", order_id))
            })?;

        let current = PurchaseOrderStatus::from_str(&order.status).map_err(|_| {
            ServiceError::InternalError(format!("Unknown stored status '{}'", order.status))
        })?;

        if !is_allowed_transition(&current, &new_status) {
            return Err(ServiceError::InvalidStatus(format!(
                "Cannot transition purchase order from '{}' to '{}'",
                current, new_status
            )));
        }

        let old_status = order.status.clone();
        let mut active: purchase_order::ActiveModel = order.into();
        active.status = Set(new_status.to_string());
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await.map_err(ServiceError::DatabaseError)?;

        record_status_in_txn(&txn, order_id, &new_status, comment).await?;

        txn.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        info!(%order_id, %old_status, new_status = %updated.status, "purchase order status changed");

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::PurchaseOrderStatusChanged {
                    order_id,
                    old_status,
                    new_status: updated.status.clone(),
                })
                .await;
        }

        Ok(updated)
    }
}

fn is_allowed_transition(from: &PurchaseOrderStatus, to: &PurchaseOrderStatus) -> bool {
    use PurchaseOrderStatus::*;
    matches!(
        (from, to),
        (PendingApproval, Approved)
            | (PendingApproval, Rejected)
            | (Approved, SentToSupplier)
    )
}

/// Mints the next `OC-NNNNN` order number. Runs inside the caller's
/// transaction so the read-increment-write is atomic with the order
/// insert that consumes the number.
pub(crate) async fn mint_order_number(
    txn: &DatabaseTransaction,
) -> Result<String, ServiceError> {
    let counter = OrderCounterEntity::find_by_id(ORDER_COUNTER_NAME.to_string())
        .one(txn)
        .await
        .map_err(ServiceError::DatabaseError)?;

    let next = match counter {
        Some(counter) => {
            let next = counter.count + 1;
            let mut active: order_counter::ActiveModel = counter.into();
            active.count = Set(next);
            active.update(txn).await.map_err(ServiceError::DatabaseError)?;
            next
        }
        None => {
            let active = order_counter::ActiveModel {
                name: Set(ORDER_COUNTER_NAME.to_string()),
                count: Set(1),
            };
            active.insert(txn).await.map_err(ServiceError::DatabaseError)?;
            1
        }
    };

    Ok(format!("OC-{:05}", next))
}

pub(crate) async fn record_status_in_txn(
    txn: &DatabaseTransaction,
    order_id: Uuid,
    status: &PurchaseOrderStatus,
    comment: Option<String>,
) -> Result<order_status_history::Model, ServiceError> {
    let entry = order_status_history::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        status: Set(status.to_string()),
        comment: Set(comment),
        created_at: Set(Utc::now()),
    };
    entry.insert(txn).await.map_err(ServiceError::DatabaseError)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_input_rejects_empty_items() {
        let input = CreatePurchaseOrderInput {
            supplier_id: Uuid::new_v4(),
            supplier_name: "Proveedor".to_string(),
            project_id: None,
            project_name: None,
            estimated_delivery_date: None,
            items: Vec::new(),
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_allowed_transitions() {
        use PurchaseOrderStatus::*;
        assert!(is_allowed_transition(&PendingApproval, &Approved));
        assert!(is_allowed_transition(&PendingApproval, &Rejected));
        assert!(is_allowed_transition(&Approved, &SentToSupplier));

        assert!(!is_allowed_transition(&Approved, &PendingApproval));
        assert!(!is_allowed_transition(&SentToSupplier, &Approved));
        assert!(!is_allowed_transition(&Rejected, &Approved));
        assert!(!is_allowed_transition(&Received, &SentToSupplier));
    }
}
