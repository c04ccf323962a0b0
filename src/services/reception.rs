use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, TransactionTrait,
};
use serde::Deserialize;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{
        purchase_order::{self, Entity as PurchaseOrderEntity, PurchaseOrderStatus},
        purchase_order_item::{self, Entity as PurchaseOrderItemEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::purchase_orders::{mint_order_number, record_status_in_txn},
    services::stock::add_stock_in_txn,
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReceivedLine {
    pub item_id: Uuid,
    #[validate(range(min = 0))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ConfirmReceptionInput {
    pub receiving_location_id: Uuid,
    pub received_items: Vec<ReceivedLine>,
    pub reception_notes: Option<String>,
}

/// What a confirmed reception produced: the updated order and, for a
/// partial receipt, the backorder carrying the shortfall forward.
#[derive(Debug, Clone)]
pub struct ReceptionOutcome {
    pub order: purchase_order::Model,
    pub status: PurchaseOrderStatus,
    pub backorder: Option<purchase_order::Model>,
}

/// Applies goods receipts against open purchase orders. Stock credit,
/// status change, audit entries, and backorder creation all commit as
/// one transaction.
#[derive(Clone)]
pub struct ReceptionService {
    db: Arc<DbPool>,
    event_sender: Option<EventSender>,
}

impl ReceptionService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Confirms a reception against `order_id`.
    ///
    /// Material lines compare received against expected: every line
    /// fully received yields `Recibida`; any shortfall yields
    /// `Recibida Parcialmente` plus one backorder whose lines are
    /// exactly the shortfalls at the original price. Service lines and
    /// zero-quantity receipts are skipped. A received quantity above
    /// the expected quantity rejects the whole reception.
    #[instrument(skip(self, input), fields(order_id = %order_id))]
    pub async fn confirm_reception(
        &self,
        order_id: Uuid,
        input: ConfirmReceptionInput,
    ) -> Result<ReceptionOutcome, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        for line in &input.received_items {
            line.validate()
                .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
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
        if current.is_terminal() {
            return Err(ServiceError::InvalidStatus(format!(
                "Purchase order {} is already '{}' and cannot receive goods",
                order.order_number, current
            )));
        }

        let items = PurchaseOrderItemEntity::find()
            .filter(purchase_order_item::Column::OrderId.eq(order_id))
            .all(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        // Only material lines participate; service lines are never stocked.
        let material_items: Vec<&purchase_order_item::Model> =
            items.iter().filter(|i| i.is_material()).collect();

        // Duplicate lines for one item accumulate before any check, so
        // the over-receipt guard sees the item's total.
        let mut received_by_item: HashMap<Uuid, i32> = HashMap::new();
        for line in &input.received_items {
            if !material_items.iter().any(|i| i.item_id == line.item_id) {
                return Err(ServiceError::ValidationError(format!(
                    "Item {} is not a material line of order {}",
                    line.item_id, order.order_number
                )));
            }
            *received_by_item.entry(line.item_id).or_insert(0) += line.quantity;
        }
        for item in &material_items {
            let received = received_by_item.get(&item.item_id).copied().unwrap_or(0);
            if received > item.quantity {
                return Err(ServiceError::InvalidOperation(format!(
                    "Received {} units of item {} but only {} were expected",
                    received, item.item_id, item.quantity
                )));
            }
        }

        for (item_id, quantity) in &received_by_item {
            if *quantity > 0 {
                add_stock_in_txn(&txn, *item_id, input.receiving_location_id, *quantity)
                    .await?;
            }
        }

        // A line absent from the input counts as received zero.
        let mut shortfalls: Vec<(&purchase_order_item::Model, i32)> = Vec::new();
        for item in &material_items {
            let received = received_by_item.get(&item.item_id).copied().unwrap_or(0);
            if received < item.quantity {
                shortfalls.push((*item, item.quantity - received));
            }
        }

        let new_status = if shortfalls.is_empty() {
            PurchaseOrderStatus::Received
        } else {
            PurchaseOrderStatus::PartiallyReceived
        };

        let now = Utc::now();
        let mut backorder: Option<purchase_order::Model> = None;

        if !shortfalls.is_empty() {
            let backorder_number = mint_order_number(&txn).await?;
            let backorder_id = Uuid::new_v4();
            let backorder_total: Decimal = shortfalls
                .iter()
                .map(|(item, qty)| item.unit_price * Decimal::from(*qty))
                .sum();

            let row = purchase_order::ActiveModel {
                id: Set(backorder_id),
                order_number: Set(backorder_number),
                supplier_id: Set(order.supplier_id),
                supplier_name: Set(order.supplier_name.clone()),
                project_id: Set(order.project_id),
                project_name: Set(order.project_name.clone()),
                status: Set(PurchaseOrderStatus::SentToSupplier.to_string()),
                total: Set(backorder_total),
                order_date: Set(now),
                estimated_delivery_date: Set(None),
                reception_notes: Set(None),
                original_order_id: Set(Some(order_id)),
                created_at: Set(now),
                updated_at: Set(now),
            };
            let created = row.insert(&txn).await.map_err(ServiceError::DatabaseError)?;

            for (item, shortfall) in &shortfalls {
                let line = purchase_order_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_id: Set(backorder_id),
                    item_id: Set(item.item_id),
                    item_sku: Set(item.item_sku.clone()),
                    item_name: Set(item.item_name.clone()),
                    quantity: Set(*shortfall),
                    unit_price: Set(item.unit_price),
                    line_type: Set(item.line_type.clone()),
                };
                line.insert(&txn).await.map_err(ServiceError::DatabaseError)?;
            }

            let backorder_comment = match &input.reception_notes {
                Some(notes) => format!(
                    "Backorder of {} after partial reception: {}",
                    order.order_number, notes
                ),
                None => format!("Backorder of {} after partial reception", order.order_number),
            };
            record_status_in_txn(
                &txn,
                backorder_id,
                &PurchaseOrderStatus::SentToSupplier,
                Some(backorder_comment),
            )
            .await?;

            backorder = Some(created);
        }

        let parent_comment = match &backorder {
            Some(b) => format!("Partial reception, backorder {} created", b.order_number),
            None => "Full reception".to_string(),
        };
        record_status_in_txn(&txn, order_id, &new_status, Some(parent_comment)).await?;

        let old_status = order.status.clone();
        let mut active: purchase_order::ActiveModel = order.into();
        active.status = Set(new_status.to_string());
        active.reception_notes = Set(input.reception_notes.clone());
        active.updated_at = Set(now);
        let updated = active.update(&txn).await.map_err(ServiceError::DatabaseError)?;

        txn.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        info!(
            %order_id,
            %old_status,
            new_status = %updated.status,
            backorder_id = ?backorder.as_ref().map(|b| b.id),
            "reception confirmed"
        );

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::PurchaseOrderReceived {
                    order_id,
                    new_status: updated.status.clone(),
                })
                .await;
            for (item_id, quantity) in &received_by_item {
                if *quantity > 0 {
                    sender
                        .send_or_log(Event::StockReceived {
                            item_id: *item_id,
                            location_id: input.receiving_location_id,
                            quantity: *quantity,
                        })
                        .await;
                }
            }
            if let Some(b) = &backorder {
                sender
                    .send_or_log(Event::BackorderCreated {
                        original_order_id: order_id,
                        backorder_id: b.id,
                        backorder_number: b.order_number.clone(),
                    })
                    .await;
            }
        }

        Ok(ReceptionOutcome {
            order: updated,
            status: new_status,
            backorder,
        })
    }
}
