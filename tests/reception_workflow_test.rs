use std::sync::Arc;

use fieldstock_api::{
    db::{establish_connection_with_config, run_migrations, DbConfig, DbPool},
    entities::{
        purchase_order::PurchaseOrderStatus,
        purchase_order_item::{self, Entity as PurchaseOrderItem},
        stock_level::{self, Entity as StockLevel},
        LineType,
    },
    errors::ServiceError,
    services::{
        purchase_orders::{CreateOrderItemInput, CreatePurchaseOrderInput, PurchaseOrderService},
        reception::{ConfirmReceptionInput, ReceivedLine, ReceptionService},
    },
};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

async fn setup_db() -> Arc<DbPool> {
    // one connection per pool keeps each test on its own in-memory database
    let config = DbConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        ..Default::default()
    };
    let pool = establish_connection_with_config(&config)
        .await
        .expect("Failed to create DB pool");
    run_migrations(&pool).await.expect("Failed to run migrations");
    Arc::new(pool)
}

fn dec(value: i64) -> Decimal {
    Decimal::from(value)
}

fn material_line(item_id: Uuid, sku: &str, quantity: i32, price: i64) -> CreateOrderItemInput {
    CreateOrderItemInput {
        item_id,
        item_sku: sku.to_string(),
        item_name: format!("Item {}", sku),
        quantity,
        unit_price: dec(price),
        line_type: LineType::Material,
    }
}

fn service_line(item_id: Uuid, sku: &str, quantity: i32, price: i64) -> CreateOrderItemInput {
    CreateOrderItemInput {
        item_id,
        item_sku: sku.to_string(),
        item_name: format!("Servicio {}", sku),
        quantity,
        unit_price: dec(price),
        line_type: LineType::Service,
    }
}

/// Creates an order and walks it to `Enviada al Proveedor`, the state
/// in which goods arrive.
async fn seed_sent_order(
    orders: &PurchaseOrderService,
    items: Vec<CreateOrderItemInput>,
) -> Uuid {
    let detail = orders
        .create_purchase_order(CreatePurchaseOrderInput {
            supplier_id: Uuid::new_v4(),
            supplier_name: "Suministros del Norte".to_string(),
            project_id: Some(Uuid::new_v4()),
            project_name: Some("Obra Central".to_string()),
            estimated_delivery_date: None,
            items,
        })
        .await
        .expect("Failed to create order");
    let id = detail.order.id;

    orders
        .update_status(id, PurchaseOrderStatus::Approved, None)
        .await
        .expect("Failed to approve");
    orders
        .update_status(id, PurchaseOrderStatus::SentToSupplier, None)
        .await
        .expect("Failed to send to supplier");
    id
}

async fn stock_quantity(db: &DbPool, item_id: Uuid, location_id: Uuid) -> Option<i32> {
    StockLevel::find()
        .filter(stock_level::Column::ItemId.eq(item_id))
        .filter(stock_level::Column::LocationId.eq(location_id))
        .one(db)
        .await
        .expect("stock query failed")
        .map(|row| row.quantity)
}

#[tokio::test]
async fn full_reception_marks_order_received() {
    let db = setup_db().await;
    let orders = PurchaseOrderService::new(db.clone(), None);
    let reception = ReceptionService::new(db.clone(), None);

    let item_id = Uuid::new_v4();
    let location = Uuid::new_v4();
    let order_id = seed_sent_order(&orders, vec![material_line(item_id, "CAB-10", 10, 5)]).await;

    let outcome = reception
        .confirm_reception(
            order_id,
            ConfirmReceptionInput {
                receiving_location_id: location,
                received_items: vec![ReceivedLine {
                    item_id,
                    quantity: 10,
                }],
                reception_notes: Some("todo completo".to_string()),
            },
        )
        .await
        .expect("reception should succeed");

    assert_eq!(outcome.status, PurchaseOrderStatus::Received);
    assert_eq!(outcome.order.status, "Recibida");
    assert!(outcome.backorder.is_none());
    assert_eq!(
        outcome.order.reception_notes.as_deref(),
        Some("todo completo")
    );
    assert_eq!(stock_quantity(&db, item_id, location).await, Some(10));
}

#[tokio::test]
async fn partial_reception_spawns_priced_backorder() {
    let db = setup_db().await;
    let orders = PurchaseOrderService::new(db.clone(), None);
    let reception = ReceptionService::new(db.clone(), None);

    let item_id = Uuid::new_v4();
    let location = Uuid::new_v4();
    // expected 10 at unit price 5
    let order_id = seed_sent_order(&orders, vec![material_line(item_id, "TUB-20", 10, 5)]).await;

    let outcome = reception
        .confirm_reception(
            order_id,
            ConfirmReceptionInput {
                receiving_location_id: location,
                received_items: vec![ReceivedLine {
                    item_id,
                    quantity: 6,
                }],
                reception_notes: None,
            },
        )
        .await
        .expect("reception should succeed");

    assert_eq!(outcome.status, PurchaseOrderStatus::PartiallyReceived);
    assert_eq!(outcome.order.status, "Recibida Parcialmente");
    assert_eq!(stock_quantity(&db, item_id, location).await, Some(6));

    let backorder = outcome.backorder.expect("backorder expected");
    assert_eq!(backorder.original_order_id, Some(order_id));
    assert_eq!(backorder.status, "Enviada al Proveedor");
    assert_eq!(backorder.total, dec(20));
    assert!(backorder.order_number.starts_with("OC-"));

    let lines = PurchaseOrderItem::find()
        .filter(purchase_order_item::Column::OrderId.eq(backorder.id))
        .all(db.as_ref())
        .await
        .expect("backorder lines query failed");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].item_id, item_id);
    assert_eq!(lines[0].quantity, 4);
    assert_eq!(lines[0].unit_price, dec(5));
    assert_eq!(lines[0].line_type, "Material");

    // the parent exposes its backorders through the back-reference
    let backorder_ids = orders
        .get_backorder_ids(order_id)
        .await
        .expect("backorder ids query failed");
    assert_eq!(backorder_ids, vec![backorder.id]);

    let detail = orders
        .get_purchase_order(order_id)
        .await
        .expect("detail query failed");
    assert_eq!(detail.backorder_ids, vec![backorder.id]);
    // original lines are untouched by the reception
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].quantity, 10);
    let last = detail.status_history.last().expect("history expected");
    assert!(last
        .comment
        .as_deref()
        .unwrap_or_default()
        .contains(&backorder.order_number));
}

#[tokio::test]
async fn repeated_receptions_increment_one_stock_row() {
    let db = setup_db().await;
    let orders = PurchaseOrderService::new(db.clone(), None);
    let reception = ReceptionService::new(db.clone(), None);

    let item_id = Uuid::new_v4();
    let location = Uuid::new_v4();

    for _ in 0..2 {
        let order_id =
            seed_sent_order(&orders, vec![material_line(item_id, "PER-01", 7, 3)]).await;
        reception
            .confirm_reception(
                order_id,
                ConfirmReceptionInput {
                    receiving_location_id: location,
                    received_items: vec![ReceivedLine {
                        item_id,
                        quantity: 7,
                    }],
                    reception_notes: None,
                },
            )
            .await
            .expect("reception should succeed");
    }

    let rows = StockLevel::find()
        .filter(stock_level::Column::ItemId.eq(item_id))
        .filter(stock_level::Column::LocationId.eq(location))
        .all(db.as_ref())
        .await
        .expect("stock query failed");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].quantity, 14);
}

#[tokio::test]
async fn service_lines_never_participate_in_reception() {
    let db = setup_db().await;
    let orders = PurchaseOrderService::new(db.clone(), None);
    let reception = ReceptionService::new(db.clone(), None);

    let material_id = Uuid::new_v4();
    let service_id = Uuid::new_v4();
    let location = Uuid::new_v4();
    let order_id = seed_sent_order(
        &orders,
        vec![
            material_line(material_id, "VAL-05", 5, 8),
            service_line(service_id, "INST-01", 3, 40),
        ],
    )
    .await;

    let outcome = reception
        .confirm_reception(
            order_id,
            ConfirmReceptionInput {
                receiving_location_id: location,
                received_items: vec![ReceivedLine {
                    item_id: material_id,
                    quantity: 5,
                }],
                reception_notes: None,
            },
        )
        .await
        .expect("reception should succeed");

    // the unreceived service line does not make the receipt partial
    assert_eq!(outcome.status, PurchaseOrderStatus::Received);
    assert!(outcome.backorder.is_none());
    assert_eq!(stock_quantity(&db, service_id, location).await, None);

    // naming a service line in the input is an error
    let order_id2 = seed_sent_order(
        &orders,
        vec![
            material_line(Uuid::new_v4(), "VAL-06", 5, 8),
            service_line(service_id, "INST-02", 3, 40),
        ],
    )
    .await;
    let err = reception
        .confirm_reception(
            order_id2,
            ConfirmReceptionInput {
                receiving_location_id: location,
                received_items: vec![ReceivedLine {
                    item_id: service_id,
                    quantity: 3,
                }],
                reception_notes: None,
            },
        )
        .await
        .expect_err("service line must be rejected");
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn zero_quantity_lines_are_skipped_not_stocked() {
    let db = setup_db().await;
    let orders = PurchaseOrderService::new(db.clone(), None);
    let reception = ReceptionService::new(db.clone(), None);

    let item_id = Uuid::new_v4();
    let location = Uuid::new_v4();
    let order_id = seed_sent_order(&orders, vec![material_line(item_id, "CON-09", 4, 6)]).await;

    let outcome = reception
        .confirm_reception(
            order_id,
            ConfirmReceptionInput {
                receiving_location_id: location,
                received_items: vec![ReceivedLine {
                    item_id,
                    quantity: 0,
                }],
                reception_notes: None,
            },
        )
        .await
        .expect("reception should succeed");

    // nothing received: partial with the whole quantity on the backorder
    assert_eq!(outcome.status, PurchaseOrderStatus::PartiallyReceived);
    assert_eq!(stock_quantity(&db, item_id, location).await, None);
    let backorder = outcome.backorder.expect("backorder expected");
    assert_eq!(backorder.total, dec(24));
}

#[tokio::test]
async fn over_receipt_is_rejected_without_side_effects() {
    let db = setup_db().await;
    let orders = PurchaseOrderService::new(db.clone(), None);
    let reception = ReceptionService::new(db.clone(), None);

    let item_id = Uuid::new_v4();
    let location = Uuid::new_v4();
    let order_id = seed_sent_order(&orders, vec![material_line(item_id, "BOM-03", 10, 5)]).await;

    let err = reception
        .confirm_reception(
            order_id,
            ConfirmReceptionInput {
                receiving_location_id: location,
                received_items: vec![ReceivedLine {
                    item_id,
                    quantity: 12,
                }],
                reception_notes: None,
            },
        )
        .await
        .expect_err("over-receipt must be rejected");
    assert!(matches!(err, ServiceError::InvalidOperation(_)));

    // order and stock untouched
    let detail = orders
        .get_purchase_order(order_id)
        .await
        .expect("detail query failed");
    assert_eq!(detail.order.status, "Enviada al Proveedor");
    assert!(detail.backorder_ids.is_empty());
    assert_eq!(stock_quantity(&db, item_id, location).await, None);
}

#[tokio::test]
async fn duplicate_lines_accumulate_against_the_expected_quantity() {
    let db = setup_db().await;
    let orders = PurchaseOrderService::new(db.clone(), None);
    let reception = ReceptionService::new(db.clone(), None);

    let item_id = Uuid::new_v4();
    let location = Uuid::new_v4();

    // two lines of 6 against an expected 10 is an over-receipt
    let order_id = seed_sent_order(&orders, vec![material_line(item_id, "DUP-01", 10, 5)]).await;
    let err = reception
        .confirm_reception(
            order_id,
            ConfirmReceptionInput {
                receiving_location_id: location,
                received_items: vec![
                    ReceivedLine {
                        item_id,
                        quantity: 6,
                    },
                    ReceivedLine {
                        item_id,
                        quantity: 6,
                    },
                ],
                reception_notes: None,
            },
        )
        .await
        .expect_err("accumulated over-receipt must be rejected");
    assert!(matches!(err, ServiceError::InvalidOperation(_)));
    assert_eq!(stock_quantity(&db, item_id, location).await, None);

    // split lines summing to the expected quantity complete the order
    let outcome = reception
        .confirm_reception(
            order_id,
            ConfirmReceptionInput {
                receiving_location_id: location,
                received_items: vec![
                    ReceivedLine {
                        item_id,
                        quantity: 4,
                    },
                    ReceivedLine {
                        item_id,
                        quantity: 6,
                    },
                ],
                reception_notes: None,
            },
        )
        .await
        .expect("split reception should succeed");
    assert_eq!(outcome.status, PurchaseOrderStatus::Received);
    assert!(outcome.backorder.is_none());
    assert_eq!(stock_quantity(&db, item_id, location).await, Some(10));
}

#[tokio::test]
async fn unknown_order_and_terminal_order_are_rejected() {
    let db = setup_db().await;
    let orders = PurchaseOrderService::new(db.clone(), None);
    let reception = ReceptionService::new(db.clone(), None);

    let input = |item_id: Uuid| ConfirmReceptionInput {
        receiving_location_id: Uuid::new_v4(),
        received_items: vec![ReceivedLine {
            item_id,
            quantity: 2,
        }],
        reception_notes: None,
    };

    let err = reception
        .confirm_reception(Uuid::new_v4(), input(Uuid::new_v4()))
        .await
        .expect_err("unknown order must be rejected");
    assert!(matches!(err, ServiceError::NotFound(_)));

    let item_id = Uuid::new_v4();
    let order_id = seed_sent_order(&orders, vec![material_line(item_id, "CAJ-02", 2, 9)]).await;
    reception
        .confirm_reception(order_id, input(item_id))
        .await
        .expect("first reception should succeed");

    let err = reception
        .confirm_reception(order_id, input(item_id))
        .await
        .expect_err("second reception must be rejected");
    assert!(matches!(err, ServiceError::InvalidStatus(_)));
}

#[tokio::test]
async fn orders_mint_sequential_human_readable_numbers() {
    let db = setup_db().await;
    let orders = PurchaseOrderService::new(db.clone(), None);

    let first = orders
        .create_purchase_order(CreatePurchaseOrderInput {
            supplier_id: Uuid::new_v4(),
            supplier_name: "Proveedor A".to_string(),
            project_id: None,
            project_name: None,
            estimated_delivery_date: None,
            items: vec![material_line(Uuid::new_v4(), "NUM-01", 1, 1)],
        })
        .await
        .expect("create failed");
    let second = orders
        .create_purchase_order(CreatePurchaseOrderInput {
            supplier_id: Uuid::new_v4(),
            supplier_name: "Proveedor B".to_string(),
            project_id: None,
            project_name: None,
            estimated_delivery_date: None,
            items: vec![material_line(Uuid::new_v4(), "NUM-02", 1, 1)],
        })
        .await
        .expect("create failed");

    for detail in [&first, &second] {
        let number = &detail.order.order_number;
        assert!(number.starts_with("OC-"), "unexpected number {}", number);
        assert_eq!(number.len(), 8);
        assert!(number[3..].chars().all(|c| c.is_ascii_digit()));
    }
    assert_ne!(first.order.order_number, second.order.order_number);
    assert_eq!(first.order.status, "Pendiente de Aprobación");
    assert_eq!(first.order.total, dec(1));
    assert_eq!(first.status_history.len(), 1);
}

#[tokio::test]
async fn administrative_transitions_are_guarded() {
    let db = setup_db().await;
    let orders = PurchaseOrderService::new(db.clone(), None);

    let detail = orders
        .create_purchase_order(CreatePurchaseOrderInput {
            supplier_id: Uuid::new_v4(),
            supplier_name: "Proveedor C".to_string(),
            project_id: None,
            project_name: None,
            estimated_delivery_date: None,
            items: vec![material_line(Uuid::new_v4(), "TRA-01", 1, 1)],
        })
        .await
        .expect("create failed");
    let id = detail.order.id;

    // skipping approval is not allowed
    let err = orders
        .update_status(id, PurchaseOrderStatus::SentToSupplier, None)
        .await
        .expect_err("skipping approval must fail");
    assert!(matches!(err, ServiceError::InvalidStatus(_)));

    // reception statuses are reserved for the reception flow
    let err = orders
        .update_status(id, PurchaseOrderStatus::Received, None)
        .await
        .expect_err("direct reception status must fail");
    assert!(matches!(err, ServiceError::InvalidOperation(_)));

    // rejection is terminal
    orders
        .update_status(id, PurchaseOrderStatus::Rejected, Some("sin stock".to_string()))
        .await
        .expect("rejection should succeed");
    let err = orders
        .update_status(id, PurchaseOrderStatus::Approved, None)
        .await
        .expect_err("terminal order must not transition");
    assert!(matches!(err, ServiceError::InvalidStatus(_)));
}
