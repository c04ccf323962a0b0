use std::str::FromStr;

use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::common::{
    created_response, map_service_error, success_response, validate_input, PaginatedResponse,
    PaginationParams,
};
use crate::{
    entities::{LineType, PurchaseOrderStatus},
    errors::ApiError,
    handlers::AppState,
    services::purchase_orders::{CreateOrderItemInput, CreatePurchaseOrderInput},
    services::reception::{ConfirmReceptionInput, ReceivedLine},
};

// Request DTOs

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreatePurchaseOrderRequest {
    pub supplier_id: Uuid,
    #[validate(length(min = 1))]
    pub supplier_name: String,
    pub project_id: Option<Uuid>,
    pub project_name: Option<String>,
    pub estimated_delivery_date: Option<DateTime<Utc>>,
    #[validate(length(min = 1))]
    pub items: Vec<PurchaseOrderItemRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct PurchaseOrderItemRequest {
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

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReceivePurchaseOrderRequest {
    pub receiving_location_id: Uuid,
    pub received_items: Vec<ReceivedItemRequest>,
    #[validate(length(max = 1000))]
    pub reception_notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReceivedItemRequest {
    pub item_id: Uuid,
    #[validate(range(min = 0))]
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: PurchaseOrderStatus,
    #[validate(length(max = 500))]
    pub comment: Option<String>,
}

// Handler functions

/// Create a new purchase order
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders",
    request_body = CreatePurchaseOrderRequest,
    responses(
        (status = 201, description = "Purchase order created", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn create_purchase_order(
    State(state): State<AppState>,
    Json(payload): Json<CreatePurchaseOrderRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;
    for item in &payload.items {
        validate_input(item)?;
    }

    let input = CreatePurchaseOrderInput {
        supplier_id: payload.supplier_id,
        supplier_name: payload.supplier_name,
        project_id: payload.project_id,
        project_name: payload.project_name,
        estimated_delivery_date: payload.estimated_delivery_date,
        items: payload
            .items
            .into_iter()
            .map(|item| CreateOrderItemInput {
                item_id: item.item_id,
                item_sku: item.item_sku,
                item_name: item.item_name,
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_type: item.line_type,
            })
            .collect(),
    };

    let detail = state
        .services
        .purchase_orders
        .create_purchase_order(input)
        .await
        .map_err(map_service_error)?;

    info!("Purchase order created: {}", detail.order.order_number);

    Ok(created_response(detail))
}

/// Get a purchase order with its lines, history, and backorders
#[utoipa::path(
    get,
    path = "/api/v1/purchase-orders/{id}",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Purchase order fetched", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Purchase order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn get_purchase_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let detail = state
        .services
        .purchase_orders
        .get_purchase_order(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(detail))
}

/// List purchase orders
#[utoipa::path(
    get,
    path = "/api/v1/purchase-orders",
    params(PaginationParams),
    responses(
        (status = 200, description = "Purchase orders listed", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "purchase-orders"
)]
pub async fn list_purchase_orders(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (orders, total) = state
        .services
        .purchase_orders
        .list_purchase_orders(params.page, params.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        orders,
        params.page,
        params.per_page,
        total,
    )))
}

/// Confirm a goods reception against a purchase order
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/receive",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    request_body = ReceivePurchaseOrderRequest,
    responses(
        (status = 200, description = "Reception confirmed", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid line, over-receipt, or terminal order", body = crate::errors::ErrorResponse),
        (status = 404, description = "Purchase order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn receive_purchase_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReceivePurchaseOrderRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;
    for item in &payload.received_items {
        validate_input(item)?;
    }

    let input = ConfirmReceptionInput {
        receiving_location_id: payload.receiving_location_id,
        received_items: payload
            .received_items
            .into_iter()
            .map(|item| ReceivedLine {
                item_id: item.item_id,
                quantity: item.quantity,
            })
            .collect(),
        reception_notes: payload.reception_notes,
    };

    let outcome = state
        .services
        .reception
        .confirm_reception(id, input)
        .await
        .map_err(map_service_error)?;

    info!(
        "Reception confirmed for {}: {}",
        outcome.order.order_number, outcome.order.status
    );

    Ok(success_response(serde_json::json!({
        "order_id": outcome.order.id,
        "status": outcome.order.status,
        "backorder_id": outcome.backorder.as_ref().map(|b| b.id),
        "backorder_number": outcome.backorder.as_ref().map(|b| b.order_number.clone()),
    })))
}

/// List the backorders spawned by an order's partial receptions
#[utoipa::path(
    get,
    path = "/api/v1/purchase-orders/{id}/backorders",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Backorders listed", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "purchase-orders"
)]
pub async fn get_backorders(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    // 404 for an unknown parent rather than an empty list
    state
        .services
        .purchase_orders
        .get_purchase_order(id)
        .await
        .map_err(map_service_error)?;

    let backorders = state
        .services
        .purchase_orders
        .get_backorders(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(backorders))
}

/// Update a purchase order's status
#[utoipa::path(
    put,
    path = "/api/v1/purchase-orders/{id}/status",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid transition", body = crate::errors::ErrorResponse),
        (status = 404, description = "Purchase order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn update_purchase_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let order = state
        .services
        .purchase_orders
        .update_status(id, payload.status, payload.comment)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// List purchase orders in a given status
#[utoipa::path(
    get,
    path = "/api/v1/purchase-orders/status/{status}",
    params(("status" = String, Path, description = "Canonical status label")),
    responses(
        (status = 200, description = "Purchase orders listed", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Unknown status", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn get_purchase_orders_by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let status = PurchaseOrderStatus::from_str(&status)
        .map_err(|_| ApiError::BadRequest(format!("Unknown status '{}'", status)))?;

    let orders = state
        .services
        .purchase_orders
        .get_orders_by_status(status)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(orders))
}

/// List purchase orders for a supplier
#[utoipa::path(
    get,
    path = "/api/v1/purchase-orders/supplier/{supplier_id}",
    params(("supplier_id" = Uuid, Path, description = "Supplier ID")),
    responses(
        (status = 200, description = "Purchase orders listed", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "purchase-orders"
)]
pub async fn get_purchase_orders_by_supplier(
    State(state): State<AppState>,
    Path(supplier_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let orders = state
        .services
        .purchase_orders
        .get_orders_by_supplier(supplier_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(orders))
}

/// Creates the router for purchase order endpoints
pub fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_purchase_order))
        .route("/", get(list_purchase_orders))
        .route("/:id", get(get_purchase_order))
        .route("/:id/receive", post(receive_purchase_order))
        .route("/:id/backorders", get(get_backorders))
        .route("/:id/status", put(update_purchase_order_status))
        .route("/status/:status", get(get_purchase_orders_by_status))
        .route(
            "/supplier/:supplier_id",
            get(get_purchase_orders_by_supplier),
        )
}
