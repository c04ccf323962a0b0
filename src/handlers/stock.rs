use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::common::{map_service_error, success_response, validate_input};
use crate::{errors::ApiError, handlers::AppState, services::stock::TransferStockInput};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct TransferStockRequest {
    pub item_id: Uuid,
    pub from_location_id: Uuid,
    pub to_location_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StockQuery {
    pub item_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
}

/// Query stock levels by item, location, or both
#[utoipa::path(
    get,
    path = "/api/v1/stock",
    params(StockQuery),
    responses(
        (status = 200, description = "Stock levels fetched", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Missing filter", body = crate::errors::ErrorResponse),
        (status = 404, description = "No stock record", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn get_stock(
    State(state): State<AppState>,
    Query(query): Query<StockQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    match (query.item_id, query.location_id) {
        (Some(item_id), Some(location_id)) => {
            let level = state
                .services
                .stock
                .get_stock_level(item_id, location_id)
                .await
                .map_err(map_service_error)?
                .ok_or_else(|| {
                    ApiError::NotFound(format!(
                        "No stock record for item {} at location {}",
                        item_id, location_id
                    ))
                })?;
            Ok(success_response(level))
        }
        (Some(item_id), None) => {
            let levels = state
                .services
                .stock
                .list_stock_for_item(item_id)
                .await
                .map_err(map_service_error)?;
            Ok(success_response(levels))
        }
        (None, Some(location_id)) => {
            let levels = state
                .services
                .stock
                .list_stock_at_location(location_id)
                .await
                .map_err(map_service_error)?;
            Ok(success_response(levels))
        }
        (None, None) => Err(ApiError::BadRequest(
            "Provide item_id, location_id, or both".to_string(),
        )),
    }
}

/// Transfer stock between two locations
#[utoipa::path(
    post,
    path = "/api/v1/stock/transfer",
    request_body = TransferStockRequest,
    responses(
        (status = 200, description = "Stock transferred", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "No stock at source", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn transfer_stock(
    State(state): State<AppState>,
    Json(payload): Json<TransferStockRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let (source, destination) = state
        .services
        .stock
        .transfer_stock(TransferStockInput {
            item_id: payload.item_id,
            from_location_id: payload.from_location_id,
            to_location_id: payload.to_location_id,
            quantity: payload.quantity,
        })
        .await
        .map_err(map_service_error)?;

    info!(
        "Stock transferred: item {} x{} from {} to {}",
        payload.item_id, payload.quantity, payload.from_location_id, payload.to_location_id
    );

    Ok(success_response(serde_json::json!({
        "source": source,
        "destination": destination,
    })))
}

/// Creates the router for stock endpoints
pub fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_stock))
        .route("/transfer", post(transfer_stock))
}
