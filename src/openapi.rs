use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Fieldstock API",
        version = "1.0.0",
        description = r#"
Purchase order reception and stock tracking API.

- **Purchase Orders**: create orders, follow their lifecycle, and confirm
  goods receptions. A partial reception closes the original order and
  spawns a backorder carrying the undelivered quantity forward at the
  original line prices.
- **Stock**: per-location on-hand quantities, credited on reception and
  moved between locations with validated transfers.

Errors use a consistent envelope:

```json
{
  "error": "Not Found",
  "message": "Purchase order ... not found",
  "timestamp": "2026-01-01T00:00:00Z"
}
```
"#
    ),
    paths(
        crate::handlers::purchase_orders::create_purchase_order,
        crate::handlers::purchase_orders::list_purchase_orders,
        crate::handlers::purchase_orders::get_purchase_order,
        crate::handlers::purchase_orders::receive_purchase_order,
        crate::handlers::purchase_orders::get_backorders,
        crate::handlers::purchase_orders::update_purchase_order_status,
        crate::handlers::purchase_orders::get_purchase_orders_by_status,
        crate::handlers::purchase_orders::get_purchase_orders_by_supplier,
        crate::handlers::stock::get_stock,
        crate::handlers::stock::transfer_stock,
    ),
    components(schemas(
        crate::handlers::purchase_orders::CreatePurchaseOrderRequest,
        crate::handlers::purchase_orders::PurchaseOrderItemRequest,
        crate::handlers::purchase_orders::ReceivePurchaseOrderRequest,
        crate::handlers::purchase_orders::ReceivedItemRequest,
        crate::handlers::purchase_orders::UpdateStatusRequest,
        crate::handlers::stock::TransferStockRequest,
        crate::entities::PurchaseOrderStatus,
        crate::entities::LineType,
        crate::errors::ErrorResponse,
    )),
    tags(
        (name = "purchase-orders", description = "Purchase order lifecycle and reception"),
        (name = "stock", description = "Per-location stock levels and transfers")
    )
)]
pub struct ApiDoc;

/// Swagger UI mounted at `/docs`, serving the generated document at
/// `/api-docs/openapi.json`.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
