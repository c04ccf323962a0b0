pub mod purchase_orders;
pub mod reception;
pub mod stock;

pub use purchase_orders::PurchaseOrderService;
pub use reception::ReceptionService;
pub use stock::StockService;
