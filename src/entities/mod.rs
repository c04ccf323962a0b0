pub mod order_counter;
pub mod order_status_history;
pub mod purchase_order;
pub mod purchase_order_item;
pub mod stock_level;

pub use purchase_order::PurchaseOrderStatus;
pub use purchase_order_item::LineType;
