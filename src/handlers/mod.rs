use std::sync::Arc;

use crate::{
    db::DbPool,
    events::EventSender,
    services::{PurchaseOrderService, ReceptionService, StockService},
};

pub mod common;
pub mod health;
pub mod purchase_orders;
pub mod stock;

pub use crate::AppState;

/// Service container threaded through every handler.
#[derive(Clone)]
pub struct AppServices {
    pub purchase_orders: Arc<PurchaseOrderService>,
    pub reception: Arc<ReceptionService>,
    pub stock: Arc<StockService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            purchase_orders: Arc::new(PurchaseOrderService::new(
                db_pool.clone(),
                Some(event_sender.clone()),
            )),
            reception: Arc::new(ReceptionService::new(
                db_pool.clone(),
                Some(event_sender.clone()),
            )),
            stock: Arc::new(StockService::new(db_pool, Some(event_sender))),
        }
    }
}
