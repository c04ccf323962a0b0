use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Events emitted after a transaction commits. Consumers observe state
/// that is already durable; nothing here participates in the write path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    PurchaseOrderCreated {
        order_id: Uuid,
        order_number: String,
    },
    PurchaseOrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    PurchaseOrderReceived {
        order_id: Uuid,
        new_status: String,
    },
    BackorderCreated {
        original_order_id: Uuid,
        backorder_id: Uuid,
        backorder_number: String,
    },
    StockReceived {
        item_id: Uuid,
        location_id: Uuid,
        quantity: i32,
    },
    StockTransferred {
        item_id: Uuid,
        from_location_id: Uuid,
        to_location_id: Uuid,
        quantity: i32,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) -> Result<(), ServiceError> {
        self.sender
            .send(event)
            .await
            .map_err(|e| ServiceError::EventError(format!("failed to send event: {}", e)))
    }

    /// Send without surfacing the error to the caller. Used after commit,
    /// where a dropped consumer must not fail an already-durable write.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("event dropped: {}", e);
        }
    }
}

/// Consumes the event channel and logs each event. Runs until every
/// sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::PurchaseOrderCreated {
                order_id,
                order_number,
            } => {
                info!(%order_id, %order_number, "purchase order created");
            }
            Event::PurchaseOrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(%order_id, %old_status, %new_status, "purchase order status changed");
            }
            Event::PurchaseOrderReceived {
                order_id,
                new_status,
            } => {
                info!(%order_id, %new_status, "purchase order reception recorded");
            }
            Event::BackorderCreated {
                original_order_id,
                backorder_id,
                backorder_number,
            } => {
                info!(%original_order_id, %backorder_id, %backorder_number, "backorder created");
            }
            Event::StockReceived {
                item_id,
                location_id,
                quantity,
            } => {
                info!(%item_id, %location_id, quantity, "stock received");
            }
            Event::StockTransferred {
                item_id,
                from_location_id,
                to_location_id,
                quantity,
            } => {
                info!(%item_id, %from_location_id, %to_location_id, quantity, "stock transferred");
            }
        }
    }

    info!("event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_and_receive() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);
        let order_id = Uuid::new_v4();

        sender
            .send(Event::PurchaseOrderCreated {
                order_id,
                order_number: "OC-00001".to_string(),
            })
            .await
            .unwrap();

        match rx.recv().await {
            Some(Event::PurchaseOrderCreated {
                order_id: got,
                order_number,
            }) => {
                assert_eq!(got, order_id);
                assert_eq!(order_number, "OC-00001");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped_is_error() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        let result = sender
            .send(Event::StockReceived {
                item_id: Uuid::new_v4(),
                location_id: Uuid::new_v4(),
                quantity: 5,
            })
            .await;
        assert!(result.is_err());
    }
}
