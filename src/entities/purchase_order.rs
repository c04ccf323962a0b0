use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle states of a purchase order. The canonical wire/database
/// strings are the Spanish labels the back office works with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, utoipa::ToSchema,
)]
pub enum PurchaseOrderStatus {
    #[strum(serialize = "Pendiente de Aprobación")]
    #[serde(rename = "Pendiente de Aprobación")]
    PendingApproval,
    #[strum(serialize = "Aprobada")]
    #[serde(rename = "Aprobada")]
    Approved,
    #[strum(serialize = "Enviada al Proveedor")]
    #[serde(rename = "Enviada al Proveedor")]
    SentToSupplier,
    #[strum(serialize = "Recibida")]
    #[serde(rename = "Recibida")]
    Received,
    #[strum(serialize = "Recibida Parcialmente")]
    #[serde(rename = "Recibida Parcialmente")]
    PartiallyReceived,
    #[strum(serialize = "Rechazado")]
    #[serde(rename = "Rechazado")]
    Rejected,
}

impl PurchaseOrderStatus {
    /// Terminal states accept no further transitions. A partially received
    /// order is terminal too: the outstanding quantity lives on in its
    /// backorder, never on the original order.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Received | Self::PartiallyReceived | Self::Rejected
        )
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_number: String,
    pub supplier_id: Uuid,
    pub supplier_name: String,
    pub project_id: Option<Uuid>,
    pub project_name: Option<String>,
    pub status: String,
    pub total: Decimal,
    pub order_date: DateTime<Utc>,
    pub estimated_delivery_date: Option<DateTime<Utc>>,
    pub reception_notes: Option<String>,
    /// Set on a backorder: the order whose partial reception spawned it.
    pub original_order_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::purchase_order_item::Entity")]
    Items,
    #[sea_orm(has_many = "super::order_status_history::Entity")]
    StatusHistory,
}

impl Related<super::purchase_order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::order_status_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_round_trips_through_canonical_strings() {
        let status = PurchaseOrderStatus::PartiallyReceived;
        assert_eq!(status.to_string(), "Recibida Parcialmente");
        assert_eq!(
            PurchaseOrderStatus::from_str("Recibida Parcialmente").unwrap(),
            status
        );
    }

    #[test]
    fn received_states_are_terminal() {
        assert!(PurchaseOrderStatus::Received.is_terminal());
        assert!(PurchaseOrderStatus::PartiallyReceived.is_terminal());
        assert!(!PurchaseOrderStatus::SentToSupplier.is_terminal());
    }
}
