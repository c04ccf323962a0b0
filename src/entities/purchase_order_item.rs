use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Line classification. Only material lines are ever stocked; service
/// lines never participate in reception.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, utoipa::ToSchema,
)]
pub enum LineType {
    #[strum(serialize = "Material")]
    #[serde(rename = "Material")]
    Material,
    #[strum(serialize = "Servicio")]
    #[serde(rename = "Servicio")]
    Service,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_order_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    pub item_id: Uuid,
    pub item_sku: String,
    pub item_name: String,
    /// Expected units. Immutable once the order exists; a partial
    /// reception records the shortfall on a new backorder instead.
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_type: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::purchase_order::Entity",
        from = "Column::OrderId",
        to = "super::purchase_order::Column::Id"
    )]
    PurchaseOrder,
}

impl Related<super::purchase_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseOrder.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_material(&self) -> bool {
        self.line_type == LineType::Material.to_string()
    }
}
