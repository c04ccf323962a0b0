use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Named monotonic sequence backing human-readable order numbers.
/// Read and incremented inside the same transaction as the order insert,
/// so two concurrent callers can never mint the same number.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_counters")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,
    pub count: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
