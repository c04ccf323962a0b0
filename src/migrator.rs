use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_purchase_order_tables::Migration),
            Box::new(m20250101_000002_create_stock_levels_table::Migration),
            Box::new(m20250101_000003_create_order_counters_table::Migration),
        ]
    }
}

// Migration implementations

mod m20250101_000001_create_purchase_order_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_purchase_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrders::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::OrderNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::SupplierId).uuid().not_null())
                        .col(
                            ColumnDef::new(PurchaseOrders::SupplierName)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::ProjectId).uuid().null())
                        .col(ColumnDef::new(PurchaseOrders::ProjectName).string().null())
                        .col(ColumnDef::new(PurchaseOrders::Status).string().not_null())
                        .col(
                            ColumnDef::new(PurchaseOrders::Total)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::OrderDate)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::EstimatedDeliveryDate)
                                .timestamp()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::ReceptionNotes)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::OriginalOrderId)
                                .uuid()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_orders_status")
                        .table(PurchaseOrders::Table)
                        .col(PurchaseOrders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_orders_supplier_id")
                        .table(PurchaseOrders::Table)
                        .col(PurchaseOrders::SupplierId)
                        .to_owned(),
                )
                .await?;

            // Backorders are found through this back-reference
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_orders_original_order_id")
                        .table(PurchaseOrders::Table)
                        .col(PurchaseOrders::OriginalOrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderItems::OrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrderItems::ItemId).uuid().not_null())
                        .col(
                            ColumnDef::new(PurchaseOrderItems::ItemSku)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderItems::ItemName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderItems::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderItems::UnitPrice)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderItems::LineType)
                                .string()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_order_items_order_id")
                                .from(PurchaseOrderItems::Table, PurchaseOrderItems::OrderId)
                                .to(PurchaseOrders::Table, PurchaseOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_order_items_order_id")
                        .table(PurchaseOrderItems::Table)
                        .col(PurchaseOrderItems::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderStatusHistory::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderStatusHistory::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderStatusHistory::OrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderStatusHistory::Status)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderStatusHistory::Comment).string().null())
                        .col(
                            ColumnDef::new(OrderStatusHistory::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_status_history_order_id")
                                .from(OrderStatusHistory::Table, OrderStatusHistory::OrderId)
                                .to(PurchaseOrders::Table, PurchaseOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_status_history_order_id")
                        .table(OrderStatusHistory::Table)
                        .col(OrderStatusHistory::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderStatusHistory::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseOrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PurchaseOrders {
        Table,
        Id,
        OrderNumber,
        SupplierId,
        SupplierName,
        ProjectId,
        ProjectName,
        Status,
        Total,
        OrderDate,
        EstimatedDeliveryDate,
        ReceptionNotes,
        OriginalOrderId,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum PurchaseOrderItems {
        Table,
        Id,
        OrderId,
        ItemId,
        ItemSku,
        ItemName,
        Quantity,
        UnitPrice,
        LineType,
    }

    #[derive(DeriveIden)]
    enum OrderStatusHistory {
        Table,
        Id,
        OrderId,
        Status,
        Comment,
        CreatedAt,
    }
}

mod m20250101_000002_create_stock_levels_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_stock_levels_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockLevels::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockLevels::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockLevels::ItemId).uuid().not_null())
                        .col(ColumnDef::new(StockLevels::LocationId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockLevels::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(StockLevels::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(StockLevels::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            // One row per (item, location); lookups never "take first match"
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_stock_levels_item_location")
                        .table(StockLevels::Table)
                        .col(StockLevels::ItemId)
                        .col(StockLevels::LocationId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockLevels::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum StockLevels {
        Table,
        Id,
        ItemId,
        LocationId,
        Quantity,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000003_create_order_counters_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000003_create_order_counters_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OrderCounters::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderCounters::Name)
                                .string()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderCounters::Count)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderCounters::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum OrderCounters {
        Table,
        Name,
        Count,
    }
}
