use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_item_master_table::Migration),
            Box::new(m20240101_000002_create_orders_tables::Migration),
            Box::new(m20240101_000003_create_ledger_tables::Migration),
        ]
    }
}

mod m20240101_000001_create_item_master_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_item_master_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ItemMaster::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ItemMaster::ItemCode)
                                .string_len(32)
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ItemMaster::ItemName)
                                .string_len(128)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(ItemMaster::LeadTimeDays)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ItemMaster::UnitPrice)
                                .decimal_len(14, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ItemMaster::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(ItemMaster::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ItemMaster::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ItemMaster::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum ItemMaster {
        Table,
        ItemCode,
        ItemName,
        LeadTimeDays,
        UnitPrice,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_orders_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_orders_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // The primary key on order_no is what serializes concurrent
            // order-number allocation.
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Orders::OrderNo)
                                .string_len(32)
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Orders::OrderDate).date().not_null())
                        .col(ColumnDef::new(Orders::OrderKind).string_len(16).not_null())
                        .col(
                            ColumnDef::new(Orders::CustomerName)
                                .string_len(128)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::Status).string_len(32).not_null())
                        .col(
                            ColumnDef::new(Orders::Priority)
                                .integer()
                                .not_null()
                                .default(5),
                        )
                        .col(ColumnDef::new(Orders::ApprovedBy).string_len(64).null())
                        .col(
                            ColumnDef::new(Orders::ApprovedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Orders::CreatedBy).string_len(64).not_null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_customer_name")
                        .table(Orders::Table)
                        .col(Orders::CustomerName)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderLines::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(OrderLines::OrderNo).string_len(32).not_null())
                        .col(ColumnDef::new(OrderLines::LineSeq).integer().not_null())
                        .col(ColumnDef::new(OrderLines::ItemCode).string_len(32).not_null())
                        .col(
                            ColumnDef::new(OrderLines::ItemName)
                                .string_len(128)
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderLines::OrderedQty).integer().not_null())
                        .col(
                            ColumnDef::new(OrderLines::UnitPrice)
                                .decimal_len(14, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderLines::ShippedQty)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(OrderLines::ShippedAmount)
                                .decimal_len(16, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(OrderLines::PlannedShippingDate).date().null())
                        .col(ColumnDef::new(OrderLines::ActualShippingDate).date().null())
                        .primary_key(
                            Index::create()
                                .col(OrderLines::OrderNo)
                                .col(OrderLines::LineSeq),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_lines_order")
                                .from(OrderLines::Table, OrderLines::OrderNo)
                                .to(Orders::Table, Orders::OrderNo)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Orders {
        Table,
        OrderNo,
        OrderDate,
        OrderKind,
        CustomerName,
        Status,
        Priority,
        ApprovedBy,
        ApprovedAt,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub enum OrderLines {
        Table,
        OrderNo,
        LineSeq,
        ItemCode,
        ItemName,
        OrderedQty,
        UnitPrice,
        ShippedQty,
        ShippedAmount,
        PlannedShippingDate,
        ActualShippingDate,
    }
}

mod m20240101_000003_create_ledger_tables {
    use super::m20240101_000002_create_orders_tables::Orders;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_ledger_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Receipts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Receipts::ReceiptId)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Receipts::OrderNo).string_len(32).not_null())
                        .col(ColumnDef::new(Receipts::LineSeq).integer().not_null())
                        .col(ColumnDef::new(Receipts::ItemCode).string_len(32).not_null())
                        .col(ColumnDef::new(Receipts::ItemName).string_len(128).not_null())
                        .col(ColumnDef::new(Receipts::ReceivedQty).integer().not_null())
                        .col(ColumnDef::new(Receipts::ReceivedDate).date().not_null())
                        .col(ColumnDef::new(Receipts::ReceivedBy).string_len(64).not_null())
                        .col(
                            ColumnDef::new(Receipts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_receipts_order")
                                .from(Receipts::Table, Receipts::OrderNo)
                                .to(Orders::Table, Orders::OrderNo),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_receipts_order_line")
                        .table(Receipts::Table)
                        .col(Receipts::OrderNo)
                        .col(Receipts::LineSeq)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ShippingPlans::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ShippingPlans::PlanId)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ShippingPlans::OrderNo)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(ShippingPlans::LineSeq).integer().not_null())
                        .col(ColumnDef::new(ShippingPlans::PlannedQty).integer().not_null())
                        .col(
                            ColumnDef::new(ShippingPlans::PlannedShippingDate)
                                .date()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShippingPlans::Status)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShippingPlans::CreatedBy)
                                .string_len(64)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShippingPlans::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShippingPlans::InstructedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ShippingPlans::CompletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ShippingPlans::ConfirmedBy)
                                .string_len(64)
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipping_plans_order")
                                .from(ShippingPlans::Table, ShippingPlans::OrderNo)
                                .to(Orders::Table, Orders::OrderNo),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipping_plans_order_line")
                        .table(ShippingPlans::Table)
                        .col(ShippingPlans::OrderNo)
                        .col(ShippingPlans::LineSeq)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipping_plans_order_status")
                        .table(ShippingPlans::Table)
                        .col(ShippingPlans::OrderNo)
                        .col(ShippingPlans::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ShippingPlans::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Receipts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Receipts {
        Table,
        ReceiptId,
        OrderNo,
        LineSeq,
        ItemCode,
        ItemName,
        ReceivedQty,
        ReceivedDate,
        ReceivedBy,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum ShippingPlans {
        Table,
        PlanId,
        OrderNo,
        LineSeq,
        PlannedQty,
        PlannedShippingDate,
        Status,
        CreatedBy,
        CreatedAt,
        InstructedAt,
        CompletedAt,
        ConfirmedBy,
    }
}
