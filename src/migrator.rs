use sea_orm::DbBackend;
use sea_orm_migration::prelude::*;

pub use crate::entities::MONEY_SCALE;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_catalog_tables::Migration),
            Box::new(m20240601_000002_create_basket_tables::Migration),
            Box::new(m20240601_000003_create_order_tables::Migration),
        ]
    }
}

/// Total digits of a money column. SQLite rejects decimals wider than 16.
pub fn money_precision(backend: DbBackend) -> u32 {
    match backend {
        DbBackend::Sqlite => 16,
        _ => 19,
    }
}

// Migration implementations

mod m20240601_000001_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    use super::{money_precision, MONEY_SCALE};

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let precision = money_precision(manager.get_database_backend());

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Description).text().null())
                        .col(ColumnDef::new(Products::BasePrice).decimal_len(precision, MONEY_SCALE).not_null())
                        .col(
                            ColumnDef::new(Products::CurrentPrice)
                                .decimal_len(precision, MONEY_SCALE)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Products::ImageUrl).string().null())
                        .col(
                            ColumnDef::new(Products::StockQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::DeletedAt)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Discounts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Discounts::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Discounts::Name).string().not_null())
                        .col(ColumnDef::new(Discounts::Description).text().null())
                        .col(ColumnDef::new(Discounts::DiscountType).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Discounts::DiscountValue)
                                .decimal_len(precision, MONEY_SCALE)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Discounts::StartDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Discounts::EndDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Discounts::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Discounts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Discounts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Discounts::DeletedAt)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(FlashSaleEvents::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(FlashSaleEvents::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(FlashSaleEvents::Name).string().not_null())
                        .col(ColumnDef::new(FlashSaleEvents::Description).text().null())
                        .col(
                            ColumnDef::new(FlashSaleEvents::StartTime)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FlashSaleEvents::EndTime)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(FlashSaleEvents::Status).string_len(20).not_null())
                        .col(ColumnDef::new(FlashSaleEvents::EventType).string().not_null())
                        .col(
                            ColumnDef::new(FlashSaleEvents::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FlashSaleEvents::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FlashSaleEvents::DeletedAt)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(FlashSaleEventProducts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(FlashSaleEventProducts::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(FlashSaleEventProducts::EventId).uuid().not_null())
                        .col(
                            ColumnDef::new(FlashSaleEventProducts::ProductId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FlashSaleEventProducts::DiscountPercentage)
                                .decimal_len(precision, MONEY_SCALE)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(FlashSaleEventProducts::SalePrice)
                                .decimal_len(precision, MONEY_SCALE)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FlashSaleEventProducts::AvailableQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FlashSaleEventProducts::OriginalStock)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FlashSaleEventProducts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FlashSaleEventProducts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FlashSaleEventProducts::DeletedAt)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_flash_sale_event_products_event")
                                .from(FlashSaleEventProducts::Table, FlashSaleEventProducts::EventId)
                                .to(FlashSaleEvents::Table, FlashSaleEvents::Id),
                        )
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(FlashSaleEventProducts::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(FlashSaleEvents::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Discounts::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
        Name,
        Description,
        BasePrice,
        CurrentPrice,
        ImageUrl,
        StockQuantity,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }

    #[derive(DeriveIden)]
    enum Discounts {
        Table,
        Id,
        Name,
        Description,
        DiscountType,
        DiscountValue,
        StartDate,
        EndDate,
        IsActive,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }

    #[derive(DeriveIden)]
    enum FlashSaleEvents {
        Table,
        Id,
        Name,
        Description,
        StartTime,
        EndTime,
        Status,
        EventType,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }

    #[derive(DeriveIden)]
    enum FlashSaleEventProducts {
        Table,
        Id,
        EventId,
        ProductId,
        DiscountPercentage,
        SalePrice,
        AvailableQuantity,
        OriginalStock,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }
}

mod m20240601_000002_create_basket_tables {
    use sea_orm_migration::prelude::*;

    use super::{money_precision, MONEY_SCALE};

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000002_create_basket_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let precision = money_precision(manager.get_database_backend());

            manager
                .create_table(
                    Table::create()
                        .table(Baskets::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Baskets::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Baskets::UserId).uuid().not_null())
                        .col(ColumnDef::new(Baskets::Status).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Baskets::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Baskets::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Baskets::DeletedAt)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(BasketItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(BasketItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(BasketItems::BasketId).uuid().not_null())
                        .col(ColumnDef::new(BasketItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(BasketItems::FlashSaleEventProductId).uuid().null())
                        .col(ColumnDef::new(BasketItems::DiscountProductId).uuid().null())
                        .col(ColumnDef::new(BasketItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(BasketItems::UnitPrice)
                                .decimal_len(precision, MONEY_SCALE)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BasketItems::TotalPrice)
                                .decimal_len(precision, MONEY_SCALE)
                                .not_null(),
                        )
                        .col(ColumnDef::new(BasketItems::ProductType).string_len(20).not_null())
                        .col(
                            ColumnDef::new(BasketItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BasketItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BasketItems::DeletedAt)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_basket_items_basket")
                                .from(BasketItems::Table, BasketItems::BasketId)
                                .to(Baskets::Table, Baskets::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_basket_items_basket_id")
                        .table(BasketItems::Table)
                        .col(BasketItems::BasketId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BasketItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Baskets::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Baskets {
        Table,
        Id,
        UserId,
        Status,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }

    #[derive(DeriveIden)]
    enum BasketItems {
        Table,
        Id,
        BasketId,
        ProductId,
        FlashSaleEventProductId,
        DiscountProductId,
        Quantity,
        UnitPrice,
        TotalPrice,
        ProductType,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }
}

mod m20240601_000003_create_order_tables {
    use sea_orm_migration::prelude::*;

    use super::{money_precision, MONEY_SCALE};

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000003_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let precision = money_precision(manager.get_database_backend());

            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::ClientId).uuid().not_null())
                        .col(
                            ColumnDef::new(Orders::DeliveryLatitude)
                                .double()
                                .not_null()
                                .default(0.0),
                        )
                        .col(
                            ColumnDef::new(Orders::DeliveryLongitude)
                                .double()
                                .not_null()
                                .default(0.0),
                        )
                        .col(
                            ColumnDef::new(Orders::TotalPrice)
                                .decimal_len(precision, MONEY_SCALE)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::Status).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::DeletedAt)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(OrderItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::FlashSaleEventProductId).uuid().null())
                        .col(ColumnDef::new(OrderItems::DiscountProductId).uuid().null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::UnitPrice)
                                .decimal_len(precision, MONEY_SCALE)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::TotalPrice)
                                .decimal_len(precision, MONEY_SCALE)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::DiscountApplied)
                                .decimal_len(precision, MONEY_SCALE)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(OrderItems::ProductType).string_len(20).not_null())
                        .col(
                            ColumnDef::new(OrderItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::DeletedAt)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        ClientId,
        DeliveryLatitude,
        DeliveryLongitude,
        TotalPrice,
        Status,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        ProductId,
        FlashSaleEventProductId,
        DiscountProductId,
        Quantity,
        UnitPrice,
        TotalPrice,
        DiscountApplied,
        ProductType,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }
}
