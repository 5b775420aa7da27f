//! Create warehouse_tariffs table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WarehouseTariffs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WarehouseTariffs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(WarehouseTariffs::WarehouseName)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WarehouseTariffs::Day).date().not_null())
                    .col(
                        ColumnDef::new(WarehouseTariffs::DeliveryAndStorageCoefficient)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WarehouseTariffs::DeliveryBaseRate)
                            .decimal_len(10, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WarehouseTariffs::DeliveryPerLiterRate)
                            .decimal_len(10, 2)
                            .not_null(),
                    )
                    .col(ColumnDef::new(WarehouseTariffs::StorageBaseRate).decimal_len(10, 2))
                    .col(ColumnDef::new(WarehouseTariffs::StoragePerLiterRate).decimal_len(10, 2))
                    .col(
                        ColumnDef::new(WarehouseTariffs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WarehouseTariffs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // One row per warehouse per day; concurrent first runs rely on this
        manager
            .create_index(
                Index::create()
                    .name("idx_warehouse_tariffs_day_name")
                    .table(WarehouseTariffs::Table)
                    .col(WarehouseTariffs::Day)
                    .col(WarehouseTariffs::WarehouseName)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_warehouse_tariffs_day_coefficient")
                    .table(WarehouseTariffs::Table)
                    .col(WarehouseTariffs::Day)
                    .col(WarehouseTariffs::DeliveryAndStorageCoefficient)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WarehouseTariffs::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum WarehouseTariffs {
    Table,
    Id,
    WarehouseName,
    Day,
    DeliveryAndStorageCoefficient,
    DeliveryBaseRate,
    DeliveryPerLiterRate,
    StorageBaseRate,
    StoragePerLiterRate,
    CreatedAt,
    UpdatedAt,
}
