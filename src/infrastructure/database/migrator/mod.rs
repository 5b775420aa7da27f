//! Database migrations module

pub use sea_orm_migration::prelude::*;

mod m20250101_000001_create_warehouse_tariffs;
mod m20250101_000002_create_spreadsheets;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_warehouse_tariffs::Migration),
            Box::new(m20250101_000002_create_spreadsheets::Migration),
        ]
    }
}
