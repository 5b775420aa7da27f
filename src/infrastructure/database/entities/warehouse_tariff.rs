//! Warehouse tariff entity, one row per warehouse per day

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "warehouse_tariffs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Warehouse name as reported by the provider, unique within a day
    pub warehouse_name: String,

    /// Calendar day of the snapshot
    pub day: NaiveDate,

    pub delivery_and_storage_coefficient: i32,

    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub delivery_base_rate: Decimal,

    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub delivery_per_liter_rate: Decimal,

    #[sea_orm(column_type = "Decimal(Some((10, 2)))", nullable)]
    pub storage_base_rate: Option<Decimal>,

    #[sea_orm(column_type = "Decimal(Some((10, 2)))", nullable)]
    pub storage_per_liter_rate: Option<Decimal>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
